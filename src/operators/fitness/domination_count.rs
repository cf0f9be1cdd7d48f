//! Multi-objective fitness from domination counts.
//!
//! Each design's fitness is the negated number of designs in the pool
//! that dominate it, so non-dominated designs score 0 and everything
//! else is negative.  Feasibility folds into the dominance relation:
//! feasible designs dominate infeasible ones outright.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::{FitnessRecord, dominates};
use crate::operators::{FitnessAssessor, GeneticOperator, OperatorFamily};

#[derive(Debug, Clone, Default)]
pub struct DominationCountFitnessAssessor;

impl DominationCountFitnessAssessor {
    pub const NAME: &'static str = "domination_count";

    pub fn new() -> Self {
        Self
    }
}

impl GeneticOperator for DominationCountFitnessAssessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::FitnessAssessor
    }
}

impl FitnessAssessor for DominationCountFitnessAssessor {
    fn clone_operator(&self) -> Box<dyn FitnessAssessor> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn assess_fitness(
        &mut self,
        groups: &[&DesignGroup],
        target: &DesignTarget,
    ) -> Result<FitnessRecord, Error> {
        log::debug!("{}: assessing fitness", self.name());

        let pool: Vec<_> = groups.iter().flat_map(|g| g.iter()).collect();
        let mut counts = vec![0usize; pool.len()];
        for i in 0..pool.len() {
            for j in (i + 1)..pool.len() {
                if dominates(pool[i], pool[j], target) {
                    counts[j] += 1;
                } else if dominates(pool[j], pool[i], target) {
                    counts[i] += 1;
                }
            }
        }

        let mut record = FitnessRecord::new();
        for (design, count) in pool.iter().zip(counts) {
            record.record(design.id(), -(count as f64));
        }
        log::info!("{}: {} designs scored", self.name(), record.len());
        Ok(record)
    }
}
