//! Single-objective fitness from a penalized weighted sum.
//!
//! Objectives are mapped to minimization form, combined with the
//! configured weights, and an exterior penalty proportional to the total
//! constraint violation is added.  The fitness is the negated result so
//! that higher remains better.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::operators::{FitnessAssessor, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

/// Default multiplier applied to the total constraint violation.
pub const DEFAULT_PENALTY_MULTIPLIER: f64 = 1000.0;

#[derive(Debug, Clone)]
pub struct WeightedSumFitnessAssessor {
    weights: Option<Vec<f64>>,
    penalty_multiplier: f64,
}

impl WeightedSumFitnessAssessor {
    pub const NAME: &'static str = "weighted_sum_only";

    pub fn new() -> Self {
        Self {
            weights: None,
            penalty_multiplier: DEFAULT_PENALTY_MULTIPLIER,
        }
    }

    /// Sets per-objective weights; unset weights default to `1 / NOF`.
    pub fn set_weights(&mut self, weights: Vec<f64>) {
        self.weights = Some(weights);
    }

    fn weight_for(&self, of: usize, nof: usize) -> f64 {
        match &self.weights {
            Some(w) => w.get(of).copied().unwrap_or_else(|| 1.0 / nof as f64),
            None => 1.0 / nof as f64,
        }
    }
}

impl Default for WeightedSumFitnessAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for WeightedSumFitnessAssessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::FitnessAssessor
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let weights = db.get_real_vec("method.jega.objective_weights")?;
        log_poll(self.name(), "method.jega.objective_weights", &weights);
        if let Some(weights) = weights {
            self.weights = Some(weights);
        }
        let penalty = db.get_real("method.constraint_penalty")?;
        log_poll(self.name(), "method.constraint_penalty", &penalty);
        if let Some(penalty) = penalty {
            self.penalty_multiplier = penalty;
        }
        Ok(())
    }
}

impl FitnessAssessor for WeightedSumFitnessAssessor {
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

        let nof = target.nof();
        let mut record = FitnessRecord::new();
        for group in groups {
            for design in group.iter() {
                let mut sum = 0.0;
                for (of, info) in target.objective_infos().iter().enumerate() {
                    sum += self.weight_for(of, nof)
                        * info.amount_of_minimization(design.objective(of));
                }
                sum += self.penalty_multiplier * target.constraint_violation(design);
                record.record(design.id(), -sum);
            }
        }
        log::info!("{}: {} designs scored", self.name(), record.len());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::{ConstraintInfo, ObjectiveInfo};
    use crate::design::variable::VariableInfo;

    fn soga_target() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"))
            .add_constraint(ConstraintInfo::upper_bounded("g", 0.0));
        target
    }

    #[test]
    fn test_lower_objective_scores_higher() {
        let target = soga_target();
        let mut group = DesignGroup::new();
        for (i, obj) in [3.0, 1.0].iter().enumerate() {
            let mut d = target.new_design();
            d.set_variable(0, i as f64 * 0.5);
            d.set_objective(0, *obj);
            d.set_constraint(0, -1.0);
            d.set_evaluated(true);
            group.insert(d);
        }

        let mut assessor = WeightedSumFitnessAssessor::new();
        let record = assessor.assess_fitness(&[&group], &target).unwrap();
        let fits: Vec<f64> = group.iter().map(|d| record.fitness_of(d).unwrap()).collect();
        assert!(fits[1] > fits[0]);
        assert_eq!(fits[0], -3.0);
    }

    #[test]
    fn test_violation_is_penalized() {
        let target = soga_target();
        let mut group = DesignGroup::new();
        let mut feasible = target.new_design();
        feasible.set_objective(0, 5.0);
        feasible.set_constraint(0, -1.0);
        group.insert(feasible);
        let mut violating = target.new_design();
        violating.set_variable(0, 0.5);
        violating.set_objective(0, 0.0);
        violating.set_constraint(0, 0.01);
        group.insert(violating);

        let mut assessor = WeightedSumFitnessAssessor::new();
        let record = assessor.assess_fitness(&[&group], &target).unwrap();
        let fits: Vec<f64> = group.iter().map(|d| record.fitness_of(d).unwrap()).collect();
        // The tiny violation outweighs the objective advantage.
        assert!(fits[0] > fits[1]);
    }

    #[test]
    fn test_explicit_weights_apply() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f0"))
            .add_objective(ObjectiveInfo::minimize("f1"));

        let mut group = DesignGroup::new();
        let mut d = target.new_design();
        d.set_objective(0, 2.0);
        d.set_objective(1, 10.0);
        d.set_evaluated(true);
        group.insert(d);

        let mut assessor = WeightedSumFitnessAssessor::new();
        assessor.set_weights(vec![1.0, 0.0]);
        let record = assessor.assess_fitness(&[&group], &target).unwrap();
        let fitness = group
            .iter()
            .next()
            .map(|d| record.fitness_of(d).unwrap())
            .unwrap();
        assert_eq!(fitness, -2.0);
    }
}
