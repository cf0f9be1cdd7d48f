//! Variable-exchange crossover: each child takes every variable from a
//! randomly chosen parent, its sibling from the other.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::operators::crossover::{DEFAULT_RATE, crossover_operation_count};
use crate::operators::{Crosser, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Uniform per-variable exchange crosser.
#[derive(Debug, Clone)]
pub struct ShuffleRandomCrosser {
    rate: f64,
}

impl ShuffleRandomCrosser {
    pub const NAME: &'static str = "shuffle_random";

    pub fn new() -> Self {
        Self { rate: DEFAULT_RATE }
    }
}

impl Default for ShuffleRandomCrosser {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for ShuffleRandomCrosser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Crosser
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let rate = db.get_real("method.crossover_rate")?;
        log_poll(self.name(), "method.crossover_rate", &rate);
        if let Some(rate) = rate {
            self.rate = rate;
        }
        Ok(())
    }
}

impl Crosser for ShuffleRandomCrosser {
    fn clone_operator(&self) -> Box<dyn Crosser> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn crossover(
        &mut self,
        from: &DesignGroup,
        into: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: entering crossover routine", self.name());
        if from.is_empty() {
            return Ok(());
        }

        let ncross = crossover_operation_count(self.rate, from.len());
        if ncross < 1 {
            return Ok(());
        }

        let parents: Vec<_> = from.iter_dv().collect();
        for _ in 0..ncross {
            let p0 = parents[rng.gen_range_usize(0, parents.len())];
            let p1 = parents[rng.gen_range_usize(0, parents.len())];

            let mut child0 = target.new_design();
            let mut child1 = target.new_design();
            for dv in 0..target.ndv() {
                if rng.gen_bool(0.5) {
                    child0.set_variable(dv, p0.variable(dv));
                    child1.set_variable(dv, p1.variable(dv));
                } else {
                    child0.set_variable(dv, p1.variable(dv));
                    child1.set_variable(dv, p0.variable(dv));
                }
            }

            log::debug!(
                "{}: crossed designs {} and {} into {} and {}",
                self.name(),
                p0.id(),
                p1.id(),
                child0.id(),
                child1.id()
            );
            into.insert(child0);
            into.insert(child1);
        }

        log::info!("{}: {} children created", self.name(), into.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;
    use crate::random::StdRandomGenerator;

    #[test]
    fn test_children_only_mix_parent_alleles() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 10.0, 4))
            .add_variable(VariableInfo::continuum_real("y", 0.0, 10.0, 4))
            .add_objective(ObjectiveInfo::minimize("f"));

        let mut from = DesignGroup::new();
        for reps in [[1.0, 2.0], [9.0, 8.0]] {
            let mut d = target.new_design();
            d.set_variable(0, reps[0]);
            d.set_variable(1, reps[1]);
            from.insert(d);
        }

        let mut into = DesignGroup::new();
        let mut crosser = ShuffleRandomCrosser::new();
        crosser.set_rate(1.0);
        let mut rng = StdRandomGenerator::new_from_seed(Some(9));
        crosser
            .crossover(&from, &mut into, &target, &mut rng)
            .unwrap();

        assert_eq!(into.len(), 2);
        for child in into.iter() {
            assert!([1.0, 9.0].contains(&child.variable(0)));
            assert!([2.0, 8.0].contains(&child.variable(1)));
        }
    }
}
