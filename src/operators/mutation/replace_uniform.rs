//! Random design-variable reassignment.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::operators::mutation::{DEFAULT_RATE, mutation_event_count};
use crate::operators::{GeneticOperator, Mutator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Mutates by picking a random design and a random variable and
/// reassigning that variable to a uniform random legal representation.
/// No consideration of the current value is given.
#[derive(Debug, Clone)]
pub struct ReplaceUniformMutator {
    rate: f64,
}

impl ReplaceUniformMutator {
    pub const NAME: &'static str = "replace_uniform";

    pub fn new() -> Self {
        Self { rate: DEFAULT_RATE }
    }
}

impl Default for ReplaceUniformMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for ReplaceUniformMutator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Mutator
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let rate = db.get_real("method.mutation_rate")?;
        log_poll(self.name(), "method.mutation_rate", &rate);
        if let Some(rate) = rate {
            self.rate = rate;
        }
        Ok(())
    }
}

impl Mutator for ReplaceUniformMutator {
    fn clone_operator(&self) -> Box<dyn Mutator> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn rate(&self) -> f64 {
        self.rate
    }

    fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn mutate(
        &mut self,
        population: &mut DesignGroup,
        children: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: performing mutation", self.name());

        let events = mutation_event_count(self.rate, population.len(), children.len());
        let victims = if children.is_empty() {
            population
        } else {
            children
        };
        if events == 0 || victims.is_empty() || target.ndv() == 0 {
            return Ok(());
        }

        for _ in 0..events {
            let slot = rng.gen_range_usize(0, victims.len());
            let dv = rng.gen_range_usize(0, target.ndv());
            let rep = target.variable_infos()[dv].random_rep(rng);
            let design = victims.get_mut(slot);
            log::debug!(
                "{}: reassigning variable {dv} of design {} to {rep}",
                Self::NAME,
                design.id()
            );
            design.set_variable(dv, rep);
            design.set_evaluated(false);
        }
        victims.synchronize();

        log::info!("{}: {events} mutations performed", self.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;
    use crate::random::StdRandomGenerator;

    fn target_1v() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"));
        target
    }

    fn group_of(target: &DesignTarget, n: usize) -> DesignGroup {
        let mut group = DesignGroup::new();
        for i in 0..n {
            let mut d = target.new_design();
            d.set_variable(0, i as f64 / n as f64);
            d.set_evaluated(true);
            group.insert(d);
        }
        group
    }

    #[test]
    fn test_mutates_children_when_present() {
        let target = target_1v();
        let mut population = group_of(&target, 4);
        let mut children = group_of(&target, 4);
        let mut rng = StdRandomGenerator::new_from_seed(Some(13));

        let mut mutator = ReplaceUniformMutator::new();
        mutator.set_rate(1.0);
        mutator
            .mutate(&mut population, &mut children, &target, &mut rng)
            .unwrap();

        // Population untouched; some child lost its evaluated flag.
        assert!(population.iter().all(|d| d.is_evaluated()));
        assert!(children.iter().any(|d| !d.is_evaluated()));
        children.check_views_in_sync().unwrap();
    }

    #[test]
    fn test_mutations_stay_legal() {
        let target = target_1v();
        let mut population = group_of(&target, 8);
        let mut children = DesignGroup::new();
        let mut rng = StdRandomGenerator::new_from_seed(Some(13));

        let mut mutator = ReplaceUniformMutator::new();
        mutator.set_rate(1.0);
        mutator
            .mutate(&mut population, &mut children, &target, &mut rng)
            .unwrap();

        for d in population.iter() {
            assert!(target.variable_infos()[0].is_rep_in_bounds(d.variable(0)));
        }
    }
}
