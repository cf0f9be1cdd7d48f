//! Additive offset mutation.
//!
//! Perturbs a random variable of a random design by an offset drawn from
//! a configurable distribution and scaled by a fraction of the
//! variable's representation range.  Offsets can push representations
//! out of bounds; the main loop legalizes such designs before
//! evaluation.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::operators::mutation::{DEFAULT_RATE, mutation_event_count};
use crate::operators::{GeneticOperator, Mutator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Fraction of a variable's range used as the offset scale.
pub const DEFAULT_OFFSET_RANGE: f64 = 0.1;

/// The distribution an [`OffsetMutator`] draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetKind {
    Normal,
    Uniform,
    Cauchy,
}

/// Offset mutator parameterized by its distribution.
#[derive(Debug, Clone)]
pub struct OffsetMutator {
    kind: OffsetKind,
    rate: f64,
    offset_range: f64,
}

impl OffsetMutator {
    pub fn normal() -> Self {
        Self::with_kind(OffsetKind::Normal)
    }

    pub fn uniform() -> Self {
        Self::with_kind(OffsetKind::Uniform)
    }

    pub fn cauchy() -> Self {
        Self::with_kind(OffsetKind::Cauchy)
    }

    pub fn with_kind(kind: OffsetKind) -> Self {
        Self {
            kind,
            rate: DEFAULT_RATE,
            offset_range: DEFAULT_OFFSET_RANGE,
        }
    }

    pub fn offset_range(&self) -> f64 {
        self.offset_range
    }

    pub fn set_offset_range(&mut self, offset_range: f64) {
        self.offset_range = offset_range;
    }

    fn draw_offset(&self, scale: f64, rng: &mut dyn RandomGenerator) -> f64 {
        match self.kind {
            OffsetKind::Normal => rng.gen_gaussian(0.0, scale),
            OffsetKind::Uniform => rng.gen_range_f64(-scale, scale),
            OffsetKind::Cauchy => rng.gen_cauchy(0.0, scale),
        }
    }
}

impl GeneticOperator for OffsetMutator {
    fn name(&self) -> &'static str {
        match self.kind {
            OffsetKind::Normal => "offset_normal",
            OffsetKind::Uniform => "offset_uniform",
            OffsetKind::Cauchy => "offset_cauchy",
        }
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
        let offset_range = db.get_real("method.mutation_scale")?;
        log_poll(self.name(), "method.mutation_scale", &offset_range);
        if let Some(offset_range) = offset_range {
            self.offset_range = offset_range;
        }
        Ok(())
    }
}

impl Mutator for OffsetMutator {
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

    fn can_produce_invalid_variable_values(&self) -> bool {
        true
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
            let info = &target.variable_infos()[dv];
            let scale = self.offset_range * (info.max_rep() - info.min_rep());
            let offset = self.draw_offset(scale, rng);

            let design = victims.get_mut(slot);
            let mutated = design.variable(dv) + offset;
            log::debug!(
                "{}: offsetting variable {dv} of design {} by {offset}",
                self.name(),
                design.id()
            );
            design.set_variable(dv, mutated);
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

    struct ScriptedOffsetRng {
        offsets: Vec<f64>,
        at: usize,
    }

    impl RandomGenerator for ScriptedOffsetRng {
        fn gen_range_usize(&mut self, min: usize, _max: usize) -> usize {
            min
        }
        fn gen_range_f64(&mut self, _min: f64, _max: f64) -> f64 {
            self.next_offset()
        }
        fn gen_bool(&mut self, _p: f64) -> bool {
            unimplemented!("not used in this test")
        }
        fn gen_probability(&mut self) -> f64 {
            unimplemented!("not used in this test")
        }
        fn gen_gaussian(&mut self, _mean: f64, _std_dev: f64) -> f64 {
            self.next_offset()
        }
        fn gen_cauchy(&mut self, _median: f64, _scale: f64) -> f64 {
            self.next_offset()
        }
        fn shuffle_usize(&mut self, _values: &mut [usize]) {
            unimplemented!("not used in this test")
        }
    }

    impl ScriptedOffsetRng {
        fn next_offset(&mut self) -> f64 {
            let v = self.offsets[self.at % self.offsets.len()];
            self.at += 1;
            v
        }
    }

    fn target_1v() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 10.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"));
        target
    }

    #[test]
    fn test_offset_applied_and_flag_cleared() {
        let target = target_1v();
        let mut population = DesignGroup::new();
        let mut d = target.new_design();
        d.set_variable(0, 5.0);
        d.set_evaluated(true);
        population.insert(d);
        let mut children = DesignGroup::new();

        let mut mutator = OffsetMutator::normal();
        mutator.set_rate(1.0);
        let mut rng = ScriptedOffsetRng {
            offsets: vec![0.75],
            at: 0,
        };
        mutator
            .mutate(&mut population, &mut children, &target, &mut rng)
            .unwrap();

        let mutated = population.iter().next().unwrap();
        assert_eq!(mutated.variable(0), 5.75);
        assert!(!mutated.is_evaluated());
    }

    #[test]
    fn test_out_of_bounds_offsets_are_allowed() {
        // The offset mutator declares it can produce invalid reps; the
        // main loop legalizes before evaluation.
        let target = target_1v();
        let mut population = DesignGroup::new();
        let mut d = target.new_design();
        d.set_variable(0, 9.5);
        population.insert(d);
        let mut children = DesignGroup::new();

        let mut mutator = OffsetMutator::uniform();
        assert!(mutator.can_produce_invalid_variable_values());
        mutator.set_rate(1.0);
        let mut rng = ScriptedOffsetRng {
            offsets: vec![3.0],
            at: 0,
        };
        mutator
            .mutate(&mut population, &mut children, &target, &mut rng)
            .unwrap();
        assert_eq!(population.iter().next().unwrap().variable(0), 12.5);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(OffsetMutator::normal().name(), "offset_normal");
        assert_eq!(OffsetMutator::uniform().name(), "offset_uniform");
        assert_eq!(OffsetMutator::cauchy().name(), "offset_cauchy");
    }
}
