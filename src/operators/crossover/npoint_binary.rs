//! N-point parameterized binary crossover.
//!
//! Each variable is crossed independently: both parent representations
//! are encoded to fixed-precision unsigned integers, a per-variable
//! number of distinct split points is drawn from `{1..nbits-1}`, and bit
//! blocks alternate between the parents to form two children.  A
//! variable that encodes to fewer than 2 bits cannot be split and is a
//! fatal configuration error.

use crate::bits::BitManipulator;
use crate::design::{DesignGroup, DesignTarget};
use crate::error::{ConfigError, Error, handle_failure};
use crate::operators::crossover::{DEFAULT_RATE, crossover_operation_count};
use crate::operators::{Crosser, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Default number of crossover points per variable.
pub const DEFAULT_NUM_CROSS_POINTS: u32 = 1;

/// Per-variable N-point binary crosser.
#[derive(Debug, Clone)]
pub struct NPointParameterizedBinaryCrosser {
    rate: f64,
    num_cross_points: Vec<u32>,
    bits: Option<BitManipulator>,
}

impl NPointParameterizedBinaryCrosser {
    pub const NAME: &'static str = "multi_point_parameterized_binary";

    pub fn new() -> Self {
        Self {
            rate: DEFAULT_RATE,
            num_cross_points: Vec::new(),
            bits: None,
        }
    }

    /// Sets every variable's crossover point count to `count`.
    pub fn set_num_cross_points_all(&mut self, count: u32, ndv: usize) {
        self.num_cross_points = vec![count.max(1); ndv];
        if count < 1 {
            log::warn!(
                "{}: numbers of crossover points must be at least 1; supplied \
                 value of {count} replaced by the minimum",
                Self::NAME
            );
        }
    }

    /// Sets per-variable crossover point counts.  A single value fills
    /// all variables; any other mismatched length falls back to the first
    /// entry with a warning.
    pub fn set_num_cross_points(&mut self, counts: Vec<u32>, ndv: usize) {
        match counts.len() {
            0 => self.set_num_cross_points_all(DEFAULT_NUM_CROSS_POINTS, ndv),
            1 => self.set_num_cross_points_all(counts[0], ndv),
            n if n == ndv => {
                self.num_cross_points = counts.into_iter().map(|c| c.max(1)).collect();
            }
            n => {
                log::warn!(
                    "{}: received {n} crossover point counts for a {ndv} design \
                     variable problem; using the first supplied value of {} for \
                     all variables",
                    Self::NAME,
                    counts[0]
                );
                self.set_num_cross_points_all(counts[0], ndv);
            }
        }
    }

    fn num_cross_points_for(&self, dv: usize) -> u32 {
        self.num_cross_points
            .get(dv)
            .copied()
            .unwrap_or(DEFAULT_NUM_CROSS_POINTS)
    }

    /// Builds the bit-extraction mask from `npts` distinct split points
    /// drawn from `{1..nbits-1}`.
    fn crossover_mask(nbits: u16, npts: u32, rng: &mut dyn RandomGenerator) -> u64 {
        let mut candidates: Vec<usize> = (1..nbits as usize).collect();
        rng.shuffle_usize(&mut candidates);
        let take = (npts as usize).min(candidates.len());
        let mut mask: u64 = 0;
        for &pt in &candidates[..take] {
            mask ^= (1u64 << pt) - 1;
        }
        mask
    }
}

impl Default for NPointParameterizedBinaryCrosser {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for NPointParameterizedBinaryCrosser {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Crosser
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let rate = db.get_real("method.crossover_rate")?;
        log_poll(self.name(), "method.crossover_rate", &rate);
        if let Some(rate) = rate {
            self.rate = rate;
        }

        // The key accepts either a per-variable list or a scalar that
        // fills all variables.
        const KEY: &str = "method.jega.num_cross_points";
        if !db.contains(KEY) {
            log::info!("{}: {KEY} not in parameter database, default used", self.name());
            self.set_num_cross_points_all(DEFAULT_NUM_CROSS_POINTS, target.ndv());
        } else if let Ok(Some(counts)) = db.get_int_vec(KEY) {
            log::info!("{}: polled {KEY} = {counts:?}", self.name());
            self.set_num_cross_points(
                counts.into_iter().map(|c| c.max(0) as u32).collect(),
                target.ndv(),
            );
        } else if let Ok(Some(single)) = db.get_int(KEY) {
            log::info!("{}: polled {KEY} = {single}", self.name());
            self.set_num_cross_points_all(single.max(0) as u32, target.ndv());
        } else {
            return Err(Error::Config(ConfigError::WrongParameterType {
                key: KEY.to_string(),
                expected: "int list or int",
            }));
        }
        Ok(())
    }
}

impl Crosser for NPointParameterizedBinaryCrosser {
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

        if self.num_cross_points.len() != target.ndv() {
            self.set_num_cross_points_all(DEFAULT_NUM_CROSS_POINTS, target.ndv());
        }
        self.bits
            .get_or_insert_with(|| BitManipulator::new(target))
            .refresh_if_stale(target);
        let bits = self.bits.as_ref().expect("encoder installed above");

        // Every variable must be splittable before any children are made.
        for (dv, info) in target.variable_infos().iter().enumerate() {
            let nbits = bits.nbits(dv);
            if nbits < 2 {
                return Err(handle_failure(Error::Config(
                    ConfigError::InsufficientPrecision {
                        label: info.label().to_string(),
                        bits: nbits,
                    },
                )));
            }
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
                let nbits = bits.nbits(dv);
                let e0 = bits.encode(p0.variable(dv), dv);
                let e1 = bits.encode(p1.variable(dv), dv);

                let mask = Self::crossover_mask(nbits, self.num_cross_points_for(dv), rng);
                child0.set_variable(dv, bits.decode((e0 & mask) | (e1 & !mask), dv));
                child1.set_variable(dv, bits.decode((e0 & !mask) | (e1 & mask), dv));
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

    fn target_int(bits_range: i64) -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_integer("n", 0, bits_range))
            .add_objective(ObjectiveInfo::minimize("f"));
        target
    }

    fn seeded_group(target: &DesignTarget, reps: &[f64]) -> DesignGroup {
        let mut group = DesignGroup::new();
        for &rep in reps {
            let mut d = target.new_design();
            d.set_variable(0, rep);
            group.insert(d);
        }
        group
    }

    /// Scripted RNG: parent picks come from `indices`, shuffles reverse
    /// the candidate list so split points are deterministic.
    struct ScriptedRng {
        indices: Vec<usize>,
        at: usize,
    }

    impl RandomGenerator for ScriptedRng {
        fn gen_range_usize(&mut self, _min: usize, _max: usize) -> usize {
            let v = self.indices[self.at % self.indices.len()];
            self.at += 1;
            v
        }
        fn gen_range_f64(&mut self, _min: f64, _max: f64) -> f64 {
            unimplemented!("not used in this test")
        }
        fn gen_bool(&mut self, _p: f64) -> bool {
            unimplemented!("not used in this test")
        }
        fn gen_probability(&mut self) -> f64 {
            unimplemented!("not used in this test")
        }
        fn gen_gaussian(&mut self, _mean: f64, _std_dev: f64) -> f64 {
            unimplemented!("not used in this test")
        }
        fn gen_cauchy(&mut self, _median: f64, _scale: f64) -> f64 {
            unimplemented!("not used in this test")
        }
        fn shuffle_usize(&mut self, values: &mut [usize]) {
            values.reverse();
        }
    }

    #[test]
    fn test_single_point_crossover_controlled() {
        // 0..15 needs 4 bits; parents 0b0000 and 0b1111.  The reversed
        // candidate list [3, 2, 1] puts the split at bit 3, so the mask
        // is 0b0111: children are 0b0111 = 7 and 0b1000 = 8.
        let target = target_int(15);
        let from = seeded_group(&target, &[0.0, 15.0]);
        let mut into = DesignGroup::new();

        let mut crosser = NPointParameterizedBinaryCrosser::new();
        crosser.set_rate(1.0);
        crosser.set_num_cross_points_all(1, 1);
        let mut rng = ScriptedRng {
            indices: vec![0, 1],
            at: 0,
        };
        crosser
            .crossover(&from, &mut into, &target, &mut rng)
            .unwrap();

        assert_eq!(into.len(), 2);
        let mut reps: Vec<f64> = into.iter().map(|d| d.variable(0)).collect();
        reps.sort_by(f64::total_cmp);
        assert_eq!(reps, vec![7.0, 8.0]);
    }

    #[test]
    fn test_offspring_come_in_sibling_pairs() {
        let target = target_int(255);
        let from = seeded_group(&target, &[1.0, 17.0, 33.0, 200.0]);
        let mut into = DesignGroup::new();

        let mut crosser = NPointParameterizedBinaryCrosser::new();
        crosser.set_rate(1.0);
        crosser.set_num_cross_points_all(2, 1);
        let mut rng = StdRandomGenerator::new_from_seed(Some(21));
        crosser
            .crossover(&from, &mut into, &target, &mut rng)
            .unwrap();

        // rate * size / 2 = 2 operations, 2 children each.
        assert_eq!(into.len(), 4);
        for child in into.iter() {
            assert!(!child.is_evaluated());
            let rep = child.variable(0);
            assert!((0.0..=255.0).contains(&rep));
        }
    }

    #[test]
    fn test_one_bit_variable_is_fatal() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::logical("b"))
            .add_objective(ObjectiveInfo::minimize("f"));
        let from = seeded_group(&target, &[0.0, 1.0]);
        let mut into = DesignGroup::new();

        let mut crosser = NPointParameterizedBinaryCrosser::new();
        crosser.set_rate(1.0);
        let mut rng = StdRandomGenerator::new_from_seed(Some(1));
        let err = crosser
            .crossover(&from, &mut into, &target, &mut rng)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InsufficientPrecision { .. })
        ));
    }

    #[test]
    fn test_scalar_config_fills_all_variables() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_integer("a", 0, 100))
            .add_variable(VariableInfo::continuum_integer("b", 0, 100))
            .add_objective(ObjectiveInfo::minimize("f"));

        let mut db = ParameterDatabase::new();
        db.set_int("method.jega.num_cross_points", 3);
        let mut crosser = NPointParameterizedBinaryCrosser::new();
        crosser.poll_for_parameters(&db, &target).unwrap();
        assert_eq!(crosser.num_cross_points, vec![3, 3]);
    }
}
