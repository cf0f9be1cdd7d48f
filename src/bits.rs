//! Fixed-precision binary encoding of design variables.
//!
//! Binary-space operators (the N-point crossers) need each variable as an
//! unsigned integer.  A variable with `p` decimal places and lower bound
//! `lb` encodes as `round((rep - lb) * 10^p)` into the smallest width
//! that holds the full range.  The per-variable widths and multipliers
//! are cached and invalidated when the target's metadata revision
//! changes.

use crate::design::DesignTarget;
use crate::design::variable::round_to_precision;

#[derive(Debug, Clone)]
struct VarEncoding {
    nbits: u16,
    mult: f64,
    offset: f64,
    precision: i32,
}

/// Encoder between variable representations and fixed-width unsigned
/// integers.
#[derive(Debug, Clone)]
pub struct BitManipulator {
    encodings: Vec<VarEncoding>,
    total_bits: u32,
    revision: u64,
}

impl BitManipulator {
    pub fn new(target: &DesignTarget) -> Self {
        let mut manip = Self {
            encodings: Vec::new(),
            total_bits: 0,
            revision: 0,
        };
        manip.revalidate(target);
        manip
    }

    /// Whether the cached widths still match the target metadata.
    pub fn is_current(&self, target: &DesignTarget) -> bool {
        self.revision == target.revision() && self.encodings.len() == target.ndv()
    }

    /// Recomputes the cached widths and multipliers from the target.
    pub fn revalidate(&mut self, target: &DesignTarget) {
        self.encodings = target
            .variable_infos()
            .iter()
            .map(|info| {
                let precision = info.precision();
                let mult = 10f64.powi(precision);
                let offset = info.min_rep();
                let steps = ((info.max_rep() - offset) * mult).round().max(0.0) as u64;
                let nbits = (64 - steps.leading_zeros()).max(1) as u16;
                VarEncoding {
                    nbits,
                    mult,
                    offset,
                    precision,
                }
            })
            .collect();
        self.total_bits = self.encodings.iter().map(|e| e.nbits as u32).sum();
        self.revision = target.revision();
    }

    pub fn refresh_if_stale(&mut self, target: &DesignTarget) {
        if !self.is_current(target) {
            self.revalidate(target);
        }
    }

    /// Bits required by variable `dv`.
    pub fn nbits(&self, dv: usize) -> u16 {
        self.encodings[dv].nbits
    }

    /// Bits required by a whole genome.
    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    /// Encodes a representation of variable `dv` as a shifted integer.
    pub fn encode(&self, rep: f64, dv: usize) -> u64 {
        let enc = &self.encodings[dv];
        let shifted = ((rep - enc.offset) * enc.mult).round();
        let max = (1u128 << enc.nbits) - 1;
        shifted.max(0.0).min(max as f64) as u64
    }

    /// Decodes a shifted integer back into a representation, rounded to
    /// the variable's precision.
    pub fn decode(&self, bits: u64, dv: usize) -> f64 {
        let enc = &self.encodings[dv];
        round_to_precision(bits as f64 / enc.mult + enc.offset, enc.precision)
    }

    /// Flips bit `bit` of `value`.
    pub fn toggle_bit(bit: u16, value: u64) -> u64 {
        value ^ (1u64 << bit)
    }

    /// Number of set (or clear) bits in `value`.
    pub fn count_bits(value: u64, ones: bool) -> u32 {
        if ones {
            value.count_ones()
        } else {
            value.count_zeros()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;

    fn target_with(vars: Vec<VariableInfo>) -> DesignTarget {
        let mut target = DesignTarget::new();
        for v in vars {
            target.add_variable(v);
        }
        target.add_objective(ObjectiveInfo::minimize("f"));
        target
    }

    #[test]
    fn test_widths_cover_the_range() {
        let target = target_with(vec![
            VariableInfo::continuum_real("x", 0.0, 1.0, 2), // 100 steps -> 7 bits
            VariableInfo::continuum_integer("n", 0, 7),     // 7 steps  -> 3 bits
            VariableInfo::logical("b"),                     // 1 step   -> 1 bit
        ]);
        let manip = BitManipulator::new(&target);
        assert_eq!(manip.nbits(0), 7);
        assert_eq!(manip.nbits(1), 3);
        assert_eq!(manip.nbits(2), 1);
        assert_eq!(manip.total_bits(), 11);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let target = target_with(vec![VariableInfo::continuum_real("x", -1.0, 1.0, 3)]);
        let manip = BitManipulator::new(&target);
        for rep in [-1.0, -0.123, 0.0, 0.5, 0.999, 1.0] {
            let decoded = manip.decode(manip.encode(rep, 0), 0);
            assert!(
                (decoded - round_to_precision(rep, 3)).abs() < 1e-9,
                "round trip of {rep} gave {decoded}"
            );
        }
    }

    #[test]
    fn test_encode_clamps_to_range() {
        let target = target_with(vec![VariableInfo::continuum_integer("n", 0, 10)]);
        let manip = BitManipulator::new(&target);
        assert_eq!(manip.encode(-5.0, 0), 0);
        let top = manip.encode(10.0, 0);
        assert_eq!(manip.decode(top, 0), 10.0);
    }

    #[test]
    fn test_cache_invalidation_on_metadata_change() {
        let mut target = target_with(vec![VariableInfo::logical("b")]);
        let mut manip = BitManipulator::new(&target);
        assert!(manip.is_current(&target));

        target.add_variable(VariableInfo::continuum_integer("n", 0, 3));
        assert!(!manip.is_current(&target));
        manip.refresh_if_stale(&target);
        assert!(manip.is_current(&target));
        assert_eq!(manip.nbits(1), 2);
    }

    #[test]
    fn test_bit_helpers() {
        assert_eq!(BitManipulator::toggle_bit(0, 0b100), 0b101);
        assert_eq!(BitManipulator::toggle_bit(2, 0b100), 0b000);
        assert_eq!(BitManipulator::count_bits(0b1011, true), 3);
    }
}
