//! # `random` – Unified RNG Abstraction
//!
//! All stochastic operators (initialization, crossover, mutation,
//! selection, niching) draw randomness through the [`RandomGenerator`]
//! trait rather than the `rand` crate directly.  Operators are handed out
//! as trait objects by the registry, so the façade is object safe: every
//! method is concrete and the backing engine is hidden behind the
//! implementation.
//!
//! Two implementations ship with the crate:
//!
//! | Type | Backed by | Intended for |
//! |------|-----------|--------------|
//! | [`StdRandomGenerator`] | `rand::rngs::StdRng` | Production — fast, reproducible with a seed. |
//! | [`NoopRandomGenerator`] | nothing (panics) | Unit tests where randomness is not exercised but the trait is required. |
//!
//! Tests that need determinism implement the trait with controlled fakes
//! returning scripted values; several operators carry such fakes in their
//! `#[cfg(test)]` modules.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::{Cauchy, Distribution, Normal};

/// Object-safe interface for generating random values, used across all
/// genetic operators.
pub trait RandomGenerator {
    /// Generates a random `usize` in the range `[min, max)`.
    fn gen_range_usize(&mut self, min: usize, max: usize) -> usize;

    /// Generates a random `f64` in the range `[min, max)`.
    fn gen_range_f64(&mut self, min: f64, max: f64) -> f64;

    /// Generates a random boolean which is `true` with probability `p`.
    fn gen_bool(&mut self, p: f64) -> bool;

    /// Generates a uniform `f64` in `[0, 1)`.
    fn gen_probability(&mut self) -> f64;

    /// Draws from a normal distribution with the given mean and standard
    /// deviation.
    fn gen_gaussian(&mut self, mean: f64, std_dev: f64) -> f64;

    /// Draws from a Cauchy distribution with the given median and scale.
    fn gen_cauchy(&mut self, median: f64, scale: f64) -> f64;

    /// In-place Fisher–Yates shuffle.
    fn shuffle_usize(&mut self, values: &mut [usize]);
}

/// The production implementation of [`RandomGenerator`] using `StdRng`.
#[derive(Debug, Clone)]
pub struct StdRandomGenerator {
    rng: StdRng,
}

impl StdRandomGenerator {
    /// Creates a new generator from the provided `StdRng`.
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }

    /// Creates a generator seeded from `seed`, or from entropy when no
    /// seed is given.
    pub fn new_from_seed(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(|| StdRng::from_rng(&mut rand::rng()), StdRng::seed_from_u64);
        Self { rng }
    }
}

impl RandomGenerator for StdRandomGenerator {
    fn gen_range_usize(&mut self, min: usize, max: usize) -> usize {
        self.rng.random_range(min..max)
    }

    fn gen_range_f64(&mut self, min: f64, max: f64) -> f64 {
        self.rng.random_range(min..max)
    }

    fn gen_bool(&mut self, p: f64) -> bool {
        self.rng.random_bool(p)
    }

    fn gen_probability(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    fn gen_gaussian(&mut self, mean: f64, std_dev: f64) -> f64 {
        Normal::new(mean, std_dev)
            .expect("standard deviation must be finite and non-negative")
            .sample(&mut self.rng)
    }

    fn gen_cauchy(&mut self, median: f64, scale: f64) -> f64 {
        Cauchy::new(median, scale)
            .expect("scale must be finite and positive")
            .sample(&mut self.rng)
    }

    fn shuffle_usize(&mut self, values: &mut [usize]) {
        values.shuffle(&mut self.rng);
    }
}

/// A generator that panics on use, for tests that require the trait but
/// never exercise randomness; an unintended draw shows up as a panic.
#[derive(Debug, Default)]
pub struct NoopRandomGenerator;

impl NoopRandomGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl RandomGenerator for NoopRandomGenerator {
    fn gen_range_usize(&mut self, _min: usize, _max: usize) -> usize {
        unimplemented!("not used in this test")
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

    fn shuffle_usize(&mut self, _values: &mut [usize]) {
        unimplemented!("not used in this test")
    }
}
