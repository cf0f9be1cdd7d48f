//! Fitness-proportionate selection by stochastic universal sampling.
//!
//! Each design is allotted a slice of the wheel proportional to its
//! fitness relative to the pool.  Fitnesses are shifted by the minimum
//! when any are negative; a degenerate pool (equal fitnesses, or a zero
//! adjusted sum) falls back to uniform slices.  Sampling is universal:
//! one random start `u ~ U[0, 1/k]` and `k` evenly spaced pointers, so a
//! design's selection count never strays far from its expectation.
//!
//! Chosen designs are marked through a reserved attribute bit and swept
//! into the destination group afterwards; a design chosen more than once
//! is duplicated through the target's clone allocator.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::{ContractError, Error, handle_failure};
use crate::fitness::FitnessRecord;
use crate::operators::selection::SELECTION_ATTRIBUTE;
use crate::operators::{GeneticOperator, OperatorFamily, Selector};
use crate::params::ParameterDatabase;
use crate::random::RandomGenerator;

#[derive(Debug, Clone, Default)]
pub struct RouletteWheelSelector;

impl RouletteWheelSelector {
    pub const NAME: &'static str = "roulette_wheel";

    pub fn new() -> Self {
        Self
    }

    fn clear_selection_attributes(groups: &mut [DesignGroup]) {
        for group in groups.iter_mut() {
            for design in group.designs_mut() {
                design.modify_attribute(SELECTION_ATTRIBUTE, false);
            }
        }
    }

    /// Builds the cumulative probability boundaries for the pool, in the
    /// iteration order of `entries` (fitness per entry).
    fn cumulative_probabilities(fitnesses: &[f64]) -> Vec<f64> {
        let n = fitnesses.len();
        let min = fitnesses.iter().copied().reduce(f64::min).unwrap_or(0.0);
        let max = fitnesses.iter().copied().reduce(f64::max).unwrap_or(0.0);
        let sum: f64 = fitnesses.iter().sum();

        // Shift so all values are non-negative; a degenerate pool gets
        // uniform slices.
        let shift = min.min(0.0);
        let adjusted_sum = sum - n as f64 * shift;
        let uniform = max == min || adjusted_sum == 0.0;

        let mut cumulative = Vec::with_capacity(n);
        let mut acc = 0.0;
        for &fitness in fitnesses {
            acc += if uniform {
                1.0 / n as f64
            } else {
                (fitness - shift) / adjusted_sum
            };
            cumulative.push(acc);
        }
        // Guard the last boundary against round-off so every pointer
        // lands inside the wheel.
        if let Some(last) = cumulative.last_mut() {
            *last = f64::max(*last, 1.0 + 1e-9);
        }
        cumulative
    }
}

impl GeneticOperator for RouletteWheelSelector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Selector
    }

    fn poll_for_parameters(
        &mut self,
        _db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        Ok(())
    }
}

impl Selector for RouletteWheelSelector {
    fn clone_operator(&self) -> Box<dyn Selector> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn can_select_same_design_more_than_once(&self) -> bool {
        true
    }

    fn select(
        &mut self,
        from: &mut [DesignGroup],
        into: &mut DesignGroup,
        count: usize,
        fitnesses: &FitnessRecord,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: performing selection", self.name());
        if from.iter().all(|g| g.is_empty()) || count == 0 {
            return Ok(());
        }
        let starting_size = into.len();

        // Pool in objective order across the groups.
        let mut pool: Vec<(usize, u64)> = Vec::new();
        let mut pool_fitnesses: Vec<f64> = Vec::new();
        for (gidx, group) in from.iter().enumerate() {
            for design in group.iter_of() {
                let fitness = fitnesses.fitness_of(design).ok_or_else(|| {
                    handle_failure(Error::Contract(ContractError::MissingFitness {
                        design_id: design.id(),
                    }))
                })?;
                pool.push((gidx, design.id()));
                pool_fitnesses.push(fitness);
            }
        }

        Self::clear_selection_attributes(from);
        let cumulative = Self::cumulative_probabilities(&pool_fitnesses);

        // Stochastic universal sampling: one start, k equally spaced
        // pointers.
        let k = count as f64;
        let start = rng.gen_probability() / k;
        for i in 0..count {
            let pointer = start + i as f64 / k;
            // Upper-bound lookup: zero-width slices can never be hit.
            let at = cumulative.partition_point(|&c| c <= pointer);
            let (gidx, id) = pool[at.min(pool.len() - 1)];

            let group = &mut from[gidx];
            let already_chosen = group
                .get_by_id(id)
                .map(|d| d.has_attribute(SELECTION_ATTRIBUTE))
                .expect("pool ids remain in their groups until the sweep");
            if !already_chosen {
                let slot = group
                    .designs_mut()
                    .iter_mut()
                    .find(|d| d.id() == id)
                    .expect("pool ids remain in their groups until the sweep");
                slot.modify_attribute(SELECTION_ATTRIBUTE, true);
            } else {
                // A repeat winner: duplicate it through the clone
                // allocator and keep the original marked in place.
                let prototype = group.get_by_id(id).expect("checked above");
                let mut copy = target.new_design_from(prototype);
                copy.modify_attribute(SELECTION_ATTRIBUTE, false);
                log::debug!(
                    "{}: design {id} selected again; duplicated as {}",
                    Self::NAME,
                    copy.id()
                );
                into.insert(copy);
            }
        }

        // Sweep marked originals into the destination group.
        for group in from.iter_mut() {
            let marked: Vec<u64> = group
                .iter()
                .filter(|d| d.has_attribute(SELECTION_ATTRIBUTE))
                .map(|d| d.id())
                .collect();
            for id in marked {
                let mut design = group.take_by_id(id).expect("marked ids are present");
                design.modify_attribute(SELECTION_ATTRIBUTE, false);
                into.insert(design);
            }
        }

        log::info!(
            "{}: performed {} total selections",
            self.name(),
            into.len() - starting_size
        );
        Ok(())
    }
}
