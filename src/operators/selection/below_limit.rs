//! Selection by fitness cutoff with a shrinkage floor.
//!
//! A design is kept when its *negated* fitness is strictly below the
//! limit; that is the one convention used everywhere in this selector.
//! If the first pass keeps fewer than `max(min_selections, ceil(shrinkage
//! × requested))` designs, the limit is effectively relaxed by taking the
//! next-best designs until the floor is met, which keeps the population
//! from bottlenecking.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::{ConfigError, ContractError, Error, handle_failure};
use crate::fitness::FitnessRecord;
use crate::operators::selection::select_n_best;
use crate::operators::{GeneticOperator, OperatorFamily, Selector};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Default fraction of the requested selections that must be made.
pub const DEFAULT_SHRINKAGE_PERCENTAGE: f64 = 0.9;

/// Default cutoff compared against the negated fitness.
pub const DEFAULT_LIMIT: f64 = 6.0;

/// Default absolute minimum number of selections.
pub const DEFAULT_MIN_SELECTIONS: usize = 2;

#[derive(Debug, Clone)]
pub struct BelowLimitSelector {
    limit: f64,
    shrinkage: f64,
    min_selections: usize,
}

impl BelowLimitSelector {
    pub const NAME: &'static str = "below_limit";

    pub fn new() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            shrinkage: DEFAULT_SHRINKAGE_PERCENTAGE,
            min_selections: DEFAULT_MIN_SELECTIONS,
        }
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    /// Sets the cutoff below which negated fitnesses survive.
    pub fn set_limit(&mut self, limit: f64) {
        self.limit = limit;
        log::info!("{}: limit now = {limit}", Self::NAME);
    }

    pub fn shrinkage_percentage(&self) -> f64 {
        self.shrinkage
    }

    /// Sets the shrinkage percentage.  Negative values are rejected;
    /// values above 1 are accepted with a warning.
    pub fn set_shrinkage_percentage(&mut self, shrinkage: f64) -> Result<(), Error> {
        if shrinkage < 0.0 {
            return Err(handle_failure(Error::Config(ConfigError::NegativeShrinkage(
                shrinkage,
            ))));
        }
        if shrinkage > 1.0 {
            log::warn!(
                "{}: shrinkage percentage {shrinkage} exceeds 1; more than \
                 100% of the requested selections will be required",
                Self::NAME
            );
        }
        self.shrinkage = shrinkage;
        log::info!("{}: shrinkage percentage now = {shrinkage}", Self::NAME);
        Ok(())
    }

    pub fn min_selections(&self) -> usize {
        self.min_selections
    }

    pub fn set_min_selections(&mut self, min_selections: usize) {
        self.min_selections = min_selections;
    }
}

impl Default for BelowLimitSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for BelowLimitSelector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Selector
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let limit = db.get_real("method.fitness_limit")?;
        log_poll(self.name(), "method.fitness_limit", &limit);
        if let Some(limit) = limit {
            self.set_limit(limit);
        }
        let shrinkage = db.get_real("method.shrinkage_percentage")?;
        log_poll(self.name(), "method.shrinkage_percentage", &shrinkage);
        if let Some(shrinkage) = shrinkage {
            self.set_shrinkage_percentage(shrinkage)?;
        }
        Ok(())
    }
}

impl Selector for BelowLimitSelector {
    fn clone_operator(&self) -> Box<dyn Selector> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
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
        let _ = rng;
        log::debug!("{}: performing selection", self.name());
        let available: usize = from.iter().map(DesignGroup::len).sum();
        if available == 0 {
            return Ok(());
        }
        let starting_size = into.len();

        // Pass 1: keep every design whose negated fitness clears the
        // limit.
        for group in from.iter_mut() {
            let keep: Vec<u64> = {
                let mut keep = Vec::new();
                for design in group.iter_of() {
                    let fitness = fitnesses.fitness_of(design).ok_or_else(|| {
                        handle_failure(Error::Contract(ContractError::MissingFitness {
                            design_id: design.id(),
                        }))
                    })?;
                    if -fitness < self.limit {
                        keep.push(design.id());
                    }
                }
                keep
            };
            for id in keep {
                let design = group.take_by_id(id).expect("kept ids are present");
                into.insert(design);
            }
        }

        // Pass 2: relax toward the floor with the next-best designs.
        let floor = self
            .min_selections
            .max((self.shrinkage * count as f64).ceil() as usize);
        let selected = into.len() - starting_size;
        if selected < floor {
            let shortfall = floor - selected;
            log::info!(
                "{}: only {selected} of a required {floor} selections made; \
                 relaxing the limit for the {shortfall} next-best designs",
                self.name()
            );
            let relaxed = select_n_best(from, shortfall, fitnesses, target)?;
            into.merge(relaxed);
        }

        log::info!(
            "{}: performed {} total selections",
            self.name(),
            into.len() - starting_size
        );
        Ok(())
    }
}
