//! Per-objective box distance niching.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::operators::niching::{
    DEFAULT_DISTANCE_PERCENTAGE, NicheCache, apply_box_niching, compute_cutoff_distances,
    fill_percentages, objective_extremes, poll_cache_flag, poll_distance_percentages,
};
use crate::operators::{GeneticOperator, NichePressureApplicator, OperatorFamily};
use crate::params::ParameterDatabase;

/// Removes designs that sit within the per-objective cutoff box
/// (`|pct_i| × objective_range_i` on every axis) of a better design.
#[derive(Debug)]
pub struct DistanceNichePressureApplicator {
    percentages: Vec<f64>,
    cache: NicheCache,
}

impl DistanceNichePressureApplicator {
    pub const NAME: &'static str = "distance";

    pub fn new() -> Self {
        Self {
            percentages: vec![DEFAULT_DISTANCE_PERCENTAGE],
            cache: NicheCache::new(),
        }
    }

    /// Sets the per-objective distance percentages; a single value fills
    /// every objective.
    pub fn set_distance_percentages(&mut self, percentages: Vec<f64>, nof: usize) {
        self.percentages = fill_percentages(percentages, nof, Self::NAME);
    }

    pub fn set_cache_designs(&mut self, cache: bool, target: &DesignTarget) {
        self.cache.set_enabled(cache, target);
    }

    /// Consistent per-objective percentages even when configuration
    /// arrived before the objective count was known.
    fn percentages_for(&self, nof: usize) -> Vec<f64> {
        fill_percentages(self.percentages.clone(), nof, Self::NAME)
    }
}

impl Default for DistanceNichePressureApplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for DistanceNichePressureApplicator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::NichePressure
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        poll_cache_flag(self.name(), db, target, &mut self.cache)?;
        poll_distance_percentages(self.name(), db, target.nof(), &mut self.percentages)
    }

    fn finalize(&mut self, target: &DesignTarget) -> Result<(), Error> {
        self.cache.flush_to_target(target);
        log::debug!("{}: finalized", self.name());
        Ok(())
    }
}

impl NichePressureApplicator for DistanceNichePressureApplicator {
    fn clone_operator(&self) -> Box<dyn NichePressureApplicator> {
        log::debug!("{}: cloned", self.name());
        Box::new(Self {
            percentages: self.percentages.clone(),
            cache: self.cache.clone_configuration(),
        })
    }

    fn pre_selection(
        &mut self,
        population: &mut DesignGroup,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        self.cache.reassimilate(population, target);
        Ok(())
    }

    fn apply_niche_pressure(
        &mut self,
        population: &mut DesignGroup,
        fitnesses: &FitnessRecord,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let Some(extremes) = objective_extremes(population) else {
            return Ok(());
        };
        let cutoffs = compute_cutoff_distances(&self.percentages_for(target.nof()), &extremes);

        let cache = &mut self.cache;
        let removed = apply_box_niching(
            population,
            Some(fitnesses),
            &cutoffs,
            &extremes,
            |design| {
                cache.buffer_design(design, target);
            },
        );
        log::info!(
            "{}: removed {removed} designs; population size now {}",
            self.name(),
            population.len()
        );
        Ok(())
    }
}
