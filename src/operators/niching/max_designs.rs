//! Distance niching with a global population cap.
//!
//! Runs the per-objective box niching first; if the population still
//! exceeds `max_designs`, designs with the highest *niche count* (the
//! number of other designs within their cutoff ball) are removed, ties
//! broken by worst fitness, until the cap is met.  Extremes are never
//! removed, so the cap can be missed when only extremes remain.

use std::collections::HashMap;

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::operators::niching::{
    DEFAULT_DISTANCE_PERCENTAGE, NicheCache, apply_box_niching, compute_cutoff_distances,
    fill_percentages, is_extreme_design, objective_extremes, poll_cache_flag,
    poll_distance_percentages,
};
use crate::operators::{GeneticOperator, NichePressureApplicator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

/// Default global cap on the post-niching population.
pub const DEFAULT_MAX_DESIGNS: usize = 100;

#[derive(Debug)]
pub struct MaxDesignsNichePressureApplicator {
    percentages: Vec<f64>,
    max_designs: usize,
    cache: NicheCache,
}

impl MaxDesignsNichePressureApplicator {
    pub const NAME: &'static str = "max_designs";

    pub fn new() -> Self {
        Self {
            percentages: vec![DEFAULT_DISTANCE_PERCENTAGE],
            max_designs: DEFAULT_MAX_DESIGNS,
            cache: NicheCache::new(),
        }
    }

    pub fn max_designs(&self) -> usize {
        self.max_designs
    }

    pub fn set_max_designs(&mut self, max_designs: usize) {
        self.max_designs = max_designs;
    }

    pub fn set_distance_percentages(&mut self, percentages: Vec<f64>, nof: usize) {
        self.percentages = fill_percentages(percentages, nof, Self::NAME);
    }

    pub fn set_cache_designs(&mut self, cache: bool, target: &DesignTarget) {
        self.cache.set_enabled(cache, target);
    }

    /// Niche counts among the current members: for each design, how many
    /// others sit within its cutoff box.
    fn niche_counts(population: &DesignGroup, cutoffs: &[f64]) -> HashMap<u64, usize> {
        let snapshot: Vec<(u64, Vec<f64>)> = population
            .iter_of()
            .map(|d| (d.id(), d.objectives().iter().copied().collect()))
            .collect();
        let mut counts: HashMap<u64, usize> =
            snapshot.iter().map(|(id, _)| (*id, 0usize)).collect();
        for i in 0..snapshot.len() {
            for j in (i + 1)..snapshot.len() {
                let too_close = snapshot[i]
                    .1
                    .iter()
                    .zip(snapshot[j].1.iter())
                    .zip(cutoffs.iter())
                    .all(|((&a, &b), &cut)| (a - b).abs() <= cut);
                if too_close {
                    *counts.get_mut(&snapshot[i].0).expect("snapshot id") += 1;
                    *counts.get_mut(&snapshot[j].0).expect("snapshot id") += 1;
                }
            }
        }
        counts
    }
}

impl Default for MaxDesignsNichePressureApplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for MaxDesignsNichePressureApplicator {
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
        poll_distance_percentages(self.name(), db, target.nof(), &mut self.percentages)?;
        let cap = db.get_size("method.jega.max_designs")?;
        log_poll(self.name(), "method.jega.max_designs", &cap);
        if let Some(cap) = cap {
            self.max_designs = cap;
        }
        Ok(())
    }

    fn finalize(&mut self, target: &DesignTarget) -> Result<(), Error> {
        self.cache.flush_to_target(target);
        log::debug!("{}: finalized", self.name());
        Ok(())
    }
}

impl NichePressureApplicator for MaxDesignsNichePressureApplicator {
    fn clone_operator(&self) -> Box<dyn NichePressureApplicator> {
        log::debug!("{}: cloned", self.name());
        Box::new(Self {
            percentages: self.percentages.clone(),
            max_designs: self.max_designs,
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
        let percentages = fill_percentages(self.percentages.clone(), target.nof(), Self::NAME);
        let cutoffs = compute_cutoff_distances(&percentages, &extremes);

        let cache = &mut self.cache;
        let mut removed = apply_box_niching(
            population,
            Some(fitnesses),
            &cutoffs,
            &extremes,
            |design| {
                cache.buffer_design(design, target);
            },
        );

        // Enforce the global cap on what the distance pass left behind.
        while population.len() > self.max_designs {
            let counts = Self::niche_counts(population, &cutoffs);
            let victim = population
                .iter_of()
                .filter(|d| !is_extreme_design(d, &extremes))
                .max_by(|a, b| {
                    let ca = counts.get(&a.id()).copied().unwrap_or(0);
                    let cb = counts.get(&b.id()).copied().unwrap_or(0);
                    ca.cmp(&cb).then_with(|| {
                        // Worst fitness wins the removal on a tie.
                        let fa = fitnesses.fitness_of(a).unwrap_or(f64::NEG_INFINITY);
                        let fb = fitnesses.fitness_of(b).unwrap_or(f64::NEG_INFINITY);
                        fb.total_cmp(&fa)
                    })
                })
                .map(|d| d.id());
            let Some(victim) = victim else {
                log::warn!(
                    "{}: population of {} extremes cannot be reduced to the \
                     cap of {}",
                    self.name(),
                    population.len(),
                    self.max_designs
                );
                break;
            };
            let design = population
                .take_by_id(victim)
                .expect("victim id is in the population");
            self.cache.buffer_design(design, target);
            removed += 1;
        }

        log::info!(
            "{}: removed {removed} designs; population size now {}",
            self.name(),
            population.len()
        );
        Ok(())
    }
}
