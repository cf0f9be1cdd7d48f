//! Radial niching: a single combined radius in normalized objective
//! space.
//!
//! Objective deltas are normalized by the per-objective ranges and
//! combined into one Euclidean distance; two designs are too close when
//! that distance is within the radius, which is the norm of the
//! configured percentage vector.  Extremes are always retained and the
//! worse of a too-close pair is removed.

use std::collections::HashSet;

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::operators::niching::{
    DEFAULT_DISTANCE_PERCENTAGE, NicheCache, fill_percentages, is_extreme_design,
    objective_extremes, poll_cache_flag, poll_distance_percentages,
};
use crate::operators::{GeneticOperator, NichePressureApplicator, OperatorFamily};
use crate::params::ParameterDatabase;

#[derive(Debug)]
pub struct RadialNichePressureApplicator {
    percentages: Vec<f64>,
    cache: NicheCache,
}

impl RadialNichePressureApplicator {
    pub const NAME: &'static str = "radial";

    pub fn new() -> Self {
        Self {
            percentages: vec![DEFAULT_DISTANCE_PERCENTAGE],
            cache: NicheCache::new(),
        }
    }

    pub fn set_distance_percentages(&mut self, percentages: Vec<f64>, nof: usize) {
        self.percentages = fill_percentages(percentages, nof, Self::NAME);
    }

    pub fn set_cache_designs(&mut self, cache: bool, target: &DesignTarget) {
        self.cache.set_enabled(cache, target);
    }

    /// The combined radius: the Euclidean norm of the percentage vector.
    fn radius(&self, nof: usize) -> f64 {
        fill_percentages(self.percentages.clone(), nof, Self::NAME)
            .iter()
            .map(|p| p * p)
            .sum::<f64>()
            .sqrt()
    }
}

impl Default for RadialNichePressureApplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for RadialNichePressureApplicator {
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

impl NichePressureApplicator for RadialNichePressureApplicator {
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
        let radius = self.radius(target.nof());
        let ranges: Vec<f64> = extremes.iter().map(|&(lo, hi)| hi - lo).collect();

        struct Entry {
            id: u64,
            objectives: Vec<f64>,
            extreme: bool,
            fitness: f64,
        }
        let entries: Vec<Entry> = population
            .iter_of()
            .map(|d| Entry {
                id: d.id(),
                objectives: d.objectives().iter().copied().collect(),
                extreme: is_extreme_design(d, &extremes),
                fitness: fitnesses.fitness_of(d).unwrap_or(f64::NEG_INFINITY),
            })
            .collect();

        let mut removed: HashSet<u64> = HashSet::new();
        for i in 0..entries.len() {
            if removed.contains(&entries[i].id) {
                continue;
            }
            for j in (i + 1)..entries.len() {
                let (curr, next) = (&entries[i], &entries[j]);
                if removed.contains(&curr.id) {
                    break;
                }
                if removed.contains(&next.id) {
                    continue;
                }
                // The OF-sort means the first-objective term only grows;
                // once it alone exceeds the radius the sweep can stop.
                let first_term = if ranges[0] > 0.0 {
                    (curr.objectives[0] - next.objectives[0]).abs() / ranges[0]
                } else {
                    0.0
                };
                if first_term > radius {
                    break;
                }
                let distance = curr
                    .objectives
                    .iter()
                    .zip(next.objectives.iter())
                    .zip(ranges.iter())
                    .map(|((&a, &b), &range)| {
                        if range > 0.0 { (a - b) / range } else { 0.0 }
                    })
                    .map(|n| n * n)
                    .sum::<f64>()
                    .sqrt();
                if distance > radius {
                    continue;
                }
                let victim = if !next.extreme && (next.fitness <= curr.fitness || curr.extreme) {
                    next.id
                } else if !curr.extreme {
                    curr.id
                } else {
                    continue;
                };
                removed.insert(victim);
            }
        }

        let count = removed.len();
        for id in removed {
            let design = population
                .take_by_id(id)
                .expect("ids selected for removal are in the group");
            self.cache.buffer_design(design, target);
        }
        log::info!(
            "{}: removed {count} designs; population size now {}",
            self.name(),
            population.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;
    use ndarray::array;

    fn front_target() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f0"))
            .add_objective(ObjectiveInfo::minimize("f1"));
        target
    }

    #[test]
    fn test_radius_combines_percentages() {
        let mut nicher = RadialNichePressureApplicator::new();
        nicher.set_distance_percentages(vec![0.3, 0.4], 2);
        assert!((nicher.radius(2) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_close_pair_thinned_extremes_kept() {
        let target = front_target();
        let mut population = DesignGroup::new();
        for p in [[0.0, 1.0], [0.02, 0.98], [0.5, 0.5], [1.0, 0.0]] {
            let mut d = target.new_design();
            d.set_variable(0, p[0]);
            d.objectives_mut().assign(&array![p[0], p[1]]);
            d.set_evaluated(true);
            population.insert(d);
        }
        let mut record = FitnessRecord::new();
        for d in population.iter() {
            record.record(d.id(), 0.0);
        }

        let mut nicher = RadialNichePressureApplicator::new();
        nicher.set_distance_percentages(vec![0.1, 0.1], 2);
        nicher
            .apply_niche_pressure(&mut population, &record, &target)
            .unwrap();

        assert_eq!(population.len(), 3);
        let objectives: Vec<Vec<f64>> = population
            .iter_of()
            .map(|d| d.objectives().iter().copied().collect())
            .collect();
        assert!(!objectives.contains(&vec![0.02, 0.98]));
    }
}
