//! Niche-pressure applicators: anti-clustering filters in performance
//! space.
//!
//! Nichers run after fitness assessment and selection, thinning designs
//! that crowd each other in objective space.  Pareto extremes — designs
//! attaining an objective's minimum or maximum — are always retained.
//! A nicher may cache the designs it removes and re-insert them at the
//! top of the next selection cycle (`pre_selection`), so that no other
//! operator ends up performing selection.

pub mod distance;
pub mod max_designs;
pub mod radial;

pub use distance::DistanceNichePressureApplicator;
pub use max_designs::MaxDesignsNichePressureApplicator;
pub use radial::RadialNichePressureApplicator;

use std::collections::HashSet;

use ndarray::Array2;
use ndarray_stats::QuantileExt;

use crate::design::{Design, DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::params::ParameterDatabase;

/// Default value used for all distance percentages.
pub const DEFAULT_DISTANCE_PERCENTAGE: f64 = 0.1;

/// The do-nothing niche pressure applicator.
#[derive(Debug, Clone, Default)]
pub struct NullNichePressureApplicator;

impl NullNichePressureApplicator {
    pub const NAME: &'static str = "null_niching";

    pub fn new() -> Self {
        Self
    }
}

impl crate::operators::GeneticOperator for NullNichePressureApplicator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> crate::operators::OperatorFamily {
        crate::operators::OperatorFamily::NichePressure
    }
}

impl crate::operators::NichePressureApplicator for NullNichePressureApplicator {
    fn clone_operator(&self) -> Box<dyn crate::operators::NichePressureApplicator> {
        log::debug!("{}: cloned", Self::NAME);
        Box::new(self.clone())
    }

    fn apply_niche_pressure(
        &mut self,
        _population: &mut DesignGroup,
        _fitnesses: &FitnessRecord,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        log::debug!("{}: applying niche pressure (no-op)", Self::NAME);
        Ok(())
    }
}

/// The cache of niched-out designs shared by all nichers through
/// composition.
#[derive(Debug, Default)]
pub(crate) struct NicheCache {
    enabled: bool,
    buffer: Vec<Design>,
}

impl NicheCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Turns caching on or off.  Disabling flushes any buffered designs
    /// back to the target.
    pub(crate) fn set_enabled(&mut self, enabled: bool, target: &DesignTarget) {
        self.enabled = enabled;
        if !enabled {
            self.flush_to_target(target);
        }
    }

    /// Buffers a niched-out design, or hands it to the target when
    /// caching is off.  Returns whether the design was cached.
    pub(crate) fn buffer_design(&mut self, design: Design, target: &DesignTarget) -> bool {
        if self.enabled {
            self.buffer.push(design);
            true
        } else {
            target.take_design(design);
            false
        }
    }

    /// Re-inserts buffered designs into `group`, skipping (and retiring)
    /// any that would duplicate a current member.
    pub(crate) fn reassimilate(&mut self, group: &mut DesignGroup, target: &DesignTarget) {
        if self.buffer.is_empty() {
            return;
        }
        let buffered = std::mem::take(&mut self.buffer);
        let mut returned = 0usize;
        for design in buffered {
            if group.contains_variables(design.variables()) {
                target.take_design(design);
            } else {
                group.insert(design);
                returned += 1;
            }
        }
        log::info!("niche cache: {returned} designs re-assimilated before selection");
    }

    pub(crate) fn flush_to_target(&mut self, target: &DesignTarget) {
        for design in self.buffer.drain(..) {
            target.take_design(design);
        }
    }

    /// A copy of the cache settings with an empty buffer; buffered
    /// designs stay with their original algorithm.
    pub(crate) fn clone_configuration(&self) -> Self {
        Self {
            enabled: self.enabled,
            buffer: Vec::new(),
        }
    }
}

/// Polls `method.jega.cache_niched_designs` into `cache`.
pub(crate) fn poll_cache_flag(
    operator: &str,
    db: &ParameterDatabase,
    target: &DesignTarget,
    cache: &mut NicheCache,
) -> Result<(), Error> {
    let flag = db.get_bool("method.jega.cache_niched_designs")?;
    crate::params::log_poll(operator, "method.jega.cache_niched_designs", &flag);
    if let Some(flag) = flag {
        cache.set_enabled(flag, target);
    }
    Ok(())
}

/// Polls `method.jega.niche_vector` (a list, or a scalar filling every
/// objective) into a per-objective percentage vector.
pub(crate) fn poll_distance_percentages(
    operator: &str,
    db: &ParameterDatabase,
    nof: usize,
    percentages: &mut Vec<f64>,
) -> Result<(), Error> {
    const KEY: &str = "method.jega.niche_vector";
    if !db.contains(KEY) {
        log::info!("{operator}: {KEY} not in parameter database, default used");
        return Ok(());
    }
    if let Ok(Some(values)) = db.get_real_vec(KEY) {
        log::info!("{operator}: polled {KEY} = {values:?}");
        *percentages = fill_percentages(values, nof, operator);
        return Ok(());
    }
    if let Ok(Some(single)) = db.get_real(KEY) {
        log::info!("{operator}: polled {KEY} = {single}");
        *percentages = vec![single; nof];
        return Ok(());
    }
    Err(Error::Config(crate::error::ConfigError::WrongParameterType {
        key: KEY.to_string(),
        expected: "real list or real",
    }))
}

/// Expands a percentage vector to one entry per objective: a single
/// value fills all, any other mismatch falls back to the first entry.
pub(crate) fn fill_percentages(values: Vec<f64>, nof: usize, operator: &str) -> Vec<f64> {
    match values.len() {
        0 => vec![DEFAULT_DISTANCE_PERCENTAGE; nof],
        1 => vec![values[0]; nof],
        n if n == nof => values,
        n => {
            log::warn!(
                "{operator}: received {n} distance percentages for a {nof} \
                 objective problem; using the first value for all objectives"
            );
            vec![values[0]; nof]
        }
    }
}

/// Per-objective `(min, max)` over the group; `None` for an empty group.
pub(crate) fn objective_extremes(group: &DesignGroup) -> Option<Vec<(f64, f64)>> {
    if group.is_empty() {
        return None;
    }
    let nof = group.iter().next()?.objectives().len();
    let mut matrix = Array2::zeros((group.len(), nof));
    for (i, design) in group.iter_of().enumerate() {
        matrix.row_mut(i).assign(design.objectives());
    }
    let mut extremes = Vec::with_capacity(nof);
    for of in 0..nof {
        let column = matrix.column(of);
        let min = *column.min().ok()?;
        let max = *column.max().ok()?;
        extremes.push((min, max));
    }
    Some(extremes)
}

/// Whether a design attains the minimum or maximum of any objective.
pub(crate) fn is_extreme_design(design: &Design, extremes: &[(f64, f64)]) -> bool {
    design
        .objectives()
        .iter()
        .zip(extremes.iter())
        .any(|(&f, &(lo, hi))| f == lo || f == hi)
}

/// Per-objective cutoff distances: `|pct| × range`.
pub(crate) fn compute_cutoff_distances(
    percentages: &[f64],
    extremes: &[(f64, f64)],
) -> Vec<f64> {
    percentages
        .iter()
        .zip(extremes.iter())
        .map(|(&pct, &(lo, hi))| (pct * (hi - lo)).abs())
        .collect()
}

#[derive(Debug)]
struct NicheEntry {
    id: u64,
    objectives: Vec<f64>,
    extreme: bool,
    fitness: f64,
}

fn build_entries(
    group: &DesignGroup,
    fitnesses: Option<&FitnessRecord>,
    extremes: &[(f64, f64)],
) -> Vec<NicheEntry> {
    group
        .iter_of()
        .map(|design| NicheEntry {
            id: design.id(),
            objectives: design.objectives().iter().copied().collect(),
            extreme: is_extreme_design(design, extremes),
            fitness: fitnesses
                .and_then(|f| f.fitness_of(design))
                .unwrap_or(f64::NEG_INFINITY),
        })
        .collect()
}

/// Removes designs that sit within the per-objective cutoff box of a
/// better design, never removing Pareto extremes.  Removed designs go to
/// `sink`; returns the number removed.
///
/// The scan walks the OF-sorted snapshot and stops each inner sweep as
/// soon as the first-objective distance exceeds its cutoff, which the
/// sort makes safe.
pub(crate) fn apply_box_niching(
    group: &mut DesignGroup,
    fitnesses: Option<&FitnessRecord>,
    cutoffs: &[f64],
    extremes: &[(f64, f64)],
    mut sink: impl FnMut(Design),
) -> usize {
    let entries = build_entries(group, fitnesses, extremes);
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
            let obj0_distance = (curr.objectives[0] - next.objectives[0]).abs();
            if obj0_distance > cutoffs[0] {
                break;
            }
            let too_close = curr
                .objectives
                .iter()
                .zip(next.objectives.iter())
                .zip(cutoffs.iter())
                .all(|((&a, &b), &cut)| (a - b).abs() <= cut);
            if !too_close {
                continue;
            }
            // Extremes are untouchable.  With fitnesses on hand the worse
            // of the pair goes; without them (the post-processing sweep)
            // only the later design is ever removed.
            let victim = if fitnesses.is_none() {
                if next.extreme {
                    continue;
                }
                next.id
            } else if !next.extreme && (next.fitness <= curr.fitness || curr.extreme) {
                next.id
            } else if !curr.extreme {
                curr.id
            } else {
                continue;
            };
            removed.insert(victim);
        }
    }

    for id in &removed {
        let design = group
            .take_by_id(*id)
            .expect("ids selected for removal are in the group");
        sink(design);
    }
    removed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;
    use ndarray::array;

    pub(crate) fn front_target() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f0"))
            .add_objective(ObjectiveInfo::minimize("f1"));
        target
    }

    pub(crate) fn front_group(target: &DesignTarget, points: &[[f64; 2]]) -> DesignGroup {
        let mut group = DesignGroup::new();
        for (i, p) in points.iter().enumerate() {
            let mut d = target.new_design();
            d.set_variable(0, i as f64 / points.len() as f64);
            d.objectives_mut().assign(&array![p[0], p[1]]);
            d.set_evaluated(true);
            d.set_satisfies_bounds(true);
            d.set_satisfies_constraints(true);
            group.insert(d);
        }
        group
    }

    #[test]
    fn test_extremes_and_cutoffs() {
        let target = front_target();
        let group = front_group(&target, &[[0.0, 1.0], [0.5, 0.5], [1.0, 0.0]]);
        let extremes = objective_extremes(&group).unwrap();
        assert_eq!(extremes, vec![(0.0, 1.0), (0.0, 1.0)]);

        let cutoffs = compute_cutoff_distances(&[0.1, 0.2], &extremes);
        assert_eq!(cutoffs, vec![0.1, 0.2]);

        let designs: Vec<_> = group.iter_of().collect();
        assert!(is_extreme_design(designs[0], &extremes));
        assert!(!is_extreme_design(designs[1], &extremes));
    }

    #[test]
    fn test_box_niching_removes_non_extreme_neighbour() {
        let target = front_target();
        let mut group = front_group(
            &target,
            &[[0.0, 1.0], [0.05, 0.95], [0.5, 0.5], [0.95, 0.05], [1.0, 0.0]],
        );
        let extremes = objective_extremes(&group).unwrap();
        let cutoffs = compute_cutoff_distances(&[0.1, 0.1], &extremes);

        let mut retired = Vec::new();
        let removed = apply_box_niching(&mut group, None, &cutoffs, &extremes, |d| {
            retired.push(d.id())
        });

        // (0.05, 0.95) crowds the extreme (0, 1) and goes.  The pair
        // (0.95, 0.05)/(1, 0) is also within the cutoff box, but its
        // later member is an extreme, so both survive.
        assert_eq!(removed, 1);
        assert_eq!(group.len(), 4);
        let survivors: Vec<Vec<f64>> = group
            .iter_of()
            .map(|d| d.objectives().iter().copied().collect())
            .collect();
        assert!(!survivors.contains(&vec![0.05, 0.95]));
    }

    #[test]
    fn test_cache_reassimilation_skips_clones() {
        let target = front_target();
        let mut group = front_group(&target, &[[0.0, 1.0]]);
        let mut cache = NicheCache::new();
        cache.set_enabled(true, &target);

        // One cached twin of the resident design, one new design.
        let resident = group.iter().next().unwrap();
        let twin = target.new_design_from(resident);
        cache.buffer_design(twin, &target);
        let mut fresh = target.new_design();
        fresh.set_variable(0, 0.75);
        fresh.set_evaluated(true);
        cache.buffer_design(fresh, &target);

        cache.reassimilate(&mut group, &target);
        assert_eq!(group.len(), 2);
        // The twin went back to the target, and being evaluated it was
        // archived.
        assert_eq!(target.discard_count(), 1);
    }

    #[test]
    fn test_fill_percentages_variants() {
        assert_eq!(fill_percentages(vec![], 2, "t"), vec![0.1, 0.1]);
        assert_eq!(fill_percentages(vec![0.3], 2, "t"), vec![0.3, 0.3]);
        assert_eq!(fill_percentages(vec![0.1, 0.2], 2, "t"), vec![0.1, 0.2]);
        assert_eq!(fill_percentages(vec![0.2, 0.3, 0.4], 2, "t"), vec![0.2, 0.2]);
    }
}
