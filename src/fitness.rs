//! Fitness records and Pareto dominance.
//!
//! A [`FitnessRecord`] maps design identities to scalar fitness values;
//! higher is better by convention, and selectors that need a penalty
//! direction work with the *negated* fitness.  A missing key signals an
//! unscored design, which is a contract violation once selection begins.
//!
//! Dominance follows the usual constrained ordering: feasible designs
//! beat infeasible ones, less-violating beats more-violating among the
//! infeasible, and Pareto dominance on the minimization forms decides
//! between feasible designs.

use std::collections::HashMap;

use crate::design::responses::ObjectiveInfo;
use crate::design::{Design, DesignTarget};

/// A mapping from design identity to a real fitness value.
#[derive(Debug, Clone, Default)]
pub struct FitnessRecord {
    values: HashMap<u64, f64>,
    sum: f64,
}

impl FitnessRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Records the fitness of a design, replacing any previous value.
    pub fn record(&mut self, design_id: u64, fitness: f64) {
        if let Some(old) = self.values.insert(design_id, fitness) {
            self.sum -= old;
        }
        self.sum += fitness;
    }

    /// The fitness recorded for `design_id`; `None` means unscored.
    pub fn get(&self, design_id: u64) -> Option<f64> {
        self.values.get(&design_id).copied()
    }

    pub fn fitness_of(&self, design: &Design) -> Option<f64> {
        self.get(design.id())
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn average(&self) -> Option<f64> {
        (!self.values.is_empty()).then(|| self.sum / self.values.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.values.values().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.values().copied().reduce(f64::max)
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Whether `a` dominates `b` under constrained Pareto ordering.
pub fn dominates(a: &Design, b: &Design, target: &DesignTarget) -> bool {
    match (a.is_feasible(), b.is_feasible()) {
        (true, false) => true,
        (false, true) => false,
        (false, false) => target.constraint_violation(a) < target.constraint_violation(b),
        (true, true) => pareto_dominates(a, b, target.objective_infos()),
    }
}

/// Plain Pareto dominance on the minimization forms: `a` is no worse in
/// every objective and strictly better in at least one.
fn pareto_dominates(a: &Design, b: &Design, objectives: &[ObjectiveInfo]) -> bool {
    let mut strictly_better = false;
    for (of, info) in objectives.iter().enumerate() {
        let diff = info.preferred_amount(a.objective(of), b.objective(of));
        if diff > 0.0 {
            return false;
        }
        if diff < 0.0 {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Ids of the non-dominated feasible designs among `designs`.  When no
/// design is feasible, the least-violating designs win instead, so the
/// result is never empty for non-empty input.
pub fn non_dominated_ids<'a>(
    designs: impl Iterator<Item = &'a Design> + Clone,
    target: &DesignTarget,
) -> Vec<u64> {
    let mut ids = Vec::new();
    for candidate in designs.clone() {
        let beaten = designs
            .clone()
            .any(|other| other.id() != candidate.id() && dominates(other, candidate, target));
        if !beaten {
            ids.push(candidate.id());
        }
    }
    ids
}
