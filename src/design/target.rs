//! The problem definition and the design allocator.
//!
//! A [`DesignTarget`] owns the authoritative variable / objective /
//! constraint metadata, a bounded free list of recyclable designs (the
//! "guff"), and an archive of discarded-but-evaluated designs.  All
//! design allocation flows through [`new_design`](DesignTarget::new_design)
//! and returns through [`take_design`](DesignTarget::take_design); the
//! guff keeps steady-state generations allocation-free.
//!
//! The guff and archive share one mutex; metadata is immutable while an
//! algorithm runs, so read-only queries never lock.  Methods never call
//! back into locking methods while holding the guard, which keeps the
//! single plain mutex sufficient.

use std::cmp::Ordering;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use ndarray::Array1;

use crate::design::Design;
use crate::design::group::lex_cmp;
use crate::design::responses::{ConstraintInfo, ObjectiveInfo};
use crate::design::variable::VariableInfo;
use crate::random::RandomGenerator;

/// Default bound on the guff.
pub const DEFAULT_MAX_GUFF_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct DesignStore {
    guff: Vec<Design>,
    discards: Vec<Design>,
    max_guff_size: usize,
}

/// The problem definition: metadata plus the design free list and
/// discard archive.
#[derive(Debug)]
pub struct DesignTarget {
    variables: Vec<VariableInfo>,
    objectives: Vec<ObjectiveInfo>,
    constraints: Vec<ConstraintInfo>,
    track_discards: bool,
    revision: AtomicU64,
    next_id: AtomicU64,
    store: Mutex<DesignStore>,
}

impl Default for DesignTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl DesignTarget {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            objectives: Vec::new(),
            constraints: Vec::new(),
            track_discards: true,
            revision: AtomicU64::new(0),
            next_id: AtomicU64::new(0),
            store: Mutex::new(DesignStore {
                guff: Vec::new(),
                discards: Vec::new(),
                max_guff_size: DEFAULT_MAX_GUFF_SIZE,
            }),
        }
    }

    fn store(&self) -> std::sync::MutexGuard<'_, DesignStore> {
        self.store.lock().expect("design store mutex poisoned")
    }

    /// Number of design variables.
    pub fn ndv(&self) -> usize {
        self.variables.len()
    }

    /// Number of objectives.
    pub fn nof(&self) -> usize {
        self.objectives.len()
    }

    /// Number of constraints.
    pub fn ncn(&self) -> usize {
        self.constraints.len()
    }

    pub fn variable_infos(&self) -> &[VariableInfo] {
        &self.variables
    }

    pub fn objective_infos(&self) -> &[ObjectiveInfo] {
        &self.objectives
    }

    pub fn constraint_infos(&self) -> &[ConstraintInfo] {
        &self.constraints
    }

    /// Monotonic counter bumped on every metadata change; consumers such
    /// as the bit manipulator use it to invalidate caches.
    pub fn revision(&self) -> u64 {
        self.revision.load(AtomicOrdering::Relaxed)
    }

    /// Adds a design variable.  Any recycled or archived designs have the
    /// wrong shape afterwards, so both stores are flushed.
    pub fn add_variable(&mut self, info: VariableInfo) -> &mut Self {
        self.variables.push(info);
        self.note_metadata_change();
        self
    }

    /// Adds an objective, flushing the guff and archive.
    pub fn add_objective(&mut self, info: ObjectiveInfo) -> &mut Self {
        self.objectives.push(info);
        self.note_metadata_change();
        self
    }

    /// Adds a constraint, flushing the guff and archive.
    pub fn add_constraint(&mut self, info: ConstraintInfo) -> &mut Self {
        self.constraints.push(info);
        self.note_metadata_change();
        self
    }

    fn note_metadata_change(&mut self) {
        self.revision.fetch_add(1, AtomicOrdering::Relaxed);
        let store = self.store.get_mut().expect("design store mutex poisoned");
        store.guff.clear();
        store.discards.clear();
    }

    /// Whether evaluated designs handed back through
    /// [`take_design`](Self::take_design) are archived.
    pub fn track_discards(&self) -> bool {
        self.track_discards
    }

    pub fn set_track_discards(&mut self, track: bool) {
        self.track_discards = track;
    }

    pub fn max_guff_size(&self) -> usize {
        self.store().max_guff_size
    }

    /// Re-bounds the guff.  A smaller bound shrinks lazily on the next
    /// design arrival rather than eagerly dropping storage.
    pub fn set_max_guff_size(&self, size: usize) {
        self.store().max_guff_size = size;
    }

    pub fn guff_size(&self) -> usize {
        self.store().guff.len()
    }

    pub fn discard_count(&self) -> usize {
        self.store().discards.len()
    }

    fn next_design_id(&self) -> u64 {
        self.next_id.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    /// Allocates a blank design, recycling from the guff when possible.
    /// Each activation binds a fresh, monotonically increasing id.
    pub fn new_design(&self) -> Design {
        let id = self.next_design_id();
        let recycled = self.store().guff.pop();
        match recycled {
            Some(mut design) => {
                design.rebind(id, self.ndv(), self.nof(), self.ncn());
                design
            }
            None => Design::new(id, self.ndv(), self.nof(), self.ncn()),
        }
    }

    /// Allocates a copy of `prototype` under a fresh id, flagged as a
    /// clone.
    pub fn new_design_from(&self, prototype: &Design) -> Design {
        let id = self.next_design_id();
        let recycled = self.store().guff.pop();
        match recycled {
            Some(mut design) => {
                design.rebind(id, self.ndv(), self.nof(), self.ncn());
                design.clone_payload_from(prototype);
                design.set_cloned(true);
                design
            }
            None => prototype.duplicate(id),
        }
    }

    /// Takes a design out of circulation.  Evaluated designs go to the
    /// discard archive when tracking is on; everything else is recycled
    /// through the guff while it has room, and dropped otherwise.
    pub fn take_design(&self, mut design: Design) {
        let mut store = self.store();
        if self.track_discards && design.is_evaluated() && !design.is_ill_conditioned() {
            let discards = &mut store.discards;
            let pos = discards.partition_point(|d| {
                match lex_cmp(d.variables(), design.variables()) {
                    Ordering::Less => true,
                    Ordering::Equal => d.id() < design.id(),
                    Ordering::Greater => false,
                }
            });
            discards.insert(pos, design);
        } else {
            while store.guff.len() > store.max_guff_size {
                store.guff.pop();
            }
            if store.guff.len() < store.max_guff_size {
                design.reset(0);
                store.guff.push(design);
            }
            // Out of room: the design is dropped here.
        }
    }

    /// Pulls a previously discarded design back out of the archive.
    pub fn reclaim_design(&self, id: u64) -> Option<Design> {
        let mut store = self.store();
        let pos = store.discards.iter().position(|d| d.id() == id)?;
        Some(store.discards.remove(pos))
    }

    /// Runs `f` against the discard archive under the store lock.
    pub fn with_discards<R>(&self, f: impl FnOnce(&[Design]) -> R) -> R {
        let store = self.store();
        f(&store.discards)
    }

    /// Empties the discard archive, returning its designs.
    pub fn drain_discards(&self) -> Vec<Design> {
        std::mem::take(&mut self.store().discards)
    }

    pub fn flush_guff(&self) {
        self.store().guff.clear();
    }

    pub fn flush_discards(&self) {
        self.store().discards.clear();
    }

    /// A fresh vector of uniform random legal representations.
    pub fn random_design_variables(&self, rng: &mut dyn RandomGenerator) -> Array1<f64> {
        Array1::from_vec(self.variables.iter().map(|v| v.random_rep(rng)).collect())
    }

    /// Replaces every out-of-bounds representation with the nearest legal
    /// one and records bounds feasibility.  Returns whether anything
    /// changed.
    pub fn legalize_design(&self, design: &mut Design) -> bool {
        let mut changed = false;
        for (dv, info) in self.variables.iter().enumerate() {
            let rep = design.variable(dv);
            if !info.is_rep_in_bounds(rep) {
                design.set_variable(dv, info.nearest_valid_rep(rep));
                changed = true;
            }
        }
        design.set_satisfies_bounds(true);
        changed
    }

    /// Total constraint violation of an evaluated design.
    pub fn constraint_violation(&self, design: &Design) -> f64 {
        self.constraints
            .iter()
            .zip(design.constraints().iter())
            .map(|(info, &value)| info.violation(value))
            .sum()
    }

    /// Recomputes the feasibility flags from the current vectors.
    pub fn check_feasibility(&self, design: &mut Design) {
        let in_bounds = self
            .variables
            .iter()
            .enumerate()
            .all(|(dv, info)| info.is_rep_in_bounds(design.variable(dv)));
        design.set_satisfies_bounds(in_bounds);
        let violation = self.constraint_violation(design);
        design.set_satisfies_constraints(violation == 0.0);
    }

    /// Converts a representation vector into the value vector evaluators
    /// see.
    pub fn reps_to_values(&self, reps: &Array1<f64>) -> Array1<f64> {
        Array1::from_vec(
            self.variables
                .iter()
                .zip(reps.iter())
                .map(|(info, &rep)| info.rep_to_value(rep))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::responses::{ConstraintInfo, ObjectiveInfo};
    use crate::design::variable::VariableInfo;

    fn simple_target() -> DesignTarget {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_variable(VariableInfo::continuum_real("y", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"))
            .add_constraint(ConstraintInfo::upper_bounded("g", 0.0));
        target
    }

    #[test]
    fn test_ids_are_monotonic() {
        let target = simple_target();
        let a = target.new_design();
        let b = target.new_design();
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_guff_recycles_designs() {
        let target = simple_target();
        let mut d = target.new_design();
        d.set_variable(0, 0.25);
        target.take_design(d);
        assert_eq!(target.guff_size(), 1);

        let recycled = target.new_design();
        assert_eq!(target.guff_size(), 0);
        // A recycled design comes back blank under a fresh id.
        assert_eq!(recycled.variable(0), 0.0);
        assert!(!recycled.is_evaluated());
    }

    #[test]
    fn test_take_design_routes_evaluated_to_archive() {
        let target = simple_target();
        let mut d = target.new_design();
        let id = d.id();
        d.set_evaluated(true);
        target.take_design(d);
        assert_eq!(target.discard_count(), 1);
        assert_eq!(target.guff_size(), 0);

        let reclaimed = target.reclaim_design(id).expect("design was archived");
        assert_eq!(reclaimed.id(), id);
        assert_eq!(target.discard_count(), 0);
    }

    #[test]
    fn test_guff_respects_bound() {
        let target = simple_target();
        target.set_max_guff_size(2);
        for _ in 0..5 {
            let d = target.new_design();
            target.take_design(d);
        }
        assert!(target.guff_size() <= 2);
    }

    #[test]
    fn test_metadata_change_flushes_stores() {
        let mut target = simple_target();
        let mut d = target.new_design();
        d.set_evaluated(true);
        target.take_design(d);
        target.take_design(target.new_design());
        assert_eq!(target.discard_count(), 1);
        assert_eq!(target.guff_size(), 1);

        let revision = target.revision();
        target.add_variable(VariableInfo::logical("flag"));
        assert_eq!(target.discard_count(), 0);
        assert_eq!(target.guff_size(), 0);
        assert!(target.revision() > revision);
    }

    #[test]
    fn test_legalize_design() {
        let target = simple_target();
        let mut d = target.new_design();
        d.set_variable(0, 1.7);
        d.set_variable(1, -0.3);
        assert!(target.legalize_design(&mut d));
        assert_eq!(d.variable(0), 1.0);
        assert_eq!(d.variable(1), 0.0);
        assert!(d.satisfies_bounds());
        assert!(!target.legalize_design(&mut d));
    }

    #[test]
    fn test_feasibility_from_constraints() {
        let target = simple_target();
        let mut d = target.new_design();
        d.set_constraint(0, -1.0);
        target.check_feasibility(&mut d);
        assert!(d.is_feasible());

        d.set_constraint(0, 0.5);
        target.check_feasibility(&mut d);
        assert!(!d.is_feasible());
        assert!((target.constraint_violation(&d) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_new_design_from_archived_reachability() {
        // new_design(d) followed by take_design(d) leaves the reachable
        // count unchanged: the copy lives on, the original is archived.
        let target = simple_target();
        let mut original = target.new_design();
        original.set_evaluated(true);
        let copy = target.new_design_from(&original);
        assert!(copy.is_cloned());
        assert_eq!(copy.variables(), original.variables());

        target.take_design(original);
        assert_eq!(target.discard_count(), 1);
    }
}
