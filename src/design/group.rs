//! Populations: groups of designs with two synchronized sorted views.
//!
//! A [`DesignGroup`] exclusively owns its designs and maintains two
//! orderings over the same set: the DV-sort (lexicographic on the
//! variable-representation vector) and the OF-sort (lexicographic on the
//! objective vector), both with the design id as the final tie-break.
//! Insertion and removal keep the views synchronized; code that mutates
//! variables or objectives in place (mutators, evaluators) must call
//! [`synchronize`](DesignGroup::synchronize) before relying on the views
//! again.

use std::cmp::Ordering;

use ndarray::Array1;
use num_traits::Zero;
use ordered_float::OrderedFloat;

use crate::design::Design;
use crate::error::ContractError;

/// Lexicographic total order over two equally shaped vectors.
pub(crate) fn lex_cmp(a: &Array1<f64>, b: &Array1<f64>) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match OrderedFloat(*x).cmp(&OrderedFloat(*y)) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

/// An ordered population of designs.
#[derive(Debug, Default)]
pub struct DesignGroup {
    designs: Vec<Design>,
    dv_order: Vec<usize>,
    of_order: Vec<usize>,
}

impl DesignGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.len().is_zero()
    }

    /// Inserts a design, keeping both sorted views current.
    pub fn insert(&mut self, design: Design) {
        let slot = self.designs.len();
        let dv_pos = self.dv_order.partition_point(|&s| {
            match lex_cmp(self.designs[s].variables(), design.variables()) {
                Ordering::Less => true,
                Ordering::Equal => self.designs[s].id() < design.id(),
                Ordering::Greater => false,
            }
        });
        let of_pos = self.of_order.partition_point(|&s| {
            match lex_cmp(self.designs[s].objectives(), design.objectives()) {
                Ordering::Less => true,
                Ordering::Equal => self.designs[s].id() < design.id(),
                Ordering::Greater => false,
            }
        });
        self.designs.push(design);
        self.dv_order.insert(dv_pos, slot);
        self.of_order.insert(of_pos, slot);
    }

    /// Removes and returns the design with the given id, if present.
    pub fn take_by_id(&mut self, id: u64) -> Option<Design> {
        let slot = self.designs.iter().position(|d| d.id() == id)?;
        let last = self.designs.len() - 1;
        let design = self.designs.swap_remove(slot);
        for order in [&mut self.dv_order, &mut self.of_order] {
            let pos = order
                .iter()
                .position(|&s| s == slot)
                .expect("sorted views track every design");
            order.remove(pos);
            if slot != last {
                for s in order.iter_mut() {
                    if *s == last {
                        *s = slot;
                    }
                }
            }
        }
        Some(design)
    }

    /// Empties the group, returning every design in storage order.
    pub fn drain(&mut self) -> Vec<Design> {
        self.dv_order.clear();
        self.of_order.clear();
        std::mem::take(&mut self.designs)
    }

    /// Moves every design of `other` into this group.
    pub fn merge(&mut self, mut other: DesignGroup) {
        for design in other.drain() {
            self.insert(design);
        }
    }

    /// Storage-order iteration (insertion order, disturbed by removals).
    pub fn iter(&self) -> std::slice::Iter<'_, Design> {
        self.designs.iter()
    }

    /// Iteration in variable-vector order.
    pub fn iter_dv(&self) -> impl Iterator<Item = &Design> {
        self.dv_order.iter().map(move |&s| &self.designs[s])
    }

    /// Iteration in objective-vector order.
    pub fn iter_of(&self) -> impl Iterator<Item = &Design> {
        self.of_order.iter().map(move |&s| &self.designs[s])
    }

    /// The designs as a mutable slice.  After mutating variables or
    /// objectives through it, call [`synchronize`](Self::synchronize).
    pub fn designs_mut(&mut self) -> &mut [Design] {
        &mut self.designs
    }

    pub fn get(&self, slot: usize) -> &Design {
        &self.designs[slot]
    }

    /// Mutable access by storage slot.  After mutating variables or
    /// objectives, call [`synchronize`](Self::synchronize).
    pub fn get_mut(&mut self, slot: usize) -> &mut Design {
        &mut self.designs[slot]
    }

    pub fn get_by_id(&self, id: u64) -> Option<&Design> {
        self.designs.iter().find(|d| d.id() == id)
    }

    /// Whether the group contains a design with exactly these variable
    /// representations (clone detection).
    pub fn contains_variables(&self, variables: &Array1<f64>) -> bool {
        let pos = self
            .dv_order
            .partition_point(|&s| lex_cmp(self.designs[s].variables(), variables) == Ordering::Less);
        pos < self.dv_order.len()
            && lex_cmp(self.designs[self.dv_order[pos]].variables(), variables) == Ordering::Equal
    }

    /// Re-sorts both views.  Required after in-place mutation of variable
    /// or objective vectors.
    pub fn synchronize(&mut self) {
        let designs = &self.designs;
        self.dv_order.sort_by(|&a, &b| {
            lex_cmp(designs[a].variables(), designs[b].variables())
                .then_with(|| designs[a].id().cmp(&designs[b].id()))
        });
        self.of_order.sort_by(|&a, &b| {
            lex_cmp(designs[a].objectives(), designs[b].objectives())
                .then_with(|| designs[a].id().cmp(&designs[b].id()))
        });
    }

    /// The design ids in objective order; a stable snapshot for removal
    /// passes that mutate the group while scanning.
    pub fn ids_in_of_order(&self) -> Vec<u64> {
        self.iter_of().map(Design::id).collect()
    }

    /// Verifies that both sorted views cover exactly the owned designs.
    pub fn check_views_in_sync(&self) -> Result<(), ContractError> {
        if self.dv_order.len() != self.of_order.len()
            || self.dv_order.len() != self.designs.len()
        {
            return Err(ContractError::ViewsOutOfSync {
                dv_len: self.dv_order.len(),
                of_len: self.of_order.len(),
            });
        }
        let mut seen_dv = self.dv_order.clone();
        let mut seen_of = self.of_order.clone();
        seen_dv.sort_unstable();
        seen_of.sort_unstable();
        let expected: Vec<usize> = (0..self.designs.len()).collect();
        if seen_dv != expected || seen_of != expected {
            return Err(ContractError::ViewsOutOfSync {
                dv_len: self.dv_order.len(),
                of_len: self.of_order.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::Design;
    use ndarray::array;

    fn design(id: u64, vars: [f64; 2], objs: [f64; 2]) -> Design {
        let mut d = Design::new(id, 2, 2, 0);
        d.variables_mut().assign(&array![vars[0], vars[1]]);
        d.objectives_mut().assign(&array![objs[0], objs[1]]);
        d
    }

    #[test]
    fn test_insert_keeps_views_in_sync() {
        let mut group = DesignGroup::new();
        group.insert(design(1, [0.5, 0.0], [2.0, 1.0]));
        group.insert(design(2, [0.1, 0.9], [1.0, 3.0]));
        group.insert(design(3, [0.3, 0.3], [3.0, 0.5]));

        group.check_views_in_sync().unwrap();

        let dv_ids: Vec<u64> = group.iter_dv().map(Design::id).collect();
        assert_eq!(dv_ids, vec![2, 3, 1]);

        let of_ids: Vec<u64> = group.iter_of().map(Design::id).collect();
        assert_eq!(of_ids, vec![2, 1, 3]);
    }

    #[test]
    fn test_take_by_id_remaps_slots() {
        let mut group = DesignGroup::new();
        group.insert(design(1, [0.5, 0.0], [2.0, 1.0]));
        group.insert(design(2, [0.1, 0.9], [1.0, 3.0]));
        group.insert(design(3, [0.3, 0.3], [3.0, 0.5]));

        let taken = group.take_by_id(1).expect("design 1 is in the group");
        assert_eq!(taken.id(), 1);
        assert_eq!(group.len(), 2);
        group.check_views_in_sync().unwrap();

        let dv_ids: Vec<u64> = group.iter_dv().map(Design::id).collect();
        assert_eq!(dv_ids, vec![2, 3]);
        assert!(group.take_by_id(1).is_none());
    }

    #[test]
    fn test_contains_variables() {
        let mut group = DesignGroup::new();
        group.insert(design(1, [0.5, 0.0], [2.0, 1.0]));
        group.insert(design(2, [0.1, 0.9], [1.0, 3.0]));

        assert!(group.contains_variables(&array![0.5, 0.0]));
        assert!(group.contains_variables(&array![0.1, 0.9]));
        assert!(!group.contains_variables(&array![0.1, 0.8]));
    }

    #[test]
    fn test_synchronize_after_in_place_mutation() {
        let mut group = DesignGroup::new();
        group.insert(design(1, [0.1, 0.0], [1.0, 0.0]));
        group.insert(design(2, [0.9, 0.0], [2.0, 0.0]));

        // Swap the objective order by mutating in place.
        group.get_mut(0).set_objective(0, 5.0);
        group.synchronize();

        let of_ids: Vec<u64> = group.iter_of().map(Design::id).collect();
        assert_eq!(of_ids, vec![2, 1]);
        group.check_views_in_sync().unwrap();
    }

    #[test]
    fn test_merge_moves_everything() {
        let mut a = DesignGroup::new();
        a.insert(design(1, [0.5, 0.0], [2.0, 1.0]));
        let mut b = DesignGroup::new();
        b.insert(design(2, [0.1, 0.9], [1.0, 3.0]));
        b.insert(design(3, [0.3, 0.3], [3.0, 0.5]));

        a.merge(b);
        assert_eq!(a.len(), 3);
        a.check_views_in_sync().unwrap();
    }

    #[test]
    fn test_equal_vectors_tie_break_on_id() {
        let mut group = DesignGroup::new();
        group.insert(design(7, [0.5, 0.5], [1.0, 1.0]));
        group.insert(design(3, [0.5, 0.5], [1.0, 1.0]));
        let dv_ids: Vec<u64> = group.iter_dv().map(Design::id).collect();
        assert_eq!(dv_ids, vec![3, 7]);
    }
}
