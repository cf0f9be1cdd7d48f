//! Core data structures: candidate designs, their metadata, and the
//! populations that own them.
//!
//! A [`Design`] is one candidate solution — a variable-representation
//! vector, an objective vector, a constraint vector, and a set of flag
//! bits.  Designs are exclusively owned by either a [`DesignGroup`], the
//! [`DesignTarget`]'s guff (free list), or its discard archive; Rust move
//! semantics enforce the exclusivity.  Designs are recycled through the
//! guff rather than reallocated, and each (re)activation assigns a fresh,
//! monotonically increasing id.

pub mod group;
pub mod responses;
pub mod target;
pub mod variable;

pub use group::DesignGroup;
pub use target::DesignTarget;

use ndarray::Array1;

const EVALUATED: u16 = 1 << 0;
const ILL_CONDITIONED: u16 = 1 << 1;
const FEASIBLE_BOUNDS: u16 = 1 << 2;
const FEASIBLE_CONSTRAINTS: u16 = 1 << 3;
const CLONED: u16 = 1 << 4;

/// Index of the first attribute bit free for operator/user use.  Bits
/// `FIRST_USER_ATTRIBUTE..NUM_ATTRIBUTES` carry no engine meaning.
pub const FIRST_USER_ATTRIBUTE: usize = 7;

/// Total number of addressable attribute bits on a design.
pub const NUM_ATTRIBUTES: usize = 16;

/// One candidate solution together with its responses.
#[derive(Debug)]
pub struct Design {
    id: u64,
    variables: Array1<f64>,
    objectives: Array1<f64>,
    constraints: Array1<f64>,
    attributes: u16,
}

impl Design {
    pub(crate) fn new(id: u64, ndv: usize, nof: usize, ncn: usize) -> Self {
        Self {
            id,
            variables: Array1::zeros(ndv),
            objectives: Array1::zeros(nof),
            constraints: Array1::zeros(ncn),
            attributes: 0,
        }
    }

    /// Reinitializes a recycled design in place: responses and flags are
    /// cleared and a fresh id bound.  Allocations are kept.
    pub(crate) fn reset(&mut self, id: u64) {
        self.id = id;
        self.variables.fill(0.0);
        self.objectives.fill(0.0);
        self.constraints.fill(0.0);
        self.attributes = 0;
    }

    /// Like [`reset`](Self::reset) but also adapts the vector shapes to
    /// new target metadata.
    pub(crate) fn rebind(&mut self, id: u64, ndv: usize, nof: usize, ncn: usize) {
        if self.variables.len() != ndv {
            self.variables = Array1::zeros(ndv);
        }
        if self.objectives.len() != nof {
            self.objectives = Array1::zeros(nof);
        }
        if self.constraints.len() != ncn {
            self.constraints = Array1::zeros(ncn);
        }
        self.reset(id);
    }

    /// Copies variables, responses, and flags (but not the id) from
    /// `other` into this design.  Shapes must already match.
    pub(crate) fn clone_payload_from(&mut self, other: &Design) {
        self.variables.assign(&other.variables);
        self.objectives.assign(&other.objectives);
        self.constraints.assign(&other.constraints);
        self.attributes = other.attributes;
    }

    /// Produces a copy of this design carrying `id` and the cloned flag.
    pub(crate) fn duplicate(&self, id: u64) -> Self {
        let mut copy = Self {
            id,
            variables: self.variables.clone(),
            objectives: self.objectives.clone(),
            constraints: self.constraints.clone(),
            attributes: self.attributes,
        };
        copy.set_cloned(true);
        copy
    }

    /// The identity assigned at (re)activation; ids increase
    /// monotonically per target.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn variables(&self) -> &Array1<f64> {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut Array1<f64> {
        &mut self.variables
    }

    pub fn variable(&self, dv: usize) -> f64 {
        self.variables[dv]
    }

    pub fn set_variable(&mut self, dv: usize, rep: f64) {
        self.variables[dv] = rep;
    }

    pub fn objectives(&self) -> &Array1<f64> {
        &self.objectives
    }

    pub fn objectives_mut(&mut self) -> &mut Array1<f64> {
        &mut self.objectives
    }

    pub fn objective(&self, of: usize) -> f64 {
        self.objectives[of]
    }

    pub fn set_objective(&mut self, of: usize, value: f64) {
        self.objectives[of] = value;
    }

    pub fn constraints(&self) -> &Array1<f64> {
        &self.constraints
    }

    pub fn constraints_mut(&mut self) -> &mut Array1<f64> {
        &mut self.constraints
    }

    pub fn constraint(&self, cn: usize) -> f64 {
        self.constraints[cn]
    }

    pub fn set_constraint(&mut self, cn: usize, value: f64) {
        self.constraints[cn] = value;
    }

    pub fn is_evaluated(&self) -> bool {
        self.attributes & EVALUATED != 0
    }

    pub fn set_evaluated(&mut self, value: bool) {
        self.set_flag(EVALUATED, value);
    }

    pub fn is_ill_conditioned(&self) -> bool {
        self.attributes & ILL_CONDITIONED != 0
    }

    pub fn set_ill_conditioned(&mut self, value: bool) {
        self.set_flag(ILL_CONDITIONED, value);
    }

    pub fn satisfies_bounds(&self) -> bool {
        self.attributes & FEASIBLE_BOUNDS != 0
    }

    pub fn set_satisfies_bounds(&mut self, value: bool) {
        self.set_flag(FEASIBLE_BOUNDS, value);
    }

    pub fn satisfies_constraints(&self) -> bool {
        self.attributes & FEASIBLE_CONSTRAINTS != 0
    }

    pub fn set_satisfies_constraints(&mut self, value: bool) {
        self.set_flag(FEASIBLE_CONSTRAINTS, value);
    }

    /// Feasible means within bounds and satisfying every constraint.
    pub fn is_feasible(&self) -> bool {
        self.satisfies_bounds() && self.satisfies_constraints()
    }

    pub fn is_cloned(&self) -> bool {
        self.attributes & CLONED != 0
    }

    pub fn set_cloned(&mut self, value: bool) {
        self.set_flag(CLONED, value);
    }

    /// Reads attribute bit `bit` (0-based, `bit < NUM_ATTRIBUTES`).
    pub fn has_attribute(&self, bit: usize) -> bool {
        debug_assert!(bit < NUM_ATTRIBUTES);
        self.attributes & (1 << bit) != 0
    }

    /// Writes attribute bit `bit`.
    pub fn modify_attribute(&mut self, bit: usize, value: bool) {
        debug_assert!(bit < NUM_ATTRIBUTES);
        self.set_flag(1 << bit, value);
    }

    fn set_flag(&mut self, mask: u16, value: bool) {
        if value {
            self.attributes |= mask;
        } else {
            self.attributes &= !mask;
        }
    }
}
