//! Initializers: operators that fill an empty population with designs
//! whose variables are legal representations.  Initializers are not
//! required to evaluate what they create; the flat-file reader marks a
//! design evaluated only when a full response row was present.

pub mod flat_file;
pub mod random_unique;

pub use flat_file::FlatFileInitializer;
pub use random_unique::RandomUniqueInitializer;

/// Default requested population size shared by the initializers.
pub const DEFAULT_SIZE: usize = 50;
