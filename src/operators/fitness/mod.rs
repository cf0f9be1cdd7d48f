//! Fitness assessors: operators that score a pool of groups into a
//! [`FitnessRecord`](crate::fitness::FitnessRecord).  Higher fitness is
//! better; every design of every input group receives an entry.

pub mod domination_count;
pub mod weighted_sum;

pub use domination_count::DominationCountFitnessAssessor;
pub use weighted_sum::WeightedSumFitnessAssessor;
