//! Evaluators: operators that populate objective and constraint vectors
//! for every design whose `Evaluated` flag is clear.

pub mod functor;

pub use functor::{EvaluationFunctor, SimpleFunctorEvaluator};
