//! # evoxide – a composable genetic-algorithm engine
//!
//! *evoxide* is a pipelined evolutionary optimizer for single- and
//! multi-objective design problems.  A problem is described by a
//! [`DesignTarget`] (variables with typed natures and bounds, objectives
//! with a sense, two-sided constraints); candidate solutions are
//! [`Design`]s owned by [`DesignGroup`]s that keep two synchronized sorted
//! views (variable order and objective order).
//!
//! The search itself is assembled from one operator per family —
//! initializer, evaluator, fitness assessor, selector, niche-pressure
//! applicator, crosser, mutator, converger, post-processor, and main
//! loop — all discovered through named registries ([`registry`]) and
//! configured through a typed [`ParameterDatabase`].  The
//! [`GeneticAlgorithm`] composition root drives the canonical
//! selection → variation → evaluation → convergence cycle.
//!
//! ```rust,no_run
//! use evoxide::prelude::*;
//!
//! let mut target = DesignTarget::new();
//! target.add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6));
//! target.add_objective(ObjectiveInfo::minimize("f"));
//!
//! let mut db = ParameterDatabase::new();
//! db.set_size("method.max_iterations", 100);
//!
//! let config = GaConfigBuilder::default()
//!     .population_size(32)
//!     .seed(7)
//!     .build()
//!     .expect("valid configuration");
//!
//! let mut ga = GeneticAlgorithm::new(
//!     target,
//!     registry::soga_group(),
//!     OperatorSelections::soga_defaults(),
//!     config,
//!     &db,
//! ).expect("sound composition");
//! ```

pub mod algorithms;
pub mod bits;
pub mod design;
pub mod error;
pub mod fitness;
pub mod metrics;
pub mod operators;
pub mod params;
pub mod random;
pub mod registry;

pub use algorithms::{
    GaConfig, GaConfigBuilder, GenerationTopology, GeneticAlgorithm, OperatorSelections, RunStats,
};
pub use design::{
    Design, DesignGroup, DesignTarget,
    responses::{ConstraintInfo, ObjectiveInfo, ObjectiveSense},
    variable::{VariableInfo, VariableNature},
};
pub use error::{ConfigError, ContractError, Error};
pub use fitness::FitnessRecord;
pub use metrics::MetricTracker;
pub use params::{ParameterDatabase, ParameterValue};
pub use random::{RandomGenerator, StdRandomGenerator};

/// Convenience re-exports for typical engine assembly.
pub mod prelude {
    pub use crate::algorithms::{
        GaConfig, GaConfigBuilder, GenerationTopology, GeneticAlgorithm, OperatorSelections,
    };
    pub use crate::design::{
        Design, DesignGroup, DesignTarget,
        responses::{ConstraintInfo, ObjectiveInfo, ObjectiveSense},
        variable::{VariableInfo, VariableNature},
    };
    pub use crate::error::Error;
    pub use crate::operators::evaluation::EvaluationFunctor;
    pub use crate::params::ParameterDatabase;
    pub use crate::random::{RandomGenerator, StdRandomGenerator};
    pub use crate::registry;
}
