//! Evaluation through a user-supplied callback.
//!
//! The functor is the point where domain logic meets the engine: it
//! reads the variable *values* (post-decode, not the raw representations)
//! and writes the pre-sized objective and constraint vectors.  A design
//! whose callback reports failure is flagged ill-conditioned and removed
//! from circulation by the main loop.
//!
//! Evaluation is per-design; with the parallel flag set the pending
//! designs are dispatched on the rayon thread pool.  Either way the
//! designs never change order within the group, and all synchronization
//! completes before `evaluate` returns.

use std::sync::Arc;

use ndarray::Array1;
use rayon::prelude::*;

use crate::design::{Design, DesignGroup, DesignTarget};
use crate::error::{ConfigError, Error, handle_failure};
use crate::operators::{Evaluator, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

/// User-supplied evaluation callback.
///
/// `variables` holds the design's variable values; `objectives` and
/// `constraints` arrive pre-sized and must not be resized.  Returning
/// `false` marks the design ill-conditioned.
pub trait EvaluationFunctor: Send + Sync {
    fn evaluate(
        &self,
        variables: &Array1<f64>,
        objectives: &mut Array1<f64>,
        constraints: &mut Array1<f64>,
    ) -> bool;
}

impl<F> EvaluationFunctor for F
where
    F: Fn(&Array1<f64>, &mut Array1<f64>, &mut Array1<f64>) -> bool + Send + Sync,
{
    fn evaluate(
        &self,
        variables: &Array1<f64>,
        objectives: &mut Array1<f64>,
        constraints: &mut Array1<f64>,
    ) -> bool {
        self(variables, objectives, constraints)
    }
}

/// Forwards one design at a time to the configured functor.
pub struct SimpleFunctorEvaluator {
    functor: Option<Arc<dyn EvaluationFunctor>>,
    parallel: bool,
}

impl std::fmt::Debug for SimpleFunctorEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleFunctorEvaluator")
            .field("functor", &self.functor.as_ref().map(|_| "<fn>"))
            .field("parallel", &self.parallel)
            .finish()
    }
}

impl SimpleFunctorEvaluator {
    pub const NAME: &'static str = "simple_functor";

    pub fn new() -> Self {
        Self {
            functor: None,
            parallel: false,
        }
    }

    /// Installs the evaluation callback.  Running without one is a fatal
    /// configuration error.
    pub fn set_functor(&mut self, functor: Arc<dyn EvaluationFunctor>) {
        self.functor = Some(functor);
    }

    pub fn has_functor(&self) -> bool {
        self.functor.is_some()
    }

    /// Enables dispatching pending designs on the rayon thread pool.
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    fn evaluate_one(functor: &dyn EvaluationFunctor, target: &DesignTarget, design: &mut Design) {
        let values = target.reps_to_values(design.variables());
        let mut objectives = Array1::zeros(target.nof());
        let mut constraints = Array1::zeros(target.ncn());
        if functor.evaluate(&values, &mut objectives, &mut constraints) {
            design.objectives_mut().assign(&objectives);
            design.constraints_mut().assign(&constraints);
            design.set_evaluated(true);
            design.set_ill_conditioned(false);
            target.check_feasibility(design);
        } else {
            log::warn!(
                "{}: evaluation of design {} failed; flagging ill-conditioned",
                Self::NAME,
                design.id()
            );
            design.set_ill_conditioned(true);
        }
    }
}

impl Default for SimpleFunctorEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for SimpleFunctorEvaluator {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Evaluator
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let parallel = db.get_bool("method.jega.eval_concurrency")?;
        log_poll(self.name(), "method.jega.eval_concurrency", &parallel);
        if let Some(parallel) = parallel {
            self.parallel = parallel;
        }
        Ok(())
    }
}

impl Evaluator for SimpleFunctorEvaluator {
    fn clone_operator(&self) -> Box<dyn Evaluator> {
        log::debug!("{}: cloned", self.name());
        Box::new(Self {
            functor: self.functor.clone(),
            parallel: self.parallel,
        })
    }

    fn set_functor(&mut self, functor: Arc<dyn EvaluationFunctor>) -> Result<(), Error> {
        self.functor = Some(functor);
        Ok(())
    }

    fn evaluate(
        &mut self,
        group: &mut DesignGroup,
        target: &DesignTarget,
    ) -> Result<usize, Error> {
        let functor = self
            .functor
            .as_ref()
            .ok_or_else(|| handle_failure(Error::Config(ConfigError::MissingFunctor)))?
            .clone();

        let mut pending: Vec<&mut Design> = group
            .designs_mut()
            .iter_mut()
            .filter(|d| !d.is_evaluated() && !d.is_ill_conditioned())
            .collect();
        let count = pending.len();
        if count == 0 {
            return Ok(0);
        }

        if self.parallel {
            pending
                .par_iter_mut()
                .for_each(|design| Self::evaluate_one(functor.as_ref(), target, design));
        } else {
            for design in pending.iter_mut() {
                Self::evaluate_one(functor.as_ref(), target, design);
            }
        }
        group.synchronize();

        log::info!("{}: {count} designs evaluated", self.name());
        Ok(count)
    }
}
