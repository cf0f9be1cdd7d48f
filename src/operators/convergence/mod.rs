//! Convergers: operators that decide when the search must stop.
//!
//! Every converger enforces three hard ceilings — generations,
//! evaluations, wall time — through [`ConvergenceLimits`]; concrete
//! convergers layer their own criteria on top (typically a metric trail,
//! see [`metric_tracker`]).

pub mod metric_tracker;

pub use metric_tracker::{
    AverageFitnessTrackerConverger, BestFitnessTrackerConverger, MetricTrackerCore,
};

use std::time::Duration;

use crate::algorithms::RunStats;
use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::operators::{Converger, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

/// Default ceiling on the number of generations.
pub const DEFAULT_MAX_GENERATIONS: usize = 10_000;

/// The three hard ceilings every converger enforces.
#[derive(Debug, Clone)]
pub struct ConvergenceLimits {
    max_generations: usize,
    max_evaluations: usize,
    max_time: Option<Duration>,
}

impl Default for ConvergenceLimits {
    fn default() -> Self {
        Self {
            max_generations: DEFAULT_MAX_GENERATIONS,
            max_evaluations: usize::MAX,
            max_time: None,
        }
    }
}

impl ConvergenceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_generations(&self) -> usize {
        self.max_generations
    }

    pub fn set_max_generations(&mut self, max: usize) {
        self.max_generations = max;
    }

    pub fn max_evaluations(&self) -> usize {
        self.max_evaluations
    }

    pub fn set_max_evaluations(&mut self, max: usize) {
        self.max_evaluations = max;
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time
    }

    pub fn set_max_time(&mut self, max: Option<Duration>) {
        self.max_time = max;
    }

    /// Pulls the ceiling keys recognized by every converger.
    pub fn poll(&mut self, operator: &str, db: &ParameterDatabase) -> Result<(), Error> {
        let gens = db.get_size("method.max_iterations")?;
        log_poll(operator, "method.max_iterations", &gens);
        if let Some(gens) = gens {
            self.max_generations = gens;
        }
        let evals = db.get_size("method.max_function_evaluations")?;
        log_poll(operator, "method.max_function_evaluations", &evals);
        if let Some(evals) = evals {
            self.max_evaluations = evals;
        }
        let seconds = db.get_real("method.max_time")?;
        log_poll(operator, "method.max_time", &seconds);
        if let Some(seconds) = seconds {
            self.max_time = (seconds.is_finite() && seconds > 0.0)
                .then(|| Duration::from_secs_f64(seconds));
        }
        Ok(())
    }

    /// The ceiling hit by the current run state, if any.
    pub fn exceeded(&self, stats: &RunStats) -> Option<&'static str> {
        if stats.generation >= self.max_generations {
            return Some("maximum number of generations reached");
        }
        if stats.evaluations >= self.max_evaluations {
            return Some("maximum number of evaluations reached");
        }
        if let Some(max_time) = self.max_time {
            if stats.elapsed() >= max_time {
                return Some("maximum wall time reached");
            }
        }
        None
    }
}

/// The converger that enforces only the hard ceilings.
#[derive(Debug, Clone, Default)]
pub struct MaxGenEvalTimeConverger {
    limits: ConvergenceLimits,
    converged: bool,
}

impl MaxGenEvalTimeConverger {
    pub const NAME: &'static str = "max_gen_eval_time";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn limits_mut(&mut self) -> &mut ConvergenceLimits {
        &mut self.limits
    }
}

impl GeneticOperator for MaxGenEvalTimeConverger {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Converger
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        self.limits.poll(Self::NAME, db)
    }
}

impl Converger for MaxGenEvalTimeConverger {
    fn clone_operator(&self) -> Box<dyn Converger> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn converged(&self) -> bool {
        self.converged
    }

    fn check_convergence(
        &mut self,
        _group: &DesignGroup,
        _fitnesses: &FitnessRecord,
        stats: &RunStats,
        _target: &DesignTarget,
    ) -> Result<bool, Error> {
        if let Some(reason) = self.limits.exceeded(stats) {
            log::warn!("{}: {reason}", self.name());
            self.converged = true;
        }
        log::info!(
            "{}: convergence check at generation {}: converged = {}",
            self.name(),
            stats.generation,
            self.converged
        );
        Ok(self.converged)
    }
}
