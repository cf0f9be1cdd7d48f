//! Metric-trail convergence.
//!
//! A [`MetricTrackerCore`] pushes one derived metric value per
//! generation into a bounded [`MetricTracker`] window and reports
//! convergence when the relative change between *any* pair of stored
//! values is within the configured percent change.  The absolute variant
//! compares plain magnitudes instead of ratios.  The hard ceilings are
//! enforced on every check.
//!
//! Concrete convergers differ only in the metric they track and are
//! stamped out by the `metric_tracker_converger!` macro below.

use paste::paste;

use crate::algorithms::RunStats;
use crate::design::{DesignGroup, DesignTarget};
use crate::error::{ContractError, Error, handle_failure};
use crate::fitness::FitnessRecord;
use crate::metrics::MetricTracker;
use crate::operators::convergence::ConvergenceLimits;
use crate::operators::{Converger, GeneticOperator, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

/// Default width of the convergence window.
pub const DEFAULT_NUM_GENERATIONS: usize = 10;

/// Default relative-change tolerance.
pub const DEFAULT_PERCENT_CHANGE: f64 = 0.1;

/// The shared machinery of every metric-tracking converger.
#[derive(Debug, Clone)]
pub struct MetricTrackerCore {
    tracker: MetricTracker,
    percent_change: f64,
    absolute: bool,
    limits: ConvergenceLimits,
    converged: bool,
}

impl MetricTrackerCore {
    pub fn new(absolute: bool) -> Self {
        Self {
            tracker: MetricTracker::new(DEFAULT_NUM_GENERATIONS),
            percent_change: DEFAULT_PERCENT_CHANGE,
            absolute,
            limits: ConvergenceLimits::new(),
            converged: false,
        }
    }

    pub fn percent_change(&self) -> f64 {
        self.percent_change
    }

    pub fn set_percent_change(&mut self, percent_change: f64) {
        self.percent_change = percent_change;
        log::info!("metric tracker: percent change now = {percent_change}");
    }

    pub fn num_generations(&self) -> usize {
        self.tracker.max_depth()
    }

    pub fn set_num_generations(&mut self, num_generations: usize) {
        self.tracker.set_max_depth(num_generations);
        log::info!("metric tracker: tracking window now = {num_generations} generations");
    }

    pub fn tracker(&self) -> &MetricTracker {
        &self.tracker
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn poll(&mut self, operator: &str, db: &ParameterDatabase) -> Result<(), Error> {
        self.limits.poll(operator, db)?;
        let window = db.get_size("method.jega.num_generations")?;
        log_poll(operator, "method.jega.num_generations", &window);
        if let Some(window) = window {
            self.set_num_generations(window);
        }
        let change = db.get_real("method.jega.percent_change")?;
        log_poll(operator, "method.jega.percent_change", &change);
        if let Some(change) = change {
            self.set_percent_change(change);
        }
        Ok(())
    }

    /// Pushes this generation's metric and runs the convergence test:
    /// ceilings first, then the any-pair percent change over a full
    /// window.
    pub fn check(&mut self, operator: &str, metric: f64, stats: &RunStats) -> bool {
        self.tracker.push(metric);

        if let Some(reason) = self.limits.exceeded(stats) {
            log::warn!("{operator}: {reason}");
            self.converged = true;
        } else if self.tracker.is_full() {
            let worst = self.tracker.max_percent_change(self.absolute);
            if worst < self.percent_change {
                log::info!(
                    "{operator}: metric changed by at most {worst:.6} over \
                     {} generations; converged",
                    self.tracker.len()
                );
                self.converged = true;
            }
        }
        log::info!(
            "{operator}: convergence check at generation {}: metric = {metric}, \
             converged = {}",
            stats.generation,
            self.converged
        );
        self.converged
    }
}

/// Stamps out a converger that tracks one metric derived from the group
/// and its fitness record.
macro_rules! metric_tracker_converger {
    ($(#[$meta:meta])* $base:ident, $regname:literal, $metric:expr) => {
        paste! {
            $(#[$meta])*
            #[derive(Debug, Clone)]
            pub struct [<$base TrackerConverger>] {
                core: MetricTrackerCore,
            }

            impl [<$base TrackerConverger>] {
                pub const NAME: &'static str = $regname;

                pub fn new() -> Self {
                    Self { core: MetricTrackerCore::new(false) }
                }

                /// The absolute-change variant of this converger.
                pub fn absolute() -> Self {
                    Self { core: MetricTrackerCore::new(true) }
                }

                pub fn core(&self) -> &MetricTrackerCore {
                    &self.core
                }

                pub fn core_mut(&mut self) -> &mut MetricTrackerCore {
                    &mut self.core
                }
            }

            impl Default for [<$base TrackerConverger>] {
                fn default() -> Self {
                    Self::new()
                }
            }

            impl GeneticOperator for [<$base TrackerConverger>] {
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
                    self.core.poll(Self::NAME, db)
                }
            }

            impl Converger for [<$base TrackerConverger>] {
                fn clone_operator(&self) -> Box<dyn Converger> {
                    log::debug!("{}: cloned", Self::NAME);
                    Box::new(self.clone())
                }

                fn converged(&self) -> bool {
                    self.core.converged()
                }

                fn check_convergence(
                    &mut self,
                    group: &DesignGroup,
                    fitnesses: &FitnessRecord,
                    stats: &RunStats,
                    _target: &DesignTarget,
                ) -> Result<bool, Error> {
                    let metric = ($metric)(group, fitnesses)?;
                    Ok(self.core.check(Self::NAME, metric, stats))
                }
            }
        }
    };
}

fn best_fitness(group: &DesignGroup, fitnesses: &FitnessRecord) -> Result<f64, Error> {
    let mut best = f64::NEG_INFINITY;
    for design in group.iter_of() {
        let fitness = fitnesses.fitness_of(design).ok_or_else(|| {
            handle_failure(Error::Contract(ContractError::MissingFitness {
                design_id: design.id(),
            }))
        })?;
        best = best.max(fitness);
    }
    Ok(best)
}

fn average_fitness(group: &DesignGroup, fitnesses: &FitnessRecord) -> Result<f64, Error> {
    if group.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    for design in group.iter_of() {
        let fitness = fitnesses.fitness_of(design).ok_or_else(|| {
            handle_failure(Error::Contract(ContractError::MissingFitness {
                design_id: design.id(),
            }))
        })?;
        sum += fitness;
    }
    Ok(sum / group.len() as f64)
}

metric_tracker_converger!(
    /// Converges when the best fitness in the population stops moving.
    BestFitness,
    "best_fitness_tracker",
    best_fitness
);

metric_tracker_converger!(
    /// Converges when the population's average fitness stops moving.
    AverageFitness,
    "average_fitness_tracker",
    average_fitness
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::RunStats;
    use crate::design::responses::ObjectiveInfo;
    use crate::design::variable::VariableInfo;

    #[test]
    fn test_core_converges_once_trail_flattens() {
        // Depth 3, tolerance 0.05: the window {10.0, 9.0, 9.1} still
        // holds a 10% move; one more push leaves {9.0, 9.1, 9.05} whose
        // worst pairwise change is about 1.1%.
        let mut core = MetricTrackerCore::new(false);
        core.set_num_generations(3);
        core.set_percent_change(0.05);
        let stats = RunStats::new();

        assert!(!core.check("test", 10.0, &stats));
        assert!(!core.check("test", 9.0, &stats));
        assert!(!core.check("test", 9.1, &stats));
        assert!(core.check("test", 9.05, &stats));
    }

    #[test]
    fn test_core_does_not_converge_while_window_fills() {
        let mut core = MetricTrackerCore::new(false);
        core.set_num_generations(5);
        core.set_percent_change(0.5);
        let stats = RunStats::new();
        for metric in [1.0, 1.0, 1.0, 1.0] {
            assert!(!core.check("test", metric, &stats));
        }
        assert!(core.check("test", 1.0, &stats));
    }

    #[test]
    fn test_absolute_variant_uses_magnitudes() {
        let mut core = MetricTrackerCore::new(true);
        core.set_num_generations(2);
        core.set_percent_change(0.5);
        let stats = RunStats::new();
        assert!(!core.check("test", 0.0, &stats));
        // |0.4 - 0.0| = 0.4 < 0.5 even though the relative change from a
        // zero baseline is infinite.
        assert!(core.check("test", 0.4, &stats));
    }

    #[test]
    fn test_best_fitness_converger_end_to_end() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"));

        let mut group = DesignGroup::new();
        let mut record = FitnessRecord::new();
        for i in 0..3 {
            let mut d = target.new_design();
            d.set_variable(0, i as f64 * 0.3);
            record.record(d.id(), -(i as f64));
            group.insert(d);
        }

        let mut converger = BestFitnessTrackerConverger::new();
        converger.core_mut().set_num_generations(2);
        converger.core_mut().set_percent_change(0.01);
        let stats = RunStats::new();

        // The best fitness is 0 in both generations: zero change.
        assert!(
            !converger
                .check_convergence(&group, &record, &stats, &target)
                .unwrap()
        );
        assert!(
            converger
                .check_convergence(&group, &record, &stats, &target)
                .unwrap()
        );
    }

    #[test]
    fn test_missing_fitness_is_contract_violation() {
        let mut target = DesignTarget::new();
        target
            .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
            .add_objective(ObjectiveInfo::minimize("f"));
        let mut group = DesignGroup::new();
        group.insert(target.new_design());

        let mut converger = AverageFitnessTrackerConverger::new();
        let stats = RunStats::new();
        let err = converger
            .check_convergence(&group, &FitnessRecord::new(), &stats, &target)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Contract(ContractError::MissingFitness { .. })
        ));
    }
}
