//! Post-processors: one-shot cleanup operators run at finalization
//! against the final population.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::operators::niching::{
    DEFAULT_DISTANCE_PERCENTAGE, apply_box_niching, compute_cutoff_distances, fill_percentages,
    objective_extremes, poll_distance_percentages,
};
use crate::operators::{GeneticOperator, OperatorFamily, PostProcessor};
use crate::params::ParameterDatabase;

/// The do-nothing post-processor.
#[derive(Debug, Clone, Default)]
pub struct NullPostProcessor;

impl NullPostProcessor {
    pub const NAME: &'static str = "null_postprocess";

    pub fn new() -> Self {
        Self
    }
}

impl GeneticOperator for NullPostProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PostProcessor
    }
}

impl PostProcessor for NullPostProcessor {
    fn clone_operator(&self) -> Box<dyn PostProcessor> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn post_process(
        &mut self,
        _population: &mut DesignGroup,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        log::debug!("{}: post processing (no-op)", self.name());
        Ok(())
    }
}

/// Thins the final population with the per-objective cutoff box, exactly
/// as the distance nicher does during the run but without fitness
/// information: of a too-close pair the later design in objective order
/// is removed, and Pareto extremes always survive.
#[derive(Debug, Clone)]
pub struct DistanceNichingPostProcessor {
    percentages: Vec<f64>,
}

impl DistanceNichingPostProcessor {
    pub const NAME: &'static str = "distance_postprocessor";

    pub fn new() -> Self {
        Self {
            percentages: vec![DEFAULT_DISTANCE_PERCENTAGE],
        }
    }

    pub fn set_distance_percentages(&mut self, percentages: Vec<f64>, nof: usize) {
        self.percentages = fill_percentages(percentages, nof, Self::NAME);
    }
}

impl Default for DistanceNichingPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for DistanceNichingPostProcessor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::PostProcessor
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        poll_distance_percentages(self.name(), db, target.nof(), &mut self.percentages)
    }
}

impl PostProcessor for DistanceNichingPostProcessor {
    fn clone_operator(&self) -> Box<dyn PostProcessor> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn post_process(
        &mut self,
        population: &mut DesignGroup,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        log::debug!("{}: post processing", self.name());
        let Some(extremes) = objective_extremes(population) else {
            return Ok(());
        };
        let percentages = fill_percentages(self.percentages.clone(), target.nof(), Self::NAME);
        let cutoffs = compute_cutoff_distances(&percentages, &extremes);

        let removed = apply_box_niching(population, None, &cutoffs, &extremes, |design| {
            target.take_design(design);
        });
        log::info!(
            "{}: removed {removed} designs; final population size {}",
            self.name(),
            population.len()
        );
        Ok(())
    }
}
