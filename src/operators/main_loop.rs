//! The standard generation loop.
//!
//! Pure orchestration: variation (crossover, mutation), offspring
//! clone removal, legalization, evaluation, fitness assessment,
//! selection, niche pressure, and the convergence check — in that
//! order.  The only policy decision is the topology flag: *plus* flows
//! parents and offspring into selection together (elitist), *comma*
//! discards the parents and selects from the offspring alone.

use crate::algorithms::{GenerationTopology, GeneticAlgorithm};
use crate::design::DesignTarget;
use crate::error::Error;
use crate::operators::{GeneticOperator, MainLoop, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};

#[derive(Debug, Clone, Default)]
pub struct StandardMainLoop {
    topology: GenerationTopology,
}

impl StandardMainLoop {
    pub const NAME: &'static str = "standard";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn topology(&self) -> GenerationTopology {
        self.topology
    }

    pub fn set_topology(&mut self, topology: GenerationTopology) {
        self.topology = topology;
    }
}

impl GeneticOperator for StandardMainLoop {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::MainLoop
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let elitist = db.get_bool("method.jega.elitist_selection")?;
        log_poll(self.name(), "method.jega.elitist_selection", &elitist);
        if let Some(elitist) = elitist {
            self.topology = if elitist {
                GenerationTopology::Plus
            } else {
                GenerationTopology::Comma
            };
        }
        Ok(())
    }
}

impl MainLoop for StandardMainLoop {
    fn clone_operator(&self) -> Box<dyn MainLoop> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn run_generation(&mut self, ga: &mut GeneticAlgorithm) -> Result<bool, Error> {
        log::debug!(
            "{}: beginning generation {}",
            self.name(),
            ga.stats().generation
        );

        ga.pre_selection_phase()?;
        ga.crossover_phase()?;
        ga.mutation_phase()?;
        ga.clone_removal_phase()?;
        ga.legalization_phase()?;
        ga.evaluation_phase()?;
        ga.fitness_phase(self.topology)?;
        ga.selection_phase(self.topology)?;
        ga.niche_phase()?;
        let converged = ga.convergence_phase()?;

        debug_assert!(ga.check_group_invariants().is_ok());
        log::debug!(
            "{}: generation {} complete; converged = {converged}",
            self.name(),
            ga.stats().generation
        );
        Ok(converged)
    }
}
