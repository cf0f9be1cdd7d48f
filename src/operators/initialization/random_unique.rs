//! Uniform random initialization with duplicate rejection.

use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::operators::initialization::DEFAULT_SIZE;
use crate::operators::{GeneticOperator, Initializer, OperatorFamily};
use crate::params::{ParameterDatabase, log_poll};
use crate::random::RandomGenerator;

/// Retry budget per requested design before giving up on uniqueness.
const ATTEMPTS_PER_DESIGN: usize = 100;

/// Fills the population with uniform random legal representations,
/// rejecting and resampling duplicates until the group is duplicate-free
/// or the retry budget (proportional to the requested size) runs out.
#[derive(Debug, Clone)]
pub struct RandomUniqueInitializer {
    size: usize,
}

impl RandomUniqueInitializer {
    pub const NAME: &'static str = "unique_random";

    pub fn new() -> Self {
        Self { size: DEFAULT_SIZE }
    }
}

impl Default for RandomUniqueInitializer {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneticOperator for RandomUniqueInitializer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn family(&self) -> OperatorFamily {
        OperatorFamily::Initializer
    }

    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        _target: &DesignTarget,
    ) -> Result<(), Error> {
        let size = db.get_size("method.population_size")?;
        log_poll(self.name(), "method.population_size", &size);
        if let Some(size) = size {
            self.size = size;
        }
        Ok(())
    }
}

impl Initializer for RandomUniqueInitializer {
    fn clone_operator(&self) -> Box<dyn Initializer> {
        log::debug!("{}: cloned", self.name());
        Box::new(self.clone())
    }

    fn size(&self) -> usize {
        self.size
    }

    fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    fn initialize(
        &mut self,
        into: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error> {
        log::debug!("{}: performing initialization", self.name());

        let wanted = self.size;
        let budget = wanted.saturating_mul(ATTEMPTS_PER_DESIGN);
        let starting_size = into.len();

        let mut attempts = 0;
        while into.len() - starting_size < wanted && attempts < budget {
            attempts += 1;
            let variables = target.random_design_variables(rng);
            if into.contains_variables(&variables) {
                continue;
            }
            let mut design = target.new_design();
            design.variables_mut().assign(&variables);
            design.set_satisfies_bounds(true);
            into.insert(design);
        }

        let created = into.len() - starting_size;
        if created < wanted {
            log::warn!(
                "{}: retry budget exhausted; created {created} of {wanted} \
                 requested unique designs",
                self.name()
            );
        }
        log::info!(
            "{}: population size after initialization: {}",
            self.name(),
            into.len()
        );
        Ok(())
    }
}
