//! Operator families and their contracts.
//!
//! Every stage of the evolutionary cycle is an interchangeable operator.
//! The super-trait [`GeneticOperator`] provides the reflection and
//! lifecycle hooks shared by all families (a stable name, the family
//! tag, parameter polling, finalization); each sub-trait defines the
//! behaviour expected at its stage:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`Initializer`] | Fill an empty population with legal designs. |
//! | [`Evaluator`] | Populate objective and constraint vectors. |
//! | [`FitnessAssessor`] | Score a pool of groups into a [`FitnessRecord`]. |
//! | [`Selector`] | Form the next population from scored groups. |
//! | [`NichePressureApplicator`] | Thin clustered solutions in performance space. |
//! | [`Crosser`] | Produce offspring from parent pairs. |
//! | [`Mutator`] | Perturb designs in place. |
//! | [`Converger`] | Decide when the search must stop. |
//! | [`PostProcessor`] | One-shot cleanup at finalization. |
//! | [`MainLoop`] | Orchestrate one generation. |
//!
//! All traits are object safe: the registry hands operators out as boxed
//! trait objects, and the composition root stores one per family.

use std::fmt::Debug;

use crate::algorithms::{GeneticAlgorithm, RunStats};
use crate::design::{DesignGroup, DesignTarget};
use crate::error::Error;
use crate::fitness::FitnessRecord;
use crate::params::ParameterDatabase;
use crate::random::RandomGenerator;

pub mod convergence;
pub mod crossover;
pub mod evaluation;
pub mod fitness;
pub mod initialization;
pub mod main_loop;
pub mod mutation;
pub mod niching;
pub mod postprocess;
pub mod selection;

/// The family a concrete operator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorFamily {
    Initializer,
    Evaluator,
    FitnessAssessor,
    Selector,
    NichePressure,
    Crosser,
    Mutator,
    Converger,
    PostProcessor,
    MainLoop,
}

impl OperatorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatorFamily::Initializer => "initializer",
            OperatorFamily::Evaluator => "evaluator",
            OperatorFamily::FitnessAssessor => "fitness assessor",
            OperatorFamily::Selector => "selector",
            OperatorFamily::NichePressure => "niche pressure applicator",
            OperatorFamily::Crosser => "crosser",
            OperatorFamily::Mutator => "mutator",
            OperatorFamily::Converger => "converger",
            OperatorFamily::PostProcessor => "post processor",
            OperatorFamily::MainLoop => "main loop",
        }
    }
}

impl std::fmt::Display for OperatorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reflection and lifecycle hooks shared by every operator.
pub trait GeneticOperator: Debug {
    /// The stable registry name of this operator.
    fn name(&self) -> &'static str;

    /// The family tag of this operator.
    fn family(&self) -> OperatorFamily;

    /// Pulls recognized keys from the parameter database.  Missing keys
    /// keep their documented defaults; present keys of the wrong type are
    /// fatal.
    fn poll_for_parameters(
        &mut self,
        db: &ParameterDatabase,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let _ = (db, target);
        Ok(())
    }

    /// Called once before the operator is destroyed.
    fn finalize(&mut self, target: &DesignTarget) -> Result<(), Error> {
        let _ = target;
        log::debug!("{}: finalized", self.name());
        Ok(())
    }
}

/// Fills an empty population with designs whose variables are legal
/// representations.  Initializers are not required to evaluate.
pub trait Initializer: GeneticOperator {
    /// Duplicates this operator, configuration included, for another
    /// algorithm instance.
    fn clone_operator(&self) -> Box<dyn Initializer>;

    /// The requested number of designs.
    fn size(&self) -> usize;

    fn set_size(&mut self, size: usize);

    fn initialize(
        &mut self,
        into: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error>;
}

/// Populates objective and constraint vectors of every design whose
/// `Evaluated` flag is clear, sets feasibility flags, and marks the
/// design evaluated.  Batching must not reorder designs.
pub trait Evaluator: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn Evaluator>;

    /// Returns the number of evaluations actually performed.
    fn evaluate(&mut self, group: &mut DesignGroup, target: &DesignTarget)
    -> Result<usize, Error>;

    /// Installs a user evaluation callback on evaluators that accept
    /// one.
    fn set_functor(
        &mut self,
        functor: std::sync::Arc<dyn evaluation::EvaluationFunctor>,
    ) -> Result<(), Error> {
        let _ = functor;
        Err(crate::error::handle_failure(Error::Config(
            crate::error::ConfigError::Invalid(format!(
                "evaluator `{}` does not accept an evaluation functor",
                self.name()
            )),
        )))
    }
}

/// Scores every design of the supplied groups; higher fitness is better.
pub trait FitnessAssessor: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn FitnessAssessor>;

    fn assess_fitness(
        &mut self,
        groups: &[&DesignGroup],
        target: &DesignTarget,
    ) -> Result<FitnessRecord, Error>;
}

/// Forms the next population by moving designs out of the source groups.
/// A selector that allows repeat selection duplicates designs through the
/// target's clone allocator instead of moving the original twice.
pub trait Selector: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn Selector>;

    fn can_select_same_design_more_than_once(&self) -> bool {
        false
    }

    fn select(
        &mut self,
        from: &mut [DesignGroup],
        into: &mut DesignGroup,
        count: usize,
        fitnesses: &FitnessRecord,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error>;
}

/// Thins clustered solutions in performance space after fitness
/// assessment and selection.  Nichers that cache their removals
/// re-insert them in [`pre_selection`](Self::pre_selection) so that no
/// other operator performs selection.
pub trait NichePressureApplicator: GeneticOperator {
    /// Duplicates this operator's configuration.  A cached design buffer
    /// stays with the original; the duplicate starts empty.
    fn clone_operator(&self) -> Box<dyn NichePressureApplicator>;

    /// Called before the fitness assessor at the top of each generation.
    fn pre_selection(
        &mut self,
        population: &mut DesignGroup,
        target: &DesignTarget,
    ) -> Result<(), Error> {
        let _ = (population, target);
        Ok(())
    }

    fn apply_niche_pressure(
        &mut self,
        population: &mut DesignGroup,
        fitnesses: &FitnessRecord,
        target: &DesignTarget,
    ) -> Result<(), Error>;
}

/// Produces a child group from a parent group.  The number of crossover
/// operations is `rate × parents / 2`, each producing a sibling pair.
pub trait Crosser: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn Crosser>;

    fn rate(&self) -> f64;

    fn set_rate(&mut self, rate: f64);

    fn crossover(
        &mut self,
        from: &DesignGroup,
        into: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error>;
}

/// Mutates `rate × max(population, children).size` designs.  Mutators
/// preserve representation legality unless they declare otherwise, in
/// which case the main loop legalizes before evaluation.
pub trait Mutator: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn Mutator>;

    fn rate(&self) -> f64;

    fn set_rate(&mut self, rate: f64);

    fn can_produce_invalid_variable_values(&self) -> bool {
        false
    }

    fn mutate(
        &mut self,
        population: &mut DesignGroup,
        children: &mut DesignGroup,
        target: &DesignTarget,
        rng: &mut dyn RandomGenerator,
    ) -> Result<(), Error>;
}

/// Decides when the search must stop.  Every converger also enforces the
/// generation / evaluation / wall-time ceilings through
/// [`convergence::ConvergenceLimits`].
pub trait Converger: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn Converger>;

    /// Whether this converger has already signalled convergence.
    fn converged(&self) -> bool;

    fn check_convergence(
        &mut self,
        group: &DesignGroup,
        fitnesses: &FitnessRecord,
        stats: &RunStats,
        target: &DesignTarget,
    ) -> Result<bool, Error>;
}

/// Runs once at finalization against the final population.
pub trait PostProcessor: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn PostProcessor>;

    fn post_process(
        &mut self,
        population: &mut DesignGroup,
        target: &DesignTarget,
    ) -> Result<(), Error>;
}

/// Pure orchestration of one generation.
pub trait MainLoop: GeneticOperator {
    fn clone_operator(&self) -> Box<dyn MainLoop>;

    /// Runs one generation; returns true when the converger signalled
    /// convergence.
    fn run_generation(&mut self, ga: &mut GeneticAlgorithm) -> Result<bool, Error>;
}
