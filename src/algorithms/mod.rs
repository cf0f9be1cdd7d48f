//! The composition root.
//!
//! A [`GeneticAlgorithm`] holds one operator of each family, a
//! [`DesignTarget`], the current population, a generation counter, and a
//! callback-driven message bus.  It exposes the canonical
//! `initialize` / `do_generation` / `finalize` protocol; the per-
//! generation pipeline itself lives in the main-loop operator, which
//! calls back into the phase methods defined here.
//!
//! Composition is validated at configuration time: every operator name
//! is resolved against the chosen [`OperatorRegistry`] before anything
//! runs, so an unsound pairing (a single-objective assessor in a
//! multi-objective group, say) never reaches generation 0.

use std::time::{Duration, Instant};

use derive_builder::Builder;

use crate::design::{Design, DesignGroup, DesignTarget};
use crate::error::{ContractError, Error, handle_failure};
use crate::fitness::{FitnessRecord, non_dominated_ids};
use crate::operators::{
    Converger, Crosser, Evaluator, FitnessAssessor, GeneticOperator, Initializer, MainLoop,
    Mutator, NichePressureApplicator, PostProcessor, Selector,
};
use crate::params::ParameterDatabase;
use crate::random::StdRandomGenerator;
use crate::registry::OperatorRegistry;

/// Running counters for one GA instance.
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Completed generations (the initial population is generation 0).
    pub generation: usize,
    /// Total design evaluations performed.
    pub evaluations: usize,
    started: Instant,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            generation: 0,
            evaluations: 0,
            started: Instant::now(),
        }
    }

    /// Wall time since the algorithm was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

/// How parents and offspring flow into selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationTopology {
    /// Parents and offspring both compete (elitist).
    #[default]
    Plus,
    /// Only offspring compete; parents are discarded.
    Comma,
}

/// GA-level configuration.  Operator parameters come from the
/// [`ParameterDatabase`]; this covers only what the composition root
/// itself needs.
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct GaConfig {
    population_size: usize,
    #[builder(setter(strip_option), default = "None")]
    seed: Option<u64>,
}

impl GaConfig {
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

impl GaConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(size) = self.population_size {
            if size == 0 {
                return Err("population size must be positive".to_string());
            }
        }
        Ok(())
    }
}

/// The operator names to resolve against a registry, one per family.
#[derive(Debug, Clone)]
pub struct OperatorSelections {
    pub initializer: String,
    pub evaluator: String,
    pub fitness_assessor: String,
    pub selector: String,
    pub niche_pressure: String,
    pub crosser: String,
    pub mutator: String,
    pub converger: String,
    pub post_processor: String,
    pub main_loop: String,
}

impl OperatorSelections {
    /// Sensible defaults for multi-objective search.
    pub fn moga_defaults() -> Self {
        Self {
            initializer: "unique_random".into(),
            evaluator: "simple_functor".into(),
            fitness_assessor: "domination_count".into(),
            selector: "below_limit".into(),
            niche_pressure: "distance".into(),
            crosser: "shuffle_random".into(),
            mutator: "replace_uniform".into(),
            converger: "average_fitness_tracker".into(),
            post_processor: "distance_postprocessor".into(),
            main_loop: "standard".into(),
        }
    }

    /// Sensible defaults for single-objective search.
    pub fn soga_defaults() -> Self {
        Self {
            initializer: "unique_random".into(),
            evaluator: "simple_functor".into(),
            fitness_assessor: "weighted_sum_only".into(),
            selector: "roulette_wheel".into(),
            niche_pressure: "null_niching".into(),
            crosser: "shuffle_random".into(),
            mutator: "replace_uniform".into(),
            converger: "best_fitness_tracker".into(),
            post_processor: "null_postprocess".into(),
            main_loop: "standard".into(),
        }
    }
}

/// One operator of each family, instantiated from a registry.
pub struct OperatorSet {
    pub initializer: Box<dyn Initializer>,
    pub evaluator: Box<dyn Evaluator>,
    pub fitness_assessor: Box<dyn FitnessAssessor>,
    pub selector: Box<dyn Selector>,
    pub niche_pressure: Box<dyn NichePressureApplicator>,
    pub crosser: Box<dyn Crosser>,
    pub mutator: Box<dyn Mutator>,
    pub converger: Box<dyn Converger>,
    pub post_processor: Box<dyn PostProcessor>,
    pub main_loop: Option<Box<dyn MainLoop>>,
}

impl std::fmt::Debug for OperatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperatorSet")
            .field("initializer", &self.initializer.name())
            .field("evaluator", &self.evaluator.name())
            .field("fitness_assessor", &self.fitness_assessor.name())
            .field("selector", &self.selector.name())
            .field("niche_pressure", &self.niche_pressure.name())
            .field("crosser", &self.crosser.name())
            .field("mutator", &self.mutator.name())
            .field("converger", &self.converger.name())
            .field("post_processor", &self.post_processor.name())
            .finish()
    }
}

impl OperatorSet {
    /// Resolves every selection against `group`.  This is the
    /// composition guard: unknown or group-foreign names fail here, at
    /// configuration time.
    pub fn instantiate(
        group: &OperatorRegistry,
        selections: &OperatorSelections,
    ) -> Result<Self, Error> {
        Ok(Self {
            initializer: group.instantiate_initializer(&selections.initializer)?,
            evaluator: group.instantiate_evaluator(&selections.evaluator)?,
            fitness_assessor: group.instantiate_fitness_assessor(&selections.fitness_assessor)?,
            selector: group.instantiate_selector(&selections.selector)?,
            niche_pressure: group.instantiate_niche_pressure(&selections.niche_pressure)?,
            crosser: group.instantiate_crosser(&selections.crosser)?,
            mutator: group.instantiate_mutator(&selections.mutator)?,
            converger: group.instantiate_converger(&selections.converger)?,
            post_processor: group.instantiate_post_processor(&selections.post_processor)?,
            main_loop: Some(group.instantiate_main_loop(&selections.main_loop)?),
        })
    }

    fn poll_all(&mut self, db: &ParameterDatabase, target: &DesignTarget) -> Result<(), Error> {
        self.initializer.poll_for_parameters(db, target)?;
        self.evaluator.poll_for_parameters(db, target)?;
        self.fitness_assessor.poll_for_parameters(db, target)?;
        self.selector.poll_for_parameters(db, target)?;
        self.niche_pressure.poll_for_parameters(db, target)?;
        self.crosser.poll_for_parameters(db, target)?;
        self.mutator.poll_for_parameters(db, target)?;
        self.converger.poll_for_parameters(db, target)?;
        self.post_processor.poll_for_parameters(db, target)?;
        if let Some(main_loop) = self.main_loop.as_mut() {
            main_loop.poll_for_parameters(db, target)?;
        }
        Ok(())
    }

    fn finalize_all(&mut self, target: &DesignTarget) -> Result<(), Error> {
        self.initializer.finalize(target)?;
        self.evaluator.finalize(target)?;
        self.fitness_assessor.finalize(target)?;
        self.selector.finalize(target)?;
        self.niche_pressure.finalize(target)?;
        self.crosser.finalize(target)?;
        self.mutator.finalize(target)?;
        self.converger.finalize(target)?;
        self.post_processor.finalize(target)?;
        if let Some(main_loop) = self.main_loop.as_mut() {
            main_loop.finalize(target)?;
        }
        Ok(())
    }
}

/// An event published on the GA's message bus.
#[derive(Debug, Clone)]
pub enum GaEvent {
    GenerationComplete {
        generation: usize,
        population: usize,
    },
    ConvergenceChecked {
        generation: usize,
        converged: bool,
    },
    Finalized {
        solutions: usize,
    },
}

type EventCallback = Box<dyn FnMut(&GaEvent) + Send>;

/// The genetic algorithm: one operator per family plus the problem
/// definition, the current population, and the run state.
pub struct GeneticAlgorithm {
    target: DesignTarget,
    config: GaConfig,
    ops: OperatorSet,
    population: DesignGroup,
    children: DesignGroup,
    fitnesses: FitnessRecord,
    stats: RunStats,
    rng: StdRandomGenerator,
    finalized: bool,
    callbacks: Vec<EventCallback>,
}

impl std::fmt::Debug for GeneticAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneticAlgorithm")
            .field("ops", &self.ops)
            .field("population", &self.population.len())
            .field("generation", &self.stats.generation)
            .field("finalized", &self.finalized)
            .finish()
    }
}

impl GeneticAlgorithm {
    /// Assembles an algorithm: resolves the operator selections against
    /// `group`, polls every operator against `db`, and seeds the RNG.
    pub fn new(
        target: DesignTarget,
        group: &OperatorRegistry,
        selections: OperatorSelections,
        config: GaConfig,
        db: &ParameterDatabase,
    ) -> Result<Self, Error> {
        let mut ops = OperatorSet::instantiate(group, &selections)?;
        ops.poll_all(db, &target)?;
        // The configured population size always wins over the database.
        ops.initializer.set_size(config.population_size);

        let rng = StdRandomGenerator::new_from_seed(config.seed);
        Ok(Self {
            target,
            config,
            ops,
            population: DesignGroup::new(),
            children: DesignGroup::new(),
            fitnesses: FitnessRecord::new(),
            stats: RunStats::new(),
            rng,
            finalized: false,
            callbacks: Vec::new(),
        })
    }

    pub fn target(&self) -> &DesignTarget {
        &self.target
    }

    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    pub fn population(&self) -> &DesignGroup {
        &self.population
    }

    pub fn fitnesses(&self) -> &FitnessRecord {
        &self.fitnesses
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn generation(&self) -> usize {
        self.stats.generation
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Grants the evaluator access for pre-run wiring.
    pub fn evaluator_mut(&mut self) -> &mut dyn Evaluator {
        self.ops.evaluator.as_mut()
    }

    /// Installs the user evaluation callback on the composed evaluator.
    pub fn set_evaluation_functor(
        &mut self,
        functor: std::sync::Arc<dyn crate::operators::evaluation::EvaluationFunctor>,
    ) -> Result<(), Error> {
        self.ops.evaluator.set_functor(functor)
    }

    /// Subscribes a callback to the message bus.
    pub fn add_callback(&mut self, callback: impl FnMut(&GaEvent) + Send + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    fn emit(&mut self, event: GaEvent) {
        for callback in self.callbacks.iter_mut() {
            callback(&event);
        }
    }

    /// Pass-through to the target's guff-backed allocator.
    pub fn new_design(&self) -> Design {
        self.target.new_design()
    }

    /// Pass-through to the target's clone allocator.
    pub fn new_design_from(&self, prototype: &Design) -> Design {
        self.target.new_design_from(prototype)
    }

    /// Instructs the initializer to fill the population.  The designs
    /// are legal but not necessarily evaluated; generation 0 evaluation
    /// happens in the first `do_generation`.
    pub fn initialize(&mut self) -> Result<(), Error> {
        if self.finalized {
            return Err(handle_failure(Error::Finalized));
        }
        self.ops
            .initializer
            .initialize(&mut self.population, &self.target, &mut self.rng)?;
        log::info!(
            "population size after {}: {}",
            self.ops.initializer.name(),
            self.population.len()
        );
        Ok(())
    }

    /// Runs one generation.  Returns true when the converger signalled
    /// convergence; the caller must not invoke another generation after
    /// that.
    pub fn do_generation(&mut self) -> Result<bool, Error> {
        if self.finalized {
            return Err(handle_failure(Error::Finalized));
        }
        let mut main_loop = self.ops.main_loop.take().ok_or_else(|| {
            handle_failure(Error::Contract(ContractError::Violated(
                "the main loop operator is missing".to_string(),
            )))
        })?;
        self.stats.generation += 1;
        let result = main_loop.run_generation(self);
        self.ops.main_loop = Some(main_loop);
        let converged = result?;

        self.emit(GaEvent::GenerationComplete {
            generation: self.stats.generation,
            population: self.population.len(),
        });
        Ok(converged)
    }

    /// Convenience driver: initialize, then iterate until the converger
    /// stops the run.
    pub fn run(&mut self) -> Result<(), Error> {
        self.initialize()?;
        while !self.do_generation()? {}
        Ok(())
    }

    /// Runs the post-processor, promotes optimal designs from the
    /// population and the discard archive into the returned solution
    /// set, and destroys the operators.  The algorithm is terminal
    /// afterwards.
    pub fn finalize(&mut self) -> Result<DesignGroup, Error> {
        if self.finalized {
            return Err(handle_failure(Error::Finalized));
        }
        self.ops
            .post_processor
            .post_process(&mut self.population, &self.target)?;

        // Pool the population with the archived discards; the solution
        // set is the non-dominated feasible subset.
        let mut pool = DesignGroup::new();
        for design in self.population.drain() {
            if design.is_evaluated() && !design.is_ill_conditioned() {
                pool.insert(design);
            } else {
                self.target.take_design(design);
            }
        }
        for design in self.target.drain_discards() {
            if pool.contains_variables(design.variables()) {
                self.target.take_design(design);
            } else {
                pool.insert(design);
            }
        }

        let keep = non_dominated_ids(pool.iter(), &self.target);
        let mut solutions = DesignGroup::new();
        for id in keep {
            let design = pool.take_by_id(id).expect("front ids are in the pool");
            solutions.insert(design);
        }
        for design in pool.drain() {
            self.target.take_design(design);
        }

        self.ops.finalize_all(&self.target)?;
        self.finalized = true;
        log::info!("finalized with {} solutions", solutions.len());
        self.emit(GaEvent::Finalized {
            solutions: solutions.len(),
        });
        Ok(solutions)
    }

    // ------------------------------------------------------------------
    // Generation phases, called by the main-loop operator.
    // ------------------------------------------------------------------

    /// Lets the nicher re-insert cached designs before selection work
    /// begins.
    pub(crate) fn pre_selection_phase(&mut self) -> Result<(), Error> {
        self.ops
            .niche_pressure
            .pre_selection(&mut self.population, &self.target)
    }

    pub(crate) fn crossover_phase(&mut self) -> Result<(), Error> {
        self.ops.crosser.crossover(
            &self.population,
            &mut self.children,
            &self.target,
            &mut self.rng,
        )?;
        log::info!(
            "population size after {}: {} (+{} children)",
            self.ops.crosser.name(),
            self.population.len(),
            self.children.len()
        );
        Ok(())
    }

    pub(crate) fn mutation_phase(&mut self) -> Result<(), Error> {
        self.ops.mutator.mutate(
            &mut self.population,
            &mut self.children,
            &self.target,
            &mut self.rng,
        )?;
        log::info!(
            "population size after {}: {} (+{} children)",
            self.ops.mutator.name(),
            self.population.len(),
            self.children.len()
        );
        Ok(())
    }

    /// Deduplicates the offspring buffer against the population and
    /// itself; removed clones go back to the target.
    pub(crate) fn clone_removal_phase(&mut self) -> Result<usize, Error> {
        let mut doomed: Vec<u64> = Vec::new();
        for child in self.children.iter() {
            if self.population.contains_variables(child.variables()) {
                doomed.push(child.id());
            }
        }
        let mut previous: Option<(&Design, u64)> = None;
        for child in self.children.iter_dv() {
            if let Some((prev, prev_id)) = previous {
                if prev.variables() == child.variables() && !doomed.contains(&prev_id) {
                    doomed.push(child.id());
                    continue;
                }
            }
            previous = Some((child, child.id()));
        }
        doomed.sort_unstable();
        doomed.dedup();

        let removed = doomed.len();
        for id in doomed {
            let design = self
                .children
                .take_by_id(id)
                .expect("doomed ids are in the offspring buffer");
            self.target.take_design(design);
        }
        if removed > 0 {
            log::info!("clone removal: {removed} duplicate offspring retired");
        }
        Ok(removed)
    }

    /// Replaces every out-of-bounds representation with the nearest
    /// legal one before evaluation.
    pub(crate) fn legalization_phase(&mut self) -> Result<(), Error> {
        let mut legalized = 0usize;
        for group in [&mut self.children, &mut self.population] {
            for design in group.designs_mut() {
                if !design.is_evaluated() && self.target.legalize_design(design) {
                    legalized += 1;
                }
            }
            group.synchronize();
        }
        if legalized > 0 {
            log::warn!("legalization: {legalized} designs carried illegal representations");
        }
        Ok(())
    }

    pub(crate) fn evaluation_phase(&mut self) -> Result<usize, Error> {
        let mut evaluated = self.ops.evaluator.evaluate(&mut self.children, &self.target)?;
        evaluated += self
            .ops
            .evaluator
            .evaluate(&mut self.population, &self.target)?;
        self.stats.evaluations += evaluated;

        // Ill-conditioned designs leave circulation immediately.
        for group in [&mut self.children, &mut self.population] {
            let sick: Vec<u64> = group
                .iter()
                .filter(|d| d.is_ill_conditioned())
                .map(Design::id)
                .collect();
            for id in sick {
                let design = group.take_by_id(id).expect("listed ids are present");
                self.target.take_design(design);
            }
        }
        log::info!(
            "population size after {}: {} (+{} children), {} evaluations so far",
            self.ops.evaluator.name(),
            self.population.len(),
            self.children.len(),
            self.stats.evaluations
        );
        Ok(evaluated)
    }

    pub(crate) fn fitness_phase(&mut self, topology: GenerationTopology) -> Result<(), Error> {
        let groups: Vec<&DesignGroup> = match topology {
            GenerationTopology::Plus => {
                if self.children.is_empty() {
                    vec![&self.population]
                } else {
                    vec![&self.population, &self.children]
                }
            }
            GenerationTopology::Comma => {
                if self.children.is_empty() {
                    vec![&self.population]
                } else {
                    vec![&self.children]
                }
            }
        };
        let record = self.ops.fitness_assessor.assess_fitness(&groups, &self.target)?;

        // Contract: every design seen by the assessor must be scored.
        for group in &groups {
            for design in group.iter() {
                if record.fitness_of(design).is_none() {
                    return Err(handle_failure(Error::Contract(
                        ContractError::MissingFitness {
                            design_id: design.id(),
                        },
                    )));
                }
            }
        }
        self.fitnesses = record;
        Ok(())
    }

    pub(crate) fn selection_phase(&mut self, topology: GenerationTopology) -> Result<(), Error> {
        let mut sources: Vec<DesignGroup> = Vec::new();
        match topology {
            GenerationTopology::Plus => {
                sources.push(std::mem::take(&mut self.population));
                sources.push(std::mem::take(&mut self.children));
            }
            GenerationTopology::Comma => {
                let mut parents = std::mem::take(&mut self.population);
                if self.children.is_empty() {
                    // No offspring this generation; the parents are all
                    // there is to select from.
                    sources.push(parents);
                } else {
                    for design in parents.drain() {
                        self.target.take_design(design);
                    }
                    sources.push(std::mem::take(&mut self.children));
                }
            }
        }

        let mut next = DesignGroup::new();
        self.ops.selector.select(
            &mut sources,
            &mut next,
            self.config.population_size,
            &self.fitnesses,
            &self.target,
            &mut self.rng,
        )?;

        for mut group in sources {
            for design in group.drain() {
                self.target.take_design(design);
            }
        }
        self.population = next;
        log::info!(
            "population size after {}: {}",
            self.ops.selector.name(),
            self.population.len()
        );
        Ok(())
    }

    pub(crate) fn niche_phase(&mut self) -> Result<(), Error> {
        self.ops.niche_pressure.apply_niche_pressure(
            &mut self.population,
            &self.fitnesses,
            &self.target,
        )?;
        log::info!(
            "population size after {}: {}",
            self.ops.niche_pressure.name(),
            self.population.len()
        );
        Ok(())
    }

    pub(crate) fn convergence_phase(&mut self) -> Result<bool, Error> {
        let converged = self.ops.converger.check_convergence(
            &self.population,
            &self.fitnesses,
            &self.stats,
            &self.target,
        )?;
        self.emit(GaEvent::ConvergenceChecked {
            generation: self.stats.generation,
            converged,
        });
        Ok(converged)
    }

    /// Verifies the group-level invariants: the sorted views of both the
    /// population and the offspring buffer cover exactly their designs.
    pub fn check_group_invariants(&self) -> Result<(), Error> {
        self.population.check_views_in_sync()?;
        self.children.check_views_in_sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_validates_population_size() {
        let err = GaConfigBuilder::default()
            .population_size(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("population size"));

        let config = GaConfigBuilder::default()
            .population_size(10)
            .seed(3)
            .build()
            .unwrap();
        assert_eq!(config.population_size(), 10);
        assert_eq!(config.seed(), Some(3));
    }

    #[test]
    fn test_run_stats_elapsed_monotone() {
        let stats = RunStats::new();
        let a = stats.elapsed();
        let b = stats.elapsed();
        assert!(b >= a);
    }
}
