//! Named operator registries and the composition guard.
//!
//! An [`OperatorRegistry`] holds one factory map per operator family.
//! Two standard groups ship with the crate: [`moga_group`] contains only
//! operators sound for multi-objective search, [`soga_group`] likewise
//! for single-objective.  Both are process-wide, lazily initialized
//! exactly once, and read-only afterwards.
//!
//! Instantiating a named operator from a group is the configuration-time
//! composition guard: asking a group for an operator it does not carry
//! fails before generation 0, and the error distinguishes a name that is
//! merely unknown from one that belongs to the other group.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::error::{ConfigError, Error, handle_failure};
use crate::operators::convergence::{
    AverageFitnessTrackerConverger, BestFitnessTrackerConverger, MaxGenEvalTimeConverger,
};
use crate::operators::crossover::{NPointParameterizedBinaryCrosser, ShuffleRandomCrosser};
use crate::operators::evaluation::SimpleFunctorEvaluator;
use crate::operators::fitness::{DominationCountFitnessAssessor, WeightedSumFitnessAssessor};
use crate::operators::initialization::{FlatFileInitializer, RandomUniqueInitializer};
use crate::operators::main_loop::StandardMainLoop;
use crate::operators::mutation::{LocalDesignVariableMutator, OffsetMutator, ReplaceUniformMutator};
use crate::operators::niching::{
    DistanceNichePressureApplicator, MaxDesignsNichePressureApplicator,
    NullNichePressureApplicator, RadialNichePressureApplicator,
};
use crate::operators::postprocess::{DistanceNichingPostProcessor, NullPostProcessor};
use crate::operators::selection::{BelowLimitSelector, RouletteWheelSelector};
use crate::operators::{
    Converger, Crosser, Evaluator, FitnessAssessor, Initializer, MainLoop, Mutator,
    NichePressureApplicator, OperatorFamily, PostProcessor, Selector,
};

pub type InitializerFactory = fn() -> Box<dyn Initializer>;
pub type EvaluatorFactory = fn() -> Box<dyn Evaluator>;
pub type FitnessAssessorFactory = fn() -> Box<dyn FitnessAssessor>;
pub type SelectorFactory = fn() -> Box<dyn Selector>;
pub type NichePressureFactory = fn() -> Box<dyn NichePressureApplicator>;
pub type CrosserFactory = fn() -> Box<dyn Crosser>;
pub type MutatorFactory = fn() -> Box<dyn Mutator>;
pub type ConvergerFactory = fn() -> Box<dyn Converger>;
pub type PostProcessorFactory = fn() -> Box<dyn PostProcessor>;
pub type MainLoopFactory = fn() -> Box<dyn MainLoop>;

/// A set of per-family registries mapping stable names to factories.
#[derive(Debug, Default, Clone)]
pub struct OperatorRegistry {
    name: &'static str,
    initializers: BTreeMap<&'static str, InitializerFactory>,
    evaluators: BTreeMap<&'static str, EvaluatorFactory>,
    fitness_assessors: BTreeMap<&'static str, FitnessAssessorFactory>,
    selectors: BTreeMap<&'static str, SelectorFactory>,
    nichers: BTreeMap<&'static str, NichePressureFactory>,
    crossers: BTreeMap<&'static str, CrosserFactory>,
    mutators: BTreeMap<&'static str, MutatorFactory>,
    convergers: BTreeMap<&'static str, ConvergerFactory>,
    post_processors: BTreeMap<&'static str, PostProcessorFactory>,
    main_loops: BTreeMap<&'static str, MainLoopFactory>,
}

macro_rules! registry_family {
    ($register:ident, $instantiate:ident, $names:ident, $map:ident,
     $factory:ty, $boxed:ty, $family:expr) => {
        pub fn $register(&mut self, name: &'static str, factory: $factory) {
            self.$map.insert(name, factory);
        }

        pub fn $instantiate(&self, name: &str) -> Result<$boxed, Error> {
            match self.$map.get(name) {
                Some(factory) => {
                    let operator = factory();
                    log::debug!("constructed {} operator `{name}`", $family.as_str());
                    Ok(operator)
                }
                None => Err(handle_failure(Error::Config(self.unknown($family, name)))),
            }
        }

        pub fn $names(&self) -> Vec<&'static str> {
            self.$map.keys().copied().collect()
        }
    };
}

impl OperatorRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    registry_family!(
        register_initializer,
        instantiate_initializer,
        initializer_names,
        initializers,
        InitializerFactory,
        Box<dyn Initializer>,
        OperatorFamily::Initializer
    );
    registry_family!(
        register_evaluator,
        instantiate_evaluator,
        evaluator_names,
        evaluators,
        EvaluatorFactory,
        Box<dyn Evaluator>,
        OperatorFamily::Evaluator
    );
    registry_family!(
        register_fitness_assessor,
        instantiate_fitness_assessor,
        fitness_assessor_names,
        fitness_assessors,
        FitnessAssessorFactory,
        Box<dyn FitnessAssessor>,
        OperatorFamily::FitnessAssessor
    );
    registry_family!(
        register_selector,
        instantiate_selector,
        selector_names,
        selectors,
        SelectorFactory,
        Box<dyn Selector>,
        OperatorFamily::Selector
    );
    registry_family!(
        register_niche_pressure,
        instantiate_niche_pressure,
        niche_pressure_names,
        nichers,
        NichePressureFactory,
        Box<dyn NichePressureApplicator>,
        OperatorFamily::NichePressure
    );
    registry_family!(
        register_crosser,
        instantiate_crosser,
        crosser_names,
        crossers,
        CrosserFactory,
        Box<dyn Crosser>,
        OperatorFamily::Crosser
    );
    registry_family!(
        register_mutator,
        instantiate_mutator,
        mutator_names,
        mutators,
        MutatorFactory,
        Box<dyn Mutator>,
        OperatorFamily::Mutator
    );
    registry_family!(
        register_converger,
        instantiate_converger,
        converger_names,
        convergers,
        ConvergerFactory,
        Box<dyn Converger>,
        OperatorFamily::Converger
    );
    registry_family!(
        register_post_processor,
        instantiate_post_processor,
        post_processor_names,
        post_processors,
        PostProcessorFactory,
        Box<dyn PostProcessor>,
        OperatorFamily::PostProcessor
    );
    registry_family!(
        register_main_loop,
        instantiate_main_loop,
        main_loop_names,
        main_loops,
        MainLoopFactory,
        Box<dyn MainLoop>,
        OperatorFamily::MainLoop
    );

    /// Whether `name` is registered for `family`.
    pub fn has(&self, family: OperatorFamily, name: &str) -> bool {
        match family {
            OperatorFamily::Initializer => self.initializers.contains_key(name),
            OperatorFamily::Evaluator => self.evaluators.contains_key(name),
            OperatorFamily::FitnessAssessor => self.fitness_assessors.contains_key(name),
            OperatorFamily::Selector => self.selectors.contains_key(name),
            OperatorFamily::NichePressure => self.nichers.contains_key(name),
            OperatorFamily::Crosser => self.crossers.contains_key(name),
            OperatorFamily::Mutator => self.mutators.contains_key(name),
            OperatorFamily::Converger => self.convergers.contains_key(name),
            OperatorFamily::PostProcessor => self.post_processors.contains_key(name),
            OperatorFamily::MainLoop => self.main_loops.contains_key(name),
        }
    }

    /// Imports every registration of `other`.  Idempotent: existing
    /// entries are simply overwritten with identical factories.
    pub fn absorb(&mut self, other: &OperatorRegistry) {
        self.initializers.extend(&other.initializers);
        self.evaluators.extend(&other.evaluators);
        self.fitness_assessors.extend(&other.fitness_assessors);
        self.selectors.extend(&other.selectors);
        self.nichers.extend(&other.nichers);
        self.crossers.extend(&other.crossers);
        self.mutators.extend(&other.mutators);
        self.convergers.extend(&other.convergers);
        self.post_processors.extend(&other.post_processors);
        self.main_loops.extend(&other.main_loops);
    }

    /// Builds the error for a name this group cannot supply: a name the
    /// sibling standard group carries is an incompatible composition
    /// rather than an unknown operator.
    fn unknown(&self, family: OperatorFamily, name: &str) -> ConfigError {
        let elsewhere = [moga_group(), soga_group()]
            .iter()
            .any(|g| g.name != self.name && g.has(family, name));
        if elsewhere {
            ConfigError::IncompatibleComposition {
                group: self.name,
                name: name.to_string(),
            }
        } else {
            ConfigError::UnknownOperator {
                family: family.as_str(),
                name: name.to_string(),
            }
        }
    }
}

/// Registers the operators sound for both kinds of search.
fn register_common(registry: &mut OperatorRegistry) {
    registry.register_initializer(RandomUniqueInitializer::NAME, || {
        Box::new(RandomUniqueInitializer::new())
    });
    registry.register_initializer(FlatFileInitializer::NAME, || {
        Box::new(FlatFileInitializer::new())
    });

    registry.register_evaluator(SimpleFunctorEvaluator::NAME, || {
        Box::new(SimpleFunctorEvaluator::new())
    });

    registry.register_selector(RouletteWheelSelector::NAME, || {
        Box::new(RouletteWheelSelector::new())
    });
    registry.register_selector(BelowLimitSelector::NAME, || {
        Box::new(BelowLimitSelector::new())
    });

    registry.register_crosser(NPointParameterizedBinaryCrosser::NAME, || {
        Box::new(NPointParameterizedBinaryCrosser::new())
    });
    registry.register_crosser(ShuffleRandomCrosser::NAME, || {
        Box::new(ShuffleRandomCrosser::new())
    });

    registry.register_mutator(ReplaceUniformMutator::NAME, || {
        Box::new(ReplaceUniformMutator::new())
    });
    registry.register_mutator("offset_normal", || Box::new(OffsetMutator::normal()));
    registry.register_mutator("offset_uniform", || Box::new(OffsetMutator::uniform()));
    registry.register_mutator("offset_cauchy", || Box::new(OffsetMutator::cauchy()));
    registry.register_mutator(LocalDesignVariableMutator::NAME, || {
        Box::new(LocalDesignVariableMutator::new())
    });

    registry.register_converger(MaxGenEvalTimeConverger::NAME, || {
        Box::new(MaxGenEvalTimeConverger::new())
    });
    registry.register_converger(BestFitnessTrackerConverger::NAME, || {
        Box::new(BestFitnessTrackerConverger::new())
    });
    registry.register_converger(AverageFitnessTrackerConverger::NAME, || {
        Box::new(AverageFitnessTrackerConverger::new())
    });

    registry.register_niche_pressure(NullNichePressureApplicator::NAME, || {
        Box::new(NullNichePressureApplicator::new())
    });
    registry.register_post_processor(NullPostProcessor::NAME, || {
        Box::new(NullPostProcessor::new())
    });

    registry.register_main_loop(StandardMainLoop::NAME, || {
        Box::new(StandardMainLoop::new())
    });
}

/// The group of operators sound for multi-objective search.
pub fn moga_group() -> &'static OperatorRegistry {
    static GROUP: OnceLock<OperatorRegistry> = OnceLock::new();
    GROUP.get_or_init(|| {
        let mut registry = OperatorRegistry::new("moga");
        register_common(&mut registry);
        registry.register_fitness_assessor(DominationCountFitnessAssessor::NAME, || {
            Box::new(DominationCountFitnessAssessor::new())
        });
        registry.register_niche_pressure(DistanceNichePressureApplicator::NAME, || {
            Box::new(DistanceNichePressureApplicator::new())
        });
        registry.register_niche_pressure(RadialNichePressureApplicator::NAME, || {
            Box::new(RadialNichePressureApplicator::new())
        });
        registry.register_niche_pressure(MaxDesignsNichePressureApplicator::NAME, || {
            Box::new(MaxDesignsNichePressureApplicator::new())
        });
        registry.register_post_processor(DistanceNichingPostProcessor::NAME, || {
            Box::new(DistanceNichingPostProcessor::new())
        });
        registry
    })
}

/// The group of operators sound for single-objective search.
pub fn soga_group() -> &'static OperatorRegistry {
    static GROUP: OnceLock<OperatorRegistry> = OnceLock::new();
    GROUP.get_or_init(|| {
        let mut registry = OperatorRegistry::new("soga");
        register_common(&mut registry);
        registry.register_fitness_assessor(WeightedSumFitnessAssessor::NAME, || {
            Box::new(WeightedSumFitnessAssessor::new())
        });
        registry
    })
}

/// A group holding every built-in operator, for compositions that manage
/// their own soundness.
pub fn all_operators_group() -> &'static OperatorRegistry {
    static GROUP: OnceLock<OperatorRegistry> = OnceLock::new();
    GROUP.get_or_init(|| {
        let mut registry = OperatorRegistry::new("all");
        registry.absorb(moga_group());
        registry.absorb(soga_group());
        registry
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_carry_their_assessors() {
        assert!(moga_group().has(OperatorFamily::FitnessAssessor, "domination_count"));
        assert!(!moga_group().has(OperatorFamily::FitnessAssessor, "weighted_sum_only"));
        assert!(soga_group().has(OperatorFamily::FitnessAssessor, "weighted_sum_only"));
        assert!(!soga_group().has(OperatorFamily::FitnessAssessor, "domination_count"));
    }

    #[test]
    fn test_common_operators_registered_everywhere() {
        for group in [moga_group(), soga_group()] {
            assert!(group.has(OperatorFamily::Initializer, "unique_random"));
            assert!(group.has(OperatorFamily::Initializer, "flat_file"));
            assert!(group.has(OperatorFamily::Selector, "roulette_wheel"));
            assert!(group.has(OperatorFamily::Selector, "below_limit"));
            assert!(group.has(OperatorFamily::Crosser, "multi_point_parameterized_binary"));
            assert!(group.has(OperatorFamily::Mutator, "offset_cauchy"));
            assert!(group.has(OperatorFamily::Converger, "best_fitness_tracker"));
            assert!(group.has(OperatorFamily::MainLoop, "standard"));
        }
    }

    #[test]
    fn test_unknown_operator_fails_at_configuration_time() {
        let err = moga_group().instantiate_selector("spinning_wheel").unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::UnknownOperator { .. })
        ));
    }

    #[test]
    fn test_cross_group_name_is_incompatible_composition() {
        let err = soga_group()
            .instantiate_fitness_assessor("domination_count")
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Config(ConfigError::IncompatibleComposition { .. })
        ));
    }

    #[test]
    fn test_absorb_imports_registrations() {
        let mut custom = OperatorRegistry::new("custom");
        assert!(!custom.has(OperatorFamily::Initializer, "unique_random"));
        custom.absorb(soga_group());
        assert!(custom.has(OperatorFamily::Initializer, "unique_random"));
        // Absorbing twice is idempotent.
        custom.absorb(soga_group());
        assert!(custom.instantiate_initializer("unique_random").is_ok());
    }

    #[test]
    fn test_instantiated_operators_report_their_names() {
        let op = moga_group().instantiate_crosser("shuffle_random").unwrap();
        assert_eq!(op.name(), "shuffle_random");
        let op = moga_group()
            .instantiate_niche_pressure("max_designs")
            .unwrap();
        assert_eq!(op.name(), "max_designs");
    }
}
