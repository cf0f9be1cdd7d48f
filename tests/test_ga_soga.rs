//! End-to-end single-objective runs.

use std::sync::Arc;

use ndarray::Array1;

use evoxide::prelude::*;

/// Minimize the 3-variable sphere on [-1, 1]^3 subject to staying inside
/// the unit ball.
fn sphere_target() -> DesignTarget {
    let mut target = DesignTarget::new();
    target
        .add_variable(VariableInfo::continuum_real("x", -1.0, 1.0, 6))
        .add_variable(VariableInfo::continuum_real("y", -1.0, 1.0, 6))
        .add_variable(VariableInfo::continuum_real("z", -1.0, 1.0, 6))
        .add_objective(ObjectiveInfo::minimize("f"))
        .add_constraint(ConstraintInfo::upper_bounded("g", 0.0));
    target
}

fn sphere_functor() -> Arc<dyn EvaluationFunctor> {
    Arc::new(
        |values: &Array1<f64>, objectives: &mut Array1<f64>, constraints: &mut Array1<f64>| {
            let ss: f64 = values.iter().map(|v| v * v).sum();
            objectives[0] = ss;
            constraints[0] = ss - 1.0;
            true
        },
    )
}

#[test]
fn test_soga_minimizes_the_sphere() {
    let mut db = ParameterDatabase::new();
    db.set_size("method.max_iterations", 40);
    db.set_real("method.crossover_rate", 0.8);
    db.set_real("method.mutation_rate", 0.3);

    let config = GaConfigBuilder::default()
        .population_size(40)
        .seed(123)
        .build()
        .expect("valid configuration");
    let mut ga = GeneticAlgorithm::new(
        sphere_target(),
        registry::soga_group(),
        OperatorSelections::soga_defaults(),
        config,
        &db,
    )
    .expect("sound composition");
    ga.set_evaluation_functor(sphere_functor()).unwrap();

    ga.run().expect("GA run failed");
    assert!(ga.generation() <= 40);
    ga.check_group_invariants().unwrap();

    // Selection keeps the population at the configured size and every
    // member evaluated.
    assert_eq!(ga.population().len(), 40);
    for design in ga.population().iter() {
        assert!(design.is_evaluated());
    }

    let best = ga
        .population()
        .iter()
        .map(|d| d.objective(0))
        .fold(f64::INFINITY, f64::min);
    assert!(best < 1.0, "selection pressure should beat {best}");
}

#[test]
fn test_finalize_promotes_the_best_design() {
    let mut db = ParameterDatabase::new();
    db.set_size("method.max_iterations", 15);

    let config = GaConfigBuilder::default()
        .population_size(20)
        .seed(77)
        .build()
        .unwrap();
    let mut ga = GeneticAlgorithm::new(
        sphere_target(),
        registry::soga_group(),
        OperatorSelections::soga_defaults(),
        config,
        &db,
    )
    .unwrap();
    ga.set_evaluation_functor(sphere_functor()).unwrap();
    ga.run().unwrap();

    let best_seen = ga
        .population()
        .iter()
        .map(|d| d.objective(0))
        .fold(f64::INFINITY, f64::min);

    let solutions = ga.finalize().expect("finalize succeeds once");
    assert!(ga.is_finalized());
    assert!(!solutions.is_empty());
    // With one objective, the solution set collapses to the best known
    // feasible designs, which can come from the discard archive too.
    let solution_best = solutions
        .iter()
        .map(|d| d.objective(0))
        .fold(f64::INFINITY, f64::min);
    assert!(solution_best <= best_seen + 1e-12);
    for design in solutions.iter() {
        assert!(design.is_evaluated());
        assert!(design.is_feasible());
    }

    // The algorithm is terminal now.
    assert!(ga.do_generation().is_err());
    assert!(ga.finalize().is_err());
}

#[test]
fn test_comma_topology_runs() {
    let mut db = ParameterDatabase::new();
    db.set_size("method.max_iterations", 10);
    db.set_bool("method.jega.elitist_selection", false);
    db.set_real("method.crossover_rate", 1.0);

    let config = GaConfigBuilder::default()
        .population_size(16)
        .seed(9)
        .build()
        .unwrap();
    let mut ga = GeneticAlgorithm::new(
        sphere_target(),
        registry::soga_group(),
        OperatorSelections::soga_defaults(),
        config,
        &db,
    )
    .unwrap();
    ga.set_evaluation_functor(sphere_functor()).unwrap();

    ga.run().unwrap();
    assert!(!ga.population().is_empty());
    ga.check_group_invariants().unwrap();
}

#[test]
fn test_cross_group_composition_fails_at_configuration_time() {
    let mut selections = OperatorSelections::soga_defaults();
    selections.fitness_assessor = "domination_count".into();

    let config = GaConfigBuilder::default()
        .population_size(8)
        .build()
        .unwrap();
    let db = ParameterDatabase::new();
    let err = GeneticAlgorithm::new(
        sphere_target(),
        registry::soga_group(),
        selections,
        config,
        &db,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(evoxide::ConfigError::IncompatibleComposition { .. })
    ));
}
