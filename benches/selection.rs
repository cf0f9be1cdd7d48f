use criterion::{Criterion, criterion_group, criterion_main};

use evoxide::operators::Selector;
use evoxide::operators::selection::RouletteWheelSelector;
use evoxide::prelude::*;
use evoxide::{DesignGroup, FitnessRecord};

fn build_target() -> DesignTarget {
    let mut target = DesignTarget::new();
    target
        .add_variable(VariableInfo::continuum_real("x", 0.0, 1.0, 6))
        .add_variable(VariableInfo::continuum_real("y", 0.0, 1.0, 6))
        .add_objective(ObjectiveInfo::minimize("f"));
    target
}

fn scored_pool(target: &DesignTarget, size: usize) -> (DesignGroup, FitnessRecord) {
    let mut rng = StdRandomGenerator::new_from_seed(Some(17));
    let mut group = DesignGroup::new();
    let mut record = FitnessRecord::new();
    for _ in 0..size {
        let mut design = target.new_design();
        design
            .variables_mut()
            .assign(&target.random_design_variables(&mut rng));
        design.set_objective(0, rng.gen_probability());
        record.record(design.id(), rng.gen_probability() * 10.0 - 5.0);
        group.insert(design);
    }
    (group, record)
}

fn bench_roulette(c: &mut Criterion) {
    let target = build_target();
    c.bench_function("roulette_sus_1000_of_1000", |b| {
        b.iter_batched(
            || scored_pool(&target, 1000),
            |(group, record)| {
                let mut selector = RouletteWheelSelector::new();
                let mut rng = StdRandomGenerator::new_from_seed(Some(3));
                let mut sources = vec![group];
                let mut into = DesignGroup::new();
                selector
                    .select(&mut sources, &mut into, 1000, &record, &target, &mut rng)
                    .unwrap();
                into
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_roulette);
criterion_main!(benches);
