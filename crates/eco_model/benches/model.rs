//! Model benchmarks for eco_model.
//!
//! Run with: `cargo bench -p eco_model`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eco_model::prelude::*;

const SIGHTINGS: [(UnitType, u32, Frame, bool); 5] = [
    (UnitType::Gateway, 1, 1800, true),
    (UnitType::Assimilator, 2, 2300, false),
    (UnitType::Zealot, 3, 2775, false),
    (UnitType::CyberneticsCore, 4, 3450, false),
    (UnitType::Zealot, 5, 3625, false),
];

fn view_at(frame: Frame) -> MatchSnapshot {
    MatchSnapshot {
        frame,
        ..MatchSnapshot::default()
    }
}

fn loaded_model() -> OpponentEconomicModel {
    let mut model = OpponentEconomicModel::new(ModelConfig::default());
    model.initialize(&view_at(0));
    for (unit_type, id, frame, known) in SIGHTINGS {
        model.unit_created(unit_type, UnitId(id), frame, known);
    }
    model
}

/// Full recompute after a batch of sightings.
pub fn recompute_benchmark(c: &mut Criterion) {
    c.bench_function("recompute_dark_templar_opening", |b| {
        b.iter_batched(
            loaded_model,
            |mut model| {
                model.update(&view_at(4500));
                black_box(model.state_hash())
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

/// Queries against a recomputed model, cold and memoized.
pub fn query_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    group.bench_function("worst_case_cold", |b| {
        b.iter_batched(
            || {
                let mut model = loaded_model();
                model.update(&view_at(4500));
                model
            },
            |mut model| black_box(model.worst_case_unit_count(UnitType::Zealot, Some(8000))),
            criterion::BatchSize::SmallInput,
        );
    });

    let mut warm = loaded_model();
    warm.update(&view_at(4500));
    warm.worst_case_unit_count(UnitType::Zealot, Some(8000));
    group.bench_function("worst_case_memoized", |b| {
        b.iter(|| black_box(warm.worst_case_unit_count(UnitType::Zealot, Some(8000))));
    });

    group.bench_function("earliest_production_memoized", |b| {
        b.iter(|| black_box(warm.earliest_unit_production_frame(UnitType::DarkTemplar)));
    });

    group.finish();
}

criterion_group!(benches, recompute_benchmark, query_benchmark);
criterion_main!(benches);
