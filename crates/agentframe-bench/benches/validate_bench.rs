//! Validator benchmarks across the three rule tiers.

use agentframe_core::frame::parse;
use agentframe_core::validator::{validate, ValidationScope};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    let frame = parse("⊕◊▶β");
    group.bench_function(BenchmarkId::new("structural", "typical"), |b| {
        b.iter(|| black_box(validate(black_box(&frame), None, ValidationScope::Structural)));
    });
    group.bench_function(BenchmarkId::new("semantic", "typical"), |b| {
        b.iter(|| black_box(validate(black_box(&frame), None, ValidationScope::Semantic)));
    });

    let parent = parse("⊕◊▼α");
    group.bench_function(BenchmarkId::new("chain", "typical"), |b| {
        b.iter(|| black_box(validate(black_box(&frame), Some(&parent), ValidationScope::Chain)));
    });
    group.bench_function(BenchmarkId::new("full", "typical"), |b| {
        b.iter(|| black_box(validate(black_box(&frame), Some(&parent), ValidationScope::Full)));
    });

    group.finish();
}

criterion_group!(benches, bench_validate);
criterion_main!(benches);
