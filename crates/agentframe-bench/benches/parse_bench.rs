//! Frame parser benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const FRAMES: &[(&str, &str)] = &[
    ("minimal", "⊕◊"),
    ("typical", "⊕◊▶β"),
    ("max_length", "⊕◊▶β★☆◎⚠✓✗⛔⇑⇓"),
    ("with_unknowns", "⊕◊▶βxyz123"),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_parse");
    for (label, raw) in FRAMES {
        group.bench_with_input(BenchmarkId::new("parse", label), raw, |b, raw| {
            b.iter(|| black_box(agentframe_core::frame::parse(black_box(raw))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
