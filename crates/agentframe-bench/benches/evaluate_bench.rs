//! End-to-end `Arbiter::evaluate` benchmark, the hot path a caller hits on
//! every action.

use std::time::Instant;

use agentframe_arbiter::{AuditLog, Engine, EngineConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn fresh_engine() -> Engine {
    Engine::new(EngineConfig::default(), AuditLog::to_buffer())
}

fn bench_evaluate(c: &mut Criterion) {
    // Each case gets its own engine/agent so that repeated failing
    // iterations in `block_structural` don't trip the circuit breaker and
    // change what's being measured partway through the run.
    let allow_engine = fresh_engine();
    c.bench_function("evaluate/allow", |b| {
        b.iter(|| {
            black_box(allow_engine.evaluate("allow-agent", black_box("⊕◊▶β"), None, Instant::now()))
        });
    });

    let block_engine = fresh_engine();
    c.bench_function("evaluate/block_structural", |b| {
        b.iter(|| {
            black_box(block_engine.evaluate("block-agent", black_box("▶"), None, Instant::now()))
        });
    });

    let chain_engine = fresh_engine();
    c.bench_function("evaluate/chain_with_parent", |b| {
        b.iter(|| {
            black_box(chain_engine.evaluate(
                "chain-agent",
                black_box("⊕◊▶β"),
                Some(black_box("⊕◊▼α")),
                Instant::now(),
            ))
        });
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
