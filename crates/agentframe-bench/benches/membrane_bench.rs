//! Drift-engine benchmarks: baseline comparison and monitor recording, the
//! two calls the Arbiter makes on every `report`.

use agentframe_core::frame::parse;
use agentframe_membrane::{BaselineStore, ContinuousMonitor, MonitorConfig};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_baseline_compare(c: &mut Criterion) {
    let baselines = BaselineStore::new();
    let frame = parse("⊕◊▶β");
    let behaviors = vec!["read_file".to_string(), "write_log".to_string()];
    baselines.record(
        "agent-1",
        &frame,
        behaviors.clone(),
        vec![0.1, 0.2, 0.3, 0.4],
        "2026-01-01T00:00:00Z",
    );

    c.bench_function("baseline/compare", |b| {
        b.iter(|| {
            black_box(baselines.compare(
                black_box("agent-1"),
                black_box(&frame),
                behaviors.iter().cloned(),
                black_box(&[0.1, 0.2, 0.3, 0.41]),
            ))
        });
    });
}

fn bench_monitor_record_operation(c: &mut Criterion) {
    let baselines = BaselineStore::new();
    let monitor = ContinuousMonitor::new(MonitorConfig::default());
    let frame = parse("⊕◊▶β");
    let behaviors = vec!["read_file".to_string()];

    c.bench_function("monitor/record_operation", |b| {
        b.iter(|| {
            black_box(monitor.record_operation(
                black_box(&baselines),
                "agent-2",
                black_box(&frame),
                &behaviors,
                true,
                None,
                Some(&[0.5, 0.5, 0.5, 0.5]),
                "2026-01-01T00:00:00Z",
            ))
        });
    });
}

criterion_group!(benches, bench_baseline_compare, bench_monitor_record_operation);
criterion_main!(benches);
