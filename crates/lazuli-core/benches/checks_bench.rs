//! # Check Benchmarks
//!
//! Performance benchmarks for lazuli-core lazy reference checks.
//!
//! Run with: `cargo bench -p lazuli-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use lazuli_core::{
    AppRegistry, ModelSignals, Receiver, SenderSpec, check_lazy_references,
};
use std::hint::black_box;

/// Registry with N pending signal connections against never-registered
/// models.
fn create_pending_registry(signals: &ModelSignals, size: usize) -> AppRegistry {
    let mut registry = AppRegistry::new();
    for i in 0..size {
        signals
            .post_save
            .connect(
                &mut registry,
                Receiver::function(format!("on_save_{i}"), "bench::handlers", |_| {}),
                SenderSpec::lazy(format!("missing-app.Model{i}")),
                false,
                None,
            )
            .expect("connect");
    }
    registry
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_check_lazy_references(c: &mut Criterion) {
    let mut group = c.benchmark_group("check_lazy_references");

    for size in [10, 100, 1000].iter() {
        let signals = ModelSignals::new();
        let registry = create_pending_registry(&signals, *size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(check_lazy_references(&registry, &signals, None)));
        });
    }

    group.finish();
}

fn bench_empty_short_circuit(c: &mut Criterion) {
    let signals = ModelSignals::new();
    let registry = AppRegistry::new();

    c.bench_function("check_lazy_references/empty", |b| {
        b.iter(|| black_box(check_lazy_references(&registry, &signals, None)));
    });
}

criterion_group!(benches, bench_check_lazy_references, bench_empty_short_circuit);
criterion_main!(benches);
