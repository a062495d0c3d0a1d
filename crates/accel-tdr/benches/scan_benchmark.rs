//! Performance benchmarks for the liveness scan and the hot-path counters.

use accel_tdr::prelude::*;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn device_with_contexts(clients: usize, per_client: usize) -> Option<Device> {
    let recovery: Arc<dyn RecoveryHandler> = Arc::new(|_: &RecoveryRequest| {});
    let device = Device::new("bench", TdrConfig::default(), Some(recovery)).ok()?;
    for pid in 0..clients {
        let client = device.open_client(i64::try_from(pid).ok()?);
        for i in 0..per_client {
            let ctx = client.create_context(format!("ctx{i}"));
            ctx.record_submission();
        }
    }
    Some(device)
}

fn bench_hot_path(c: &mut Criterion) {
    let ctx = HwContext::new(ContextId::new(0), ClientId::new(0), 1, "bench");

    c.bench_function("record_submission", |b| {
        b.iter(|| black_box(&ctx).record_submission());
    });

    c.bench_function("record_completion", |b| {
        b.iter(|| black_box(&ctx).record_completion());
    });

    c.bench_function("activity", |b| {
        b.iter(|| black_box(ctx.activity()));
    });
}

fn bench_stuck_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("stuck_scan");

    // Every context is busy and frozen, so each scan walks the whole registry.
    for &(clients, per_client) in &[(1, 4), (4, 16), (16, 64)] {
        let Some(device) = device_with_contexts(clients, per_client) else {
            continue;
        };
        let Some(evaluator) = device.watchdog().evaluator().cloned() else {
            continue;
        };
        group.bench_with_input(
            BenchmarkId::from_parameter(clients * per_client),
            &evaluator,
            |b, evaluator| b.iter(|| black_box(evaluator.scan())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_hot_path, bench_stuck_scan);
criterion_main!(benches);
