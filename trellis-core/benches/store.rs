//! Benchmarks for the write path, observer resolution, and patch application.
//!
//! Run with: cargo bench -p trellis-core

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::hint::black_box;

use trellis_core::{AccessPath, PatchOperation, Store, StoreConfig};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A store with `count` user records under `users`.
fn populated(count: usize) -> Store {
    let users: serde_json::Map<String, serde_json::Value> = (0..count)
        .map(|i| {
            (
                format!("u{i}"),
                json!({ "name": format!("user {i}"), "score": i, "tags": ["a", "b"] }),
            )
        })
        .collect();
    Store::with_config(json!({ "users": users }), StoreConfig::manual())
}

// ---------------------------------------------------------------------------
// 1. Burst of writes followed by one flush
// ---------------------------------------------------------------------------

fn bench_set_and_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/set_flush");

    for writes in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(writes));
        let store = populated(writes as usize);
        let _sub = store.subscribe(|s| {
            black_box(s.get("users.u0.score"));
        });

        let mut round = 0u64;
        group.bench_with_input(BenchmarkId::from_parameter(writes), &writes, |b, &writes| {
            b.iter(|| {
                round += 1;
                for i in 0..writes {
                    store
                        .set(format!("users.u{i}.score"), round)
                        .unwrap_or_default();
                }
                black_box(store.flush())
            })
        });
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 2. Resolution with many observers
// ---------------------------------------------------------------------------

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("store/resolve");

    for observers in [10usize, 100, 1_000] {
        group.throughput(Throughput::Elements(observers as u64));
        let store = populated(observers);
        let subs: Vec<_> = (0..observers)
            .map(|i| {
                let path = AccessPath::from(format!("users.u{i}.name"));
                store.subscribe(move |s| {
                    black_box(s.get(&path));
                })
            })
            .collect();

        let mut toggle = false;
        group.bench_with_input(
            BenchmarkId::new("single_leaf", observers),
            &observers,
            |b, _| {
                b.iter(|| {
                    toggle = !toggle;
                    store
                        .set("users.u0.name", if toggle { "x" } else { "y" })
                        .unwrap_or_default();
                    black_box(store.flush())
                })
            },
        );
        drop(subs);
    }
    group.finish();
}

// ---------------------------------------------------------------------------
// 3. Patch transactions
// ---------------------------------------------------------------------------

fn bench_patch(c: &mut Criterion) {
    let mut group = c.benchmark_group("patch");

    let store = populated(100);
    let commit: Vec<PatchOperation> = (0..10)
        .map(|i| PatchOperation::replace(format!("/users/u{i}/score"), 0))
        .collect();
    group.bench_function("apply_then_rollback", |b| {
        b.iter(|| {
            let result = store.patches().apply(black_box(&commit));
            result.rollback.rollback().unwrap_or_default();
            black_box(store.flush())
        })
    });

    let mut failing = commit.clone();
    failing.push(PatchOperation::test("/users/u0/name", "nobody"));
    group.bench_function("apply_failing", |b| {
        b.iter(|| {
            let result = store.patches().apply(black_box(&failing));
            black_box(result.success)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_set_and_flush, bench_resolve, bench_patch);
criterion_main!(benches);
