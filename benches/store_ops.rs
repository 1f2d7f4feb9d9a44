//! Store operation benchmarks
//!
//! Single-operation throughput for Map and List stores, transaction commits,
//! and lazy queries.
//!
//! ## Running
//!
//! ```bash
//! cargo bench --bench store_ops
//!
//! # Specific groups
//! cargo bench --bench store_ops -- "map/"
//! cargo bench --bench store_ops -- "query/"
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use speicher::{ListStore, MapStore, State};
use std::collections::BTreeMap;

/// Store sizes for scaling benchmarks.
const SIZES: &[usize] = &[100, 1_000, 10_000];

fn filled_map(n: usize) -> std::sync::Arc<MapStore<Vec<u64>>> {
    let map = MapStore::ephemeral();
    let entries: BTreeMap<String, Vec<u64>> = (0..n as u64)
        .map(|i| (format!("key:{i:08}"), vec![i; 8]))
        .collect();
    map.overwrite(&entries);
    map
}

fn map_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");
    group.throughput(Throughput::Elements(1));

    let map = filled_map(1_000);
    group.bench_function("get_hit", |b| {
        b.iter(|| black_box(map.get(black_box("key:00000500"))))
    });
    group.bench_function("get_miss", |b| {
        b.iter(|| black_box(map.get(black_box("absent"))))
    });

    let value = vec![7u64; 8];
    group.bench_function("set_existing", |b| {
        b.iter(|| map.set(black_box("key:00000001"), &value))
    });

    group.bench_function("tx_commit_10", |b| {
        b.iter(|| {
            let mut tx = map.begin();
            for i in 0..10 {
                tx.set(format!("key:{i:08}"), &value).ok();
            }
            black_box(tx.commit())
        })
    });

    group.bench_function("state_lock_unlock", |b| {
        b.iter(|| {
            let mut state = State::new();
            state.lock(&*map);
            state.read_lock(&*map);
            state.read_unlock(&*map);
            state.unlock(&*map);
        })
    });

    group.finish();
}

fn list_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("list");
    group.throughput(Throughput::Elements(1));

    let list = ListStore::<String>::ephemeral();
    let item = "payload".repeat(8);
    group.bench_function("append", |b| b.iter(|| list.append(black_box(&item))));
    group.bench_function("get", |b| b.iter(|| black_box(list.get(black_box(0)))));

    group.finish();
}

fn query_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");

    for &size in SIZES {
        let map = filled_map(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("select_all", size), &size, |b, _| {
            b.iter(|| black_box(map.select().count()))
        });
        group.bench_with_input(BenchmarkId::new("select_limit_10", size), &size, |b, _| {
            b.iter(|| black_box(map.select().limit(10).count()))
        });
        group.bench_with_input(BenchmarkId::new("find_all_even", size), &size, |b, _| {
            b.iter(|| black_box(map.find_all(|v| v[0] % 2 == 0).len()))
        });
    }

    group.finish();
}

criterion_group!(benches, map_ops, list_ops, query_ops);
criterion_main!(benches);
