//! Quad-tree index benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use qix_index::{ByteOrderCode, Envelope, IndexStore, MemoryQuadTree, QuadTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;
use tempfile::tempdir;

fn records(size: u32) -> Vec<(u32, Envelope)> {
    let mut rng = StdRng::seed_from_u64(17);
    (0..size)
        .map(|i| {
            let x = rng.gen_range(0.0..1000.0);
            let y = rng.gen_range(0.0..1000.0);
            (i, Envelope::new(x, y, x + 1.0, y + 1.0))
        })
        .collect()
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("IndexStore Store");

    for size in [1000u32, 10000, 100000].iter() {
        let data = records(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let tree = MemoryQuadTree::from_records(data.iter().copied(), 8).unwrap();
                    (tree, dir)
                },
                |(mut tree, dir)| {
                    let path = dir.path().join("bench.qix");
                    let store = IndexStore::new(path, ByteOrderCode::NewMsb);
                    store.store(&mut tree).unwrap();
                    black_box(tree.num_shapes())
                },
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("FileSystemQuadTree Search");

    let dir = tempdir().unwrap();
    let store = IndexStore::new(dir.path().join("bench.qix"), ByteOrderCode::NewMsb);
    let mut tree = MemoryQuadTree::from_records(records(100000), 8).unwrap();
    store.store(&mut tree).unwrap();

    group.bench_function("cold_search_100k", |b| {
        b.iter_with_setup(
            || store.load().unwrap(),
            |index| {
                let query = Envelope::new(250.0, 250.0, 300.0, 300.0);
                black_box(index.search(&query).unwrap())
            },
        );
    });

    let warm = store.load().unwrap();
    group.bench_function("warm_search_100k", |b| {
        b.iter(|| {
            let query = Envelope::new(250.0, 250.0, 300.0, 300.0);
            black_box(warm.search(&query).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_store, bench_search);
criterion_main!(benches);
