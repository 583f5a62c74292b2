use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use edgeix::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_index(num_nodes: usize, num_edges: usize, seed: u64) -> (EdgeIndex, Array) {
    let mut rng = StdRng::seed_from_u64(seed);
    let row: Vec<i64> = (0..num_edges)
        .map(|_| rng.gen_range(0..num_nodes as i64))
        .collect();
    let col: Vec<i64> = (0..num_edges)
        .map(|_| rng.gen_range(0..num_nodes as i64))
        .collect();
    let mut index = EdgeIndex::from_slices(&row, &col)
        .unwrap()
        .with_sparse_size(Some(num_nodes), Some(num_nodes));
    let (index, _) = index.sort_by(SortOrder::Row).unwrap();
    let x: Vec<f32> = (0..num_nodes * 64).map(|_| rng.gen_range(-1.0..1.0)).collect();
    (index, Array::from_slice(&x, &[num_nodes, 64]))
}

fn bench_spmm(c: &mut Criterion) {
    let mut group = c.benchmark_group("spmm_f32_k64");
    for &num_nodes in &[1_000usize, 10_000, 50_000] {
        let num_edges = num_nodes * 10;
        let (mut grouped, x) = random_index(num_nodes, num_edges, 42);
        grouped.fill_cache_().unwrap();
        group.bench_with_input(
            BenchmarkId::new("grouped", num_nodes),
            &num_nodes,
            |b, _| {
                b.iter(|| {
                    black_box(matmul(&mut grouped, None, &x, ReduceOp::Sum, false).unwrap())
                })
            },
        );

        let (scatter, _) = random_index(num_nodes, num_edges, 42);
        let mut scatter = scatter.flip_edges().unwrap();
        group.bench_with_input(
            BenchmarkId::new("scatter", num_nodes),
            &num_nodes,
            |b, _| {
                b.iter(|| {
                    black_box(matmul(&mut scatter, None, &x, ReduceOp::Sum, false).unwrap())
                })
            },
        );
    }
    group.finish();
}

fn bench_fill_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_cache");
    for &num_nodes in &[10_000usize, 100_000] {
        let (index, _) = random_index(num_nodes, num_nodes * 10, 7);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_nodes),
            &num_nodes,
            |b, _| {
                b.iter(|| {
                    let mut fresh = index.clone();
                    fresh.fill_cache_().unwrap();
                    black_box(fresh)
                })
            },
        );
    }
    group.finish();
}

fn bench_spspmm(c: &mut Criterion) {
    let mut group = c.benchmark_group("spspmm");
    group.sample_size(20);
    for &num_nodes in &[1_000usize, 5_000] {
        let (a, _) = random_index(num_nodes, num_nodes * 8, 3);
        let (b_index, _) = random_index(num_nodes, num_nodes * 8, 4);
        group.bench_with_input(
            BenchmarkId::from_parameter(num_nodes),
            &num_nodes,
            |bencher, _| {
                bencher.iter(|| {
                    let mut a = a.clone();
                    let mut b = b_index.clone();
                    black_box(spspmm(&mut a, None, &mut b, None).unwrap())
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_spmm, bench_fill_cache, bench_spspmm);
criterion_main!(benches);
