//! Dataset benchmarks
//!
//! - Bars generation at increasing grid sizes
//! - Shared column permutation over train/valid matrices
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lab_runner::dataset::{permute_cols_all, BarsData};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Benchmark bars generation
fn bench_bars_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("bars_generation");

    for d in [5, 10, 28].iter() {
        let bars = BarsData::new(1_000, *d);
        group.bench_with_input(BenchmarkId::from_parameter(d), d, |b, _| {
            let mut rng = StdRng::seed_from_u64(42);
            b.iter(|| black_box(bars.generate(&mut rng).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark permuting MNIST-sized matrices with one shared permutation
fn bench_shared_permutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("shared_permutation");

    for rows in [1_000, 10_000].iter() {
        let train = Array2::<f32>::ones((*rows, 784));
        let valid = Array2::<f32>::zeros((*rows / 5, 784));

        group.bench_with_input(BenchmarkId::from_parameter(rows), rows, |b, _| {
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let out = permute_cols_all(&[train.view(), valid.view()], None, &mut rng).unwrap();
                black_box(out);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bars_generation, bench_shared_permutation);
criterion_main!(benches);
