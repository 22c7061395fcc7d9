//! Table file benchmarks
//!
//! Benchmarks for the results/checkpoint storage path:
//! - Metrics log flush (whole-file rewrite)
//! - Table file loading with row-order verification
//! - Checkpoint replay into a fresh metrics log
//!
//! Toyota Way: Measure before optimizing (Genchi Genbutsu)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lab_runner::metrics::{Backend, MetricsLog, Observation};
use lab_runner::storage::TableFile;

/// Create a metrics log with `epochs` rows of a scalar loss and a 64-wide weight vector
#[allow(clippy::cast_precision_loss)]
fn create_test_log(epochs: usize) -> MetricsLog {
    let mut log = MetricsLog::new();
    for epoch in 0..epochs {
        log.append("loss", 1.0 / (epoch as f64 + 1.0)).unwrap();
        let weights: Vec<f64> = (0..64).map(|i| (epoch * 64 + i) as f64 * 1e-3).collect();
        log.append("model.w", weights).unwrap();
    }
    log
}

/// Benchmark flushing a metrics log to a table file
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("metrics_flush");
    let tmp = tempfile::tempdir().unwrap();

    for epochs in [10, 100, 1_000].iter() {
        let mut log = create_test_log(*epochs);
        log.set_handler("*", Backend::TableFile(tmp.path().join(format!("flush_{epochs}.parquet"))));

        group.bench_with_input(BenchmarkId::from_parameter(epochs), epochs, |b, _| {
            b.iter(|| log.flush().unwrap());
        });
    }

    group.finish();
}

/// Benchmark loading a table file
fn bench_open(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_file_open");
    let tmp = tempfile::tempdir().unwrap();

    for epochs in [10, 100, 1_000].iter() {
        let path = tmp.path().join(format!("open_{epochs}.parquet"));
        let mut log = create_test_log(*epochs);
        log.set_handler("*", Backend::TableFile(path.clone()));
        log.flush().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(epochs), epochs, |b, _| {
            b.iter(|| {
                let table_file = TableFile::open(&path).unwrap();
                black_box(table_file);
            });
        });
    }

    group.finish();
}

/// Benchmark replaying a loaded checkpoint into a fresh metrics log
fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_replay");

    for epochs in [100, 1_000].iter() {
        let mut table_file = TableFile::new();
        for epoch in 0..*epochs {
            table_file.append("loss", Observation::scalar(f64::from(epoch)));
        }

        group.bench_with_input(BenchmarkId::from_parameter(epochs), epochs, |b, _| {
            b.iter(|| {
                let mut log = MetricsLog::new();
                for (name, rows) in table_file.iter() {
                    for row in rows {
                        log.append(name, row.clone()).unwrap();
                    }
                }
                black_box(log);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_flush, bench_open, bench_replay);
criterion_main!(benches);
