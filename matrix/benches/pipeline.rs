use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hotspot_matrix::reduce::{aggregate, aggregate_par, filter, sample};
use hotspot_matrix::stats::distribution::analyze;
use hotspot_matrix::{
    ColorScheme, MutationRecord, PipelineInputs, PipelineOptions, ViewTiers, Viewport, run,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashSet;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

/// Synthetic dataset with a long-tailed frequency distribution
fn generate_records(num_records: usize, num_genes: usize, num_cancer_types: usize) -> Arc<[MutationRecord]> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..num_records)
        .map(|i| {
            // most records are rare, a few are hotspots
            let frequency = if rng.random::<f64>() < 0.1 {
                0.01 + rng.random::<f64>() * 0.6
            } else {
                rng.random::<f64>().powi(4) * 0.01
            };
            MutationRecord::new(
                format!("GENE{}", rng.random_range(0..num_genes)),
                i as i64 % 1200,
                format!("CANCER{}", rng.random_range(0..num_cancer_types)),
                rng.random_range(1..200),
                frequency,
            )
        })
        .collect()
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let records = generate_records(50_000, 400, 32);
    let tiers = ViewTiers::default();

    for tier in &tiers {
        let inputs = PipelineInputs::new(Arc::clone(&records), tier.clone(), Viewport::new(1600.0, 900.0));
        let options = PipelineOptions::new()
            .color_scheme(ColorScheme::Heat)
            .build()
            .unwrap();

        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("run", &tier.name), &(), |b, _| {
            b.iter(|| {
                let output = run(black_box(&inputs), black_box(&options)).unwrap();
                black_box(output);
            })
        });
    }

    group.finish();
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(3));

    let records = generate_records(50_000, 400, 32);
    let tiers = ViewTiers::default();
    let detailed = tiers.get("detailed").unwrap();
    let hidden = FxHashSet::default();
    let frequencies: Vec<f64> = records.iter().map(|r| r.effective_frequency).collect();

    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("filter_detailed", |b| {
        b.iter(|| black_box(filter(black_box(&records), detailed, &hidden, &hidden)))
    });
    group.bench_function("sample_5000", |b| {
        b.iter(|| black_box(sample(black_box(&records), 5000)))
    });
    group.bench_function("aggregate", |b| {
        b.iter(|| black_box(aggregate(black_box(&records))))
    });
    group.bench_function("aggregate_par", |b| {
        b.iter(|| black_box(aggregate_par(black_box(&records))))
    });
    group.bench_function("analyze", |b| {
        b.iter(|| black_box(analyze(black_box(&frequencies)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_pipeline, bench_stages);
criterion_main!(benches);
