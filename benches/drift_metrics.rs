use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kolosal_drift::baseline::BaselineSnapshot;
use kolosal_drift::drift::{
    compute_explanation_stability, compute_histogram, compute_psi, Histogram, DEFAULT_BINS, DEFAULT_EPSILON,
    DEFAULT_STABILITY_THRESHOLD,
};
use kolosal_drift::storage::{EvaluationRecord, Record};
use kolosal_drift::worker::compute_drift;
use ndarray::Array1;
use rand::prelude::*;

fn sample(rng: &mut StdRng, n: usize, shift: f64) -> Vec<f64> {
    (0..n).map(|_| rng.gen::<f64>() * 10.0 + shift).collect()
}

fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");
    let mut rng = StdRng::seed_from_u64(1);

    for n in [1_000, 10_000, 100_000].iter() {
        let values = sample(&mut rng, *n, 0.0);
        group.bench_with_input(BenchmarkId::new("compute", n), &values, |b, values| {
            b.iter(|| compute_histogram(black_box(values), DEFAULT_BINS, None, None).unwrap())
        });
    }

    group.finish();
}

fn bench_psi(c: &mut Criterion) {
    let mut group = c.benchmark_group("psi");
    let mut rng = StdRng::seed_from_u64(2);

    for n in [1_000, 10_000].iter() {
        let baseline = compute_histogram(&sample(&mut rng, *n, 0.0), DEFAULT_BINS, None, None).unwrap();
        let current = sample(&mut rng, *n, 1.5);
        group.bench_with_input(BenchmarkId::new("bin_and_compare", n), &current, |b, current| {
            b.iter(|| {
                let hist = Histogram::from_edges(black_box(current), &baseline.edges).unwrap();
                compute_psi(&baseline.weights(), &hist.weights(), DEFAULT_EPSILON).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_stability(c: &mut Criterion) {
    let mut group = c.benchmark_group("explanation_stability");
    let mut rng = StdRng::seed_from_u64(3);

    let vectors = |rng: &mut StdRng| -> Vec<Array1<f64>> {
        (0..100).map(|_| Array1::from(sample(rng, 32, -5.0))).collect()
    };
    let baseline = vectors(&mut rng);
    let current = vectors(&mut rng);

    group.bench_function("100x100", |b| {
        b.iter(|| compute_explanation_stability(black_box(&baseline), black_box(&current), DEFAULT_STABILITY_THRESHOLD))
    });

    group.finish();
}

fn bench_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift_window");
    group.sample_size(20);
    let mut rng = StdRng::seed_from_u64(4);

    let features: Vec<String> = (0..20).map(|i| format!("f{}", i)).collect();
    let record = |rng: &mut StdRng, shift: f64| -> Record {
        features
            .iter()
            .map(|name| (name.clone(), serde_json::json!(rng.gen::<f64>() + shift)))
            .collect()
    };

    let reference: Vec<Record> = (0..5_000).map(|_| record(&mut rng, 0.0)).collect();
    let baseline = BaselineSnapshot::build("bench", &reference, &features, "risk_score", &[]).unwrap();

    for n in [1_000, 10_000].iter() {
        let now = Utc::now();
        let window: Vec<EvaluationRecord> = (0..*n)
            .map(|_| EvaluationRecord::new(now, record(&mut rng, 0.2), Some(rng.gen())))
            .collect();
        group.bench_with_input(BenchmarkId::new("compute", n), &window, |b, window| {
            b.iter(|| compute_drift(&baseline, black_box(window), now, now, 10))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_histogram, bench_psi, bench_stability, bench_window);
criterion_main!(benches);
