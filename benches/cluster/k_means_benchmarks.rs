use clustering::{Clusterer, KMeans, KMeansConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

/// Points scattered around `blobs` random centers in a 10000 x 10000 square.
fn blob_data(n: usize, blobs: usize, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let centers: Vec<([f64; 2], Normal<f64>)> = (0..blobs)
        .map(|_| {
            let c = [rng.gen_range(0.0..10000.0), rng.gen_range(0.0..10000.0)];
            let spread = Normal::new(0.0, rng.gen_range(1.0..200.0)).unwrap();
            (c, spread)
        })
        .collect();
    (0..n)
        .map(|i| {
            let (c, spread) = &centers[i % blobs];
            [c[0] + spread.sample(&mut rng), c[1] + spread.sample(&mut rng)]
        })
        .collect()
}

fn benchmark_kmeans_varying_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_samples");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(2));

    for n_samples in [1_000, 5_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*n_samples as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(n_samples),
            n_samples,
            |b, &n_samples| {
                let data = blob_data(n_samples, 20, 42);
                b.iter(|| {
                    let mut km = KMeans::new(black_box(&data), KMeansConfig::new().with_seed(1))
                        .unwrap();
                    km.seed(20).unwrap();
                    let _ = km.cluster();
                    km
                });
            },
        );
    }
    group.finish();
}

fn benchmark_kmeans_seeding(c: &mut Criterion) {
    let mut group = c.benchmark_group("kmeans_seed");
    group.sample_size(10);

    let data = blob_data(10_000, 20, 7);
    for k in [5, 20, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |b, &k| {
            let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(3)).unwrap();
            b.iter(|| km.seed(black_box(k)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_kmeans_varying_samples,
    benchmark_kmeans_seeding
);
criterion_main!(benches);
