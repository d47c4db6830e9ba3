use clustering::{Clusterer, KdTree, MeanShift, MeanShiftConfig, TruncatedGaussian, Uniform};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, Normal};
use std::time::Duration;

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

fn benchmark_kernels(c: &mut Criterion) {
    let mut group = c.benchmark_group("mean_shift");
    group.sample_size(10);
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_secs(3));

    let data = blob_data(1_000, 20, 42);
    let config = MeanShiftConfig::new(20.0, 5).with_seed(1);

    group.bench_function("truncated_gaussian", |b| {
        b.iter(|| {
            let mut ms =
                MeanShift::new(black_box(&data), TruncatedGaussian::new(800.0, 1.0), config.clone())
                    .unwrap();
            let _ = ms.cluster();
            ms
        })
    });
    group.bench_function("uniform", |b| {
        b.iter(|| {
            let mut ms =
                MeanShift::new(black_box(&data), Uniform::new(800.0), config.clone()).unwrap();
            let _ = ms.cluster();
            ms
        })
    });
    group.finish();
}

fn benchmark_radius_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("kd_tree_radius");
    let mut rng = ChaCha20Rng::seed_from_u64(9);

    for n in [1_000, 10_000, 100_000].iter() {
        let points: Vec<(Vec<f64>, usize)> = blob_data(*n, 20, 5)
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p.to_vec(), i))
            .collect();
        let tree = KdTree::build(2, points, &mut rng).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &tree, |b, tree| {
            b.iter(|| tree.nearest_within_radius(black_box(&[5000.0, 5000.0]), 250_000.0, *n))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_kernels, benchmark_radius_query);
criterion_main!(benches);
