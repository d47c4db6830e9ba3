use log::{debug, trace, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::{
    convert, total_sum_of_squares, within_sum_of_squares, Center, Clusterer, DataSource, Indices,
    Value,
};
use crate::error::{Error, Result};
use crate::spatial::squared_distance;

/// Configuration options for k-means clustering.
#[derive(Debug, Clone)]
pub struct KMeansConfig {
    /// Maximum number of Lloyd rounds per call to `cluster`.
    pub max_iterations: usize,
    /// Seed for the random generator used when choosing initial centers.
    /// `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl KMeansConfig {
    /// Create a new config with default values for max_iterations (300) and no fixed seed.
    pub fn new() -> Self {
        Self {
            max_iterations: 300,
            seed: None,
        }
    }

    /// Customize the maximum number of iterations.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Use a fixed seed so that seeding is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Seeded,
    Clustered,
}

/// Lloyd's k-means over ℝⁿ data.
///
/// The engine owns a copy of the data. [`KMeans::seed`] picks initial centers
/// by D²-weighted sampling, then [`Clusterer::cluster`] alternates assignment
/// and recentering until no point changes cluster.
///
/// # Example
///
/// ```
/// use clustering::cluster::{Clusterer, KMeans, KMeansConfig};
///
/// let data = vec![[0.0, 0.0], [0.5, 0.0], [10.0, 10.0], [10.0, 10.5]];
/// let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(1)).unwrap();
/// km.seed(2).unwrap();
/// km.cluster().unwrap();
///
/// let within: f64 = km.within().iter().sum();
/// assert!((within - 0.25).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct KMeans {
    values: Vec<Value>,
    centers: Vec<Center>,
    config: KMeansConfig,
    rng: ChaCha20Rng,
    state: State,
}

impl KMeans {
    /// Copy `data` into a new engine.
    ///
    /// Fails if the data is empty, inconsistent in dimension or non-finite, or
    /// if `config.max_iterations` is zero.
    pub fn new(data: &dyn DataSource, config: KMeansConfig) -> Result<Self> {
        if config.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "max_iterations must be at least 1".into(),
            ));
        }
        let values = convert(data)?;
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };

        Ok(Self {
            values,
            centers: Vec::new(),
            config,
            rng,
            state: State::Uninitialized,
        })
    }

    /// Choose `k` initial centers.
    ///
    /// The first center is a data point drawn uniformly. Each further center is
    /// a data point drawn with probability proportional to its squared distance
    /// from the nearest center chosen so far. Any previous clustering is discarded.
    pub fn seed(&mut self, k: usize) -> Result<()> {
        let n = self.values.len();
        if k == 0 || k > n {
            return Err(Error::InvalidArgument(format!(
                "invalid number of clusters k = {} for dataset of size {}",
                k, n
            )));
        }

        let first = self.rng.gen_range(0..n);
        let mut chosen = vec![first];
        // Squared distance of every point to its nearest chosen center.
        let mut d: Vec<f64> = self
            .values
            .iter()
            .map(|v| squared_distance(&v.coords, &self.values[first].coords))
            .collect();

        while chosen.len() < k {
            let sum: f64 = d.iter().sum();
            if !(sum > 0.0) {
                return Err(Error::DegenerateGeometry(format!(
                    "cannot seed k = {}: only {} distinct positions in the data",
                    k,
                    chosen.len()
                )));
            }
            let target = self.rng.gen::<f64>() * sum;
            let next = sample_index(&d, target).ok_or_else(|| {
                Error::DegenerateGeometry("no point left to choose as a center".into())
            })?;
            chosen.push(next);

            let center = &self.values[next].coords;
            for (dj, v) in d.iter_mut().zip(self.values.iter()) {
                let dist = squared_distance(&v.coords, center);
                if dist < *dj {
                    *dj = dist;
                }
            }
        }

        self.centers = chosen
            .iter()
            .map(|&i| Center {
                coords: self.values[i].coords.clone(),
                count: 0,
            })
            .collect();
        for v in self.values.iter_mut() {
            v.cluster = None;
        }
        self.state = State::Seeded;
        debug!("seeded {} centers from points {:?}", k, chosen);
        Ok(())
    }

    /// Run a single Lloyd round: recompute every center as the mean of its
    /// members, then reassign each point to its nearest center. A freshly
    /// seeded engine first assigns points to the seeds.
    ///
    /// Returns the number of points whose cluster changed.
    pub fn iterate(&mut self) -> Result<usize> {
        match self.state {
            State::Uninitialized => return Err(Error::NotSeeded),
            State::Seeded => {
                self.assign();
                self.state = State::Clustered;
            }
            State::Clustered => {}
        }
        self.recenter()?;
        Ok(self.assign())
    }

    /// The current centers, indexed by cluster id. Empty before seeding.
    pub fn centers(&self) -> &[Center] {
        &self.centers
    }

    /// The data points, in their original order, tagged with their cluster.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Assign every point to its nearest center and refresh the member counts.
    fn assign(&mut self) -> usize {
        let mut changed = 0;
        for v in self.values.iter_mut() {
            let (c, _) = nearest(&self.centers, &v.coords);
            if v.cluster != Some(c) {
                v.cluster = Some(c);
                changed += 1;
            }
        }

        for center in self.centers.iter_mut() {
            center.count = 0;
        }
        for v in &self.values {
            if let Some(c) = v.cluster {
                self.centers[c].count += 1;
            }
        }
        changed
    }

    /// Move every center to the mean of its members. Nothing is updated if any
    /// center has lost all of its members.
    fn recenter(&mut self) -> Result<()> {
        let dims = self.values[0].coords.len();
        let k = self.centers.len();
        let mut sums = vec![vec![0.0; dims]; k];
        let mut counts = vec![0_usize; k];
        for v in &self.values {
            if let Some(c) = v.cluster {
                counts[c] += 1;
                for (s, x) in sums[c].iter_mut().zip(v.coords.iter()) {
                    *s += x;
                }
            }
        }

        if let Some(empty) = counts.iter().position(|&count| count == 0) {
            return Err(Error::DegenerateGeometry(format!(
                "center {} has no members",
                empty
            )));
        }

        for ((center, sum), count) in self.centers.iter_mut().zip(sums).zip(counts) {
            let inv = 1.0 / count as f64;
            center.coords = sum.into_iter().map(|s| s * inv).collect();
            center.count = count;
        }
        Ok(())
    }
}

impl Clusterer for KMeans {
    /// Run Lloyd's algorithm from the current centers until no point changes
    /// cluster. If `max_iterations` rounds pass without that happening, the
    /// last assignment is kept and a non-fatal `NonConvergence` is returned.
    fn cluster(&mut self) -> Result<()> {
        if self.state == State::Uninitialized {
            return Err(Error::NotSeeded);
        }
        self.assign();
        self.state = State::Clustered;

        let mut changed = 0;
        for iteration in 1..=self.config.max_iterations {
            self.recenter()?;
            changed = self.assign();
            trace!("k-means iteration {}: {} points reassigned", iteration, changed);
            if changed == 0 {
                debug!(
                    "k-means converged after {} iterations with k = {}",
                    iteration,
                    self.centers.len()
                );
                return Ok(());
            }
        }

        warn!(
            "k-means did not converge within {} iterations ({} points still moving)",
            self.config.max_iterations, changed
        );
        Err(Error::NonConvergence {
            iterations: self.config.max_iterations,
            delta: changed as f64,
        })
    }

    fn clusters(&self) -> Vec<Indices> {
        if self.state != State::Clustered {
            return Vec::new();
        }
        let mut clusters: Vec<Indices> = self
            .centers
            .iter()
            .map(|c| Vec::with_capacity(c.count))
            .collect();
        for (i, v) in self.values.iter().enumerate() {
            if let Some(c) = v.cluster {
                clusters[c].push(i);
            }
        }
        clusters
    }

    fn within(&self) -> Vec<f64> {
        if self.state != State::Clustered {
            return Vec::new();
        }
        let centers: Vec<&[f64]> = self.centers.iter().map(|c| c.coords()).collect();
        within_sum_of_squares(&self.values, &centers)
    }

    fn total(&self) -> f64 {
        total_sum_of_squares(&self.values)
    }
}

/// Index of the center nearest to `point` and the squared distance to it.
/// Ties go to the lowest index.
fn nearest(centers: &[Center], point: &[f64]) -> (usize, f64) {
    let mut best = 0;
    let mut min = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = squared_distance(point, &center.coords);
        if d < min {
            min = d;
            best = i;
        }
    }
    (best, min)
}

/// Invert the cumulative sum of `weights` at `target`: the first index whose
/// running total exceeds it. Zero weights are never selected.
fn sample_index(weights: &[f64], target: f64) -> Option<usize> {
    let mut acc = 0.0;
    weights
        .iter()
        .position(|&w| {
            acc += w;
            acc > target
        })
        .or_else(|| weights.iter().rposition(|&w| w > 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 2.0],
            vec![1.5, 1.8],
            vec![5.0, 8.0],
            vec![8.0, 8.0],
            vec![1.0, 0.6],
            vec![9.0, 11.0],
        ]
    }

    #[test]
    fn test_empty_data() {
        let data: Vec<Vec<f64>> = vec![];
        assert!(matches!(
            KMeans::new(&data, KMeansConfig::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mismatched_dimensions() {
        let data = vec![vec![1.0, 2.0], vec![2.0]];
        assert!(matches!(
            KMeans::new(&data, KMeansConfig::new()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_invalid_k() {
        let data = vec![vec![1.0, 2.0], vec![2.0, 3.0]];
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(1)).unwrap();
        assert!(matches!(km.seed(0), Err(Error::InvalidArgument(_))));
        assert!(matches!(km.seed(3), Err(Error::InvalidArgument(_))));
        // Rejected calls leave the engine unseeded.
        assert!(km.centers().is_empty());
        assert_eq!(km.cluster(), Err(Error::NotSeeded));
    }

    #[test]
    fn test_cluster_before_seed() {
        let mut km = KMeans::new(&grid(), KMeansConfig::new()).unwrap();
        assert_eq!(km.cluster(), Err(Error::NotSeeded));
        assert_eq!(km.iterate(), Err(Error::NotSeeded));
        assert!(km.within().is_empty());
        assert!(km.clusters().is_empty());
    }

    #[test]
    fn test_basic_run() {
        let data = grid();
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(3)).unwrap();
        km.seed(2).unwrap();
        km.cluster().unwrap();

        assert_eq!(km.values().len(), data.len());
        assert_eq!(km.centers().len(), 2);
        let counted: usize = km.centers().iter().map(|c| c.count()).sum();
        assert_eq!(counted, data.len());
        for v in km.values() {
            let c = v.cluster().unwrap();
            let (nearest_c, _) = nearest(km.centers(), v.coords());
            assert_eq!(c, nearest_c);
        }
    }

    #[test]
    fn test_seed_is_reproducible() {
        let data = grid();
        let mut a = KMeans::new(&data, KMeansConfig::new().with_seed(99)).unwrap();
        let mut b = KMeans::new(&data, KMeansConfig::new().with_seed(99)).unwrap();
        for k in 1..=data.len() {
            a.seed(k).unwrap();
            b.seed(k).unwrap();
            assert_eq!(a.centers(), b.centers());
        }
    }

    #[test]
    fn test_seeds_are_distinct_data_points() {
        let data = grid();
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(5)).unwrap();
        km.seed(data.len()).unwrap();
        for (i, a) in km.centers().iter().enumerate() {
            assert!(data.iter().any(|p| p.as_slice() == a.coords()));
            for b in &km.centers()[i + 1..] {
                assert_ne!(a.coords(), b.coords());
            }
        }
    }

    #[test]
    fn test_k_equals_n_gives_zero_within() {
        let data = grid();
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(8)).unwrap();
        km.seed(data.len()).unwrap();
        km.cluster().unwrap();
        assert_eq!(km.within(), vec![0.0; data.len()]);
        assert!(km.centers().iter().all(|c| c.count() == 1));
    }

    #[test]
    fn test_single_cluster_within_equals_total() {
        let data = grid();
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(2)).unwrap();
        km.seed(1).unwrap();
        km.cluster().unwrap();
        let within = km.within();
        assert_eq!(within.len(), 1);
        assert_relative_eq!(within[0], km.total(), epsilon = 1e-9);
    }

    #[test]
    fn test_too_few_distinct_points_to_seed() {
        let data = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(4)).unwrap();
        assert!(matches!(km.seed(3), Err(Error::DegenerateGeometry(_))));
        assert!(km.seed(2).is_ok());
    }

    #[test]
    fn test_iteration_cap_is_not_fatal() {
        // Two interleaved clusters whose optimum is several rounds away from
        // a seeding at two neighbouring points.
        let data: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, 0.0]).collect();
        let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(0).with_max_iterations(1))
            .unwrap();
        km.seed(2).unwrap();
        km.centers = vec![
            Center {
                coords: vec![0.0, 0.0],
                count: 0,
            },
            Center {
                coords: vec![1.0, 0.0],
                count: 0,
            },
        ];
        match km.cluster() {
            Err(err @ Error::NonConvergence { .. }) => assert!(!err.is_fatal()),
            other => panic!("expected NonConvergence, got {:?}", other),
        }
        // Results are still populated.
        assert_eq!(km.within().len(), 2);
        let assigned: usize = km.clusters().iter().map(|c| c.len()).sum();
        assert_eq!(assigned, data.len());
    }

    #[test]
    fn test_sample_index_skips_zero_weights() {
        let weights = [0.0, 2.0, 0.0, 1.0];
        assert_eq!(sample_index(&weights, 0.0), Some(1));
        assert_eq!(sample_index(&weights, 1.99), Some(1));
        assert_eq!(sample_index(&weights, 2.0), Some(3));
        assert_eq!(sample_index(&weights, 2.5), Some(3));
        assert_eq!(sample_index(&[0.0, 0.0], 0.0), None);
    }

    #[test]
    fn test_nearest_prefers_lowest_index_on_ties() {
        let centers = vec![
            Center {
                coords: vec![-1.0],
                count: 0,
            },
            Center {
                coords: vec![1.0],
                count: 0,
            },
        ];
        assert_eq!(nearest(&centers, &[0.0]), (0, 1.0));
    }
}
