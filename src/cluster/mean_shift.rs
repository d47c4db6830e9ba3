use log::{debug, trace, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use super::{
    convert, total_sum_of_squares, within_sum_of_squares, Clusterer, DataSource, Indices,
    MergedCenter, Value,
};
use crate::error::{Error, Result};
use crate::spatial::KdTree;

pub mod kernel;

use kernel::Kernel;

/// Configuration options for mean-shift clustering.
#[derive(Debug, Clone)]
pub struct MeanShiftConfig {
    /// Shifting stops once the summed squared displacement of all modes in one
    /// iteration is at most this.
    pub tolerance: f64,
    /// Maximum number of shift iterations per call to `cluster`.
    pub max_iterations: usize,
    /// Seed for the random generator used to build the kd-trees.
    /// `None` seeds from the operating system.
    pub seed: Option<u64>,
}

impl MeanShiftConfig {
    pub fn new(tolerance: f64, max_iterations: usize) -> Self {
        Self {
            tolerance,
            max_iterations,
            seed: None,
        }
    }

    /// Use a fixed seed so that index construction is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Outcome of the most recent shifting phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    /// No clustering has completed yet.
    Initialized,
    /// The modes settled within tolerance after `iterations` shifts.
    Converged { iterations: usize },
    /// The iteration cap was hit; `delta` is the last summed displacement.
    MaxIterExceeded { iterations: usize, delta: f64 },
}

/// Mean-shift clustering of ℝⁿ data.
///
/// Every data point starts a mode that the kernel repeatedly moves towards a
/// local density maximum. Once the modes settle (or the iteration cap is hit)
/// they are collated: modes lying within one bandwidth of each other are merged
/// and each original point joins exactly one merged center.
///
/// # Example
///
/// ```
/// use clustering::cluster::{Clusterer, MeanShift, MeanShiftConfig, Uniform};
///
/// let data = vec![[0.0, 0.0], [0.4, 0.2], [0.1, 0.5], [9.0, 9.0], [9.3, 8.8]];
/// let config = MeanShiftConfig::new(1e-6, 100).with_seed(1);
/// let mut ms = MeanShift::new(&data, Uniform::new(2.0), config).unwrap();
/// ms.cluster().unwrap();
///
/// let mut clusters = ms.clusters();
/// for c in clusters.iter_mut() {
///     c.sort();
/// }
/// clusters.sort();
/// assert_eq!(clusters, vec![vec![0, 1, 2], vec![3, 4]]);
/// ```
#[derive(Debug, Clone)]
pub struct MeanShift<K: Kernel> {
    kernel: K,
    config: MeanShiftConfig,
    values: Vec<Value>,
    centers: Vec<MergedCenter>,
    rng: ChaCha20Rng,
    status: Status,
}

impl<K: Kernel> MeanShift<K> {
    /// Copy `data` into a new engine and initialise `kernel` over it.
    ///
    /// The engine keeps its own validated copy of the points because it tags
    /// them with cluster ids. The kernel builds a second one through `init`,
    /// since a kernel can be used on its own over any `DataSource`.
    ///
    /// Fails if the data or kernel parameters are invalid, the tolerance is
    /// negative or non-finite, or `max_iterations` is zero.
    pub fn new(data: &dyn DataSource, mut kernel: K, config: MeanShiftConfig) -> Result<Self> {
        if !(config.tolerance >= 0.0 && config.tolerance.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "tolerance must be non-negative, got {}",
                config.tolerance
            )));
        }
        if config.max_iterations == 0 {
            return Err(Error::InvalidArgument(
                "max_iterations must be at least 1".into(),
            ));
        }

        let values = convert(data)?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        kernel.init(data, &mut rng)?;

        Ok(Self {
            kernel,
            config,
            values,
            centers: Vec::new(),
            rng,
            status: Status::Initialized,
        })
    }

    /// The merged centers of the last run, indexed by cluster id.
    pub fn centers(&self) -> &[MergedCenter] {
        &self.centers
    }

    /// The data points, in their original order, tagged with their cluster.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Shift until the modes settle or the iteration cap is reached.
    fn shift(&mut self) -> Result<Status> {
        let mut delta = f64::INFINITY;
        for iteration in 1..=self.config.max_iterations {
            delta = self.kernel.shift()?;
            trace!("mean-shift iteration {}: delta = {}", iteration, delta);
            if delta <= self.config.tolerance {
                return Ok(Status::Converged {
                    iterations: iteration,
                });
            }
        }
        Ok(Status::MaxIterExceeded {
            iterations: self.config.max_iterations,
            delta,
        })
    }

    /// Merge the modes into clusters.
    ///
    /// Modes are visited in index order. Each mode not yet claimed gathers the
    /// modes within one bandwidth of it, averages their positions into a
    /// candidate center and claims every gathered mode that is still free.
    /// A candidate landing exactly on an existing center adds its members to
    /// that center instead.
    fn collate(&mut self) -> Result<()> {
        let modes = self.kernel.modes();
        let n = modes.len();
        let dims = self.values[0].coords().len();
        let radius = self.kernel.bandwidth();
        let radius_sq = radius * radius;

        let tree = KdTree::build(dims, modes.iter().cloned().zip(0..), &mut self.rng)?;
        let mut positions = KdTree::new(dims);
        let mut merged: Vec<MergedCenter> = Vec::new();
        let mut claimed = vec![false; n];

        for i in 0..n {
            if claimed[i] {
                continue;
            }
            let hits = tree.nearest_within_radius(&modes[i], radius_sq, n);
            if hits.is_empty() {
                return Err(Error::DegenerateGeometry(format!(
                    "mode {} found no modes within the bandwidth",
                    i
                )));
            }

            let inv = 1.0 / hits.len() as f64;
            let mut coords = vec![0.0; dims];
            let mut members = Indices::new();
            for hit in &hits {
                for (c, m) in coords.iter_mut().zip(modes[hit.id].iter()) {
                    *c += m * inv;
                }
                if !claimed[hit.id] {
                    claimed[hit.id] = true;
                    members.push(hit.id);
                }
            }
            if !claimed[i] {
                return Err(Error::DegenerateGeometry(format!(
                    "mode {} was not found at its own position",
                    i
                )));
            }

            match positions.nearest(&coords) {
                Some(existing) if existing.dist_sq == 0.0 => {
                    merged[existing.id].members.extend(members);
                }
                _ => {
                    positions.insert(coords.clone(), merged.len())?;
                    merged.push(MergedCenter { coords, members });
                }
            }
        }

        merged.retain(|c| !c.members.is_empty());
        for (ci, center) in merged.iter().enumerate() {
            for &m in &center.members {
                self.values[m].cluster = Some(ci);
            }
        }
        debug!("collated {} modes into {} clusters", n, merged.len());
        self.centers = merged;
        Ok(())
    }
}

impl<K: Kernel> Clusterer for MeanShift<K> {
    /// Shift the modes and collate them into clusters.
    ///
    /// Collation runs even when the iteration cap is hit; in that case the
    /// results are populated and a non-fatal `NonConvergence` is returned.
    fn cluster(&mut self) -> Result<()> {
        self.centers.clear();
        self.status = Status::Initialized;
        for v in self.values.iter_mut() {
            v.cluster = None;
        }

        let status = self.shift()?;
        self.collate()?;
        self.status = status;

        match status {
            Status::MaxIterExceeded { iterations, delta } => {
                warn!(
                    "mean-shift exceeded {} iterations, last delta = {}",
                    iterations, delta
                );
                Err(Error::NonConvergence { iterations, delta })
            }
            _ => {
                debug!("mean-shift finished: {:?}", status);
                Ok(())
            }
        }
    }

    fn clusters(&self) -> Vec<Indices> {
        self.centers.iter().map(|c| c.members.clone()).collect()
    }

    fn within(&self) -> Vec<f64> {
        let centers: Vec<&[f64]> = self.centers.iter().map(|c| c.coords()).collect();
        within_sum_of_squares(&self.values, &centers)
    }

    fn total(&self) -> f64 {
        total_sum_of_squares(&self.values)
    }
}
