//! Clustering of points in ℝⁿ.
//!
//! This module provides:
//! - Lloyd's k-means with D²-weighted seeding ([`KMeans`])
//! - Mean-shift with pluggable kernels and kd-tree neighbour queries ([`MeanShift`])
//!
//! Input data is read through the [`DataSource`] capability; a source may also
//! expose per-point weights through [`Weighted`]. Both engines copy the data
//! once at construction and report results through [`Clusterer`].
//!
//! # Examples
//!
//! ```rust
//! use clustering::cluster::{Clusterer, KMeans, KMeansConfig};
//!
//! let data = vec![
//!     vec![1.0, 2.0],
//!     vec![1.5, 1.8],
//!     vec![8.0, 8.0],
//!     vec![8.5, 8.2],
//! ];
//!
//! let mut km = KMeans::new(&data, KMeansConfig::new().with_seed(42)).unwrap();
//! km.seed(2).unwrap();
//! km.cluster().unwrap();
//!
//! let mut clusters = km.clusters();
//! clusters.sort();
//! assert_eq!(clusters, vec![vec![0, 1], vec![2, 3]]);
//! ```

use crate::error::{Error, Result};
use crate::spatial::squared_distance;

pub mod k_means;
pub mod mean_shift;

pub use k_means::{KMeans, KMeansConfig};
pub use mean_shift::{MeanShift, MeanShiftConfig, Status};
pub use mean_shift::kernel::{Kernel, TruncatedGaussian, Uniform};

/// Indices into the original data, e.g. the members of one cluster.
pub type Indices = Vec<usize>;

/// A collection of points that can be clustered. Points are enumerated by an
/// integer index and all share the same dimension.
pub trait DataSource {
    /// Number of points.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates of point `i`, for `0 <= i < len()`.
    fn coordinates(&self, i: usize) -> Vec<f64>;

    /// Per-point weights, if the source has them. Without weights every point
    /// weighs 1.
    fn weights(&self) -> Option<&dyn Weighted> {
        None
    }
}

/// Weight capability of a [`DataSource`].
pub trait Weighted {
    /// Weight of point `i`. Must be positive.
    fn weight(&self, i: usize) -> f64;
}

impl DataSource for [Vec<f64>] {
    fn len(&self) -> usize {
        <[Vec<f64>]>::len(self)
    }

    fn coordinates(&self, i: usize) -> Vec<f64> {
        self[i].clone()
    }
}

impl DataSource for Vec<Vec<f64>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn coordinates(&self, i: usize) -> Vec<f64> {
        self[i].clone()
    }
}

impl<const N: usize> DataSource for [[f64; N]] {
    fn len(&self) -> usize {
        <[[f64; N]]>::len(self)
    }

    fn coordinates(&self, i: usize) -> Vec<f64> {
        self[i].to_vec()
    }
}

impl<const N: usize> DataSource for Vec<[f64; N]> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn coordinates(&self, i: usize) -> Vec<f64> {
        self[i].to_vec()
    }
}

/// Points paired with explicit weights.
#[derive(Debug, Clone)]
pub struct WeightedPoints {
    points: Vec<Vec<f64>>,
    weights: Vec<f64>,
}

impl WeightedPoints {
    /// Fails if the two vectors differ in length.
    pub fn new(points: Vec<Vec<f64>>, weights: Vec<f64>) -> Result<Self> {
        if points.len() != weights.len() {
            return Err(Error::InvalidArgument(format!(
                "{} points but {} weights",
                points.len(),
                weights.len()
            )));
        }
        Ok(Self { points, weights })
    }
}

impl DataSource for WeightedPoints {
    fn len(&self) -> usize {
        self.points.len()
    }

    fn coordinates(&self, i: usize) -> Vec<f64> {
        self.points[i].clone()
    }

    fn weights(&self) -> Option<&dyn Weighted> {
        Some(self)
    }
}

impl Weighted for WeightedPoints {
    fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }
}

/// A data point as held by a clustering engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    coords: Vec<f64>,
    weight: f64,
    cluster: Option<usize>,
}

impl Value {
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Index of the cluster this point belongs to, `None` until it has been assigned.
    pub fn cluster(&self) -> Option<usize> {
        self.cluster
    }
}

/// A k-means cluster center.
#[derive(Debug, Clone, PartialEq)]
pub struct Center {
    coords: Vec<f64>,
    count: usize,
}

impl Center {
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Number of points assigned to this center.
    pub fn count(&self) -> usize {
        self.count
    }
}

/// A mean-shift cluster: the merged position of converged modes and the
/// original points that were collated into it.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCenter {
    coords: Vec<f64>,
    members: Indices,
}

impl MergedCenter {
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    pub fn count(&self) -> usize {
        self.members.len()
    }
}

/// Common interface of the clustering engines.
pub trait Clusterer {
    /// Cluster the data.
    fn cluster(&mut self) -> Result<()>;

    /// Indices of the original data grouped by cluster, in cluster order.
    /// Empty before clustering.
    fn clusters(&self) -> Vec<Indices>;

    /// Sum of squared distances of each cluster's members to its center.
    /// Empty before clustering.
    fn within(&self) -> Vec<f64>;

    /// Sum of squared distances of all points to their overall mean.
    fn total(&self) -> f64;
}

/// Copy a data source into engine-owned values, checking that it is non-empty,
/// dimensionally consistent, finite and positively weighted.
pub(crate) fn convert(data: &dyn DataSource) -> Result<Vec<Value>> {
    let n = data.len();
    if n == 0 {
        return Err(Error::InvalidArgument("empty data source".into()));
    }

    let weights = data.weights();
    let mut values = Vec::with_capacity(n);
    let mut dims = 0;
    for i in 0..n {
        let coords = data.coordinates(i);
        if i == 0 {
            dims = coords.len();
            if dims == 0 {
                return Err(Error::InvalidArgument(
                    "data points must have at least one dimension".into(),
                ));
            }
        } else if coords.len() != dims {
            return Err(Error::InvalidArgument(format!(
                "point {} has {} dimensions, expected {}",
                i,
                coords.len(),
                dims
            )));
        }
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "point {} has non-finite coordinates",
                i
            )));
        }

        let weight = weights.map_or(1.0, |w| w.weight(i));
        if !(weight > 0.0 && weight.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "point {} has invalid weight {}",
                i, weight
            )));
        }

        values.push(Value {
            coords,
            weight,
            cluster: None,
        });
    }
    Ok(values)
}

/// Sum of squared distances of `values` about their unweighted mean.
pub(crate) fn total_sum_of_squares(values: &[Value]) -> f64 {
    let dims = values.first().map_or(0, |v| v.coords.len());
    let mut mean = vec![0.0; dims];
    for v in values {
        for (m, c) in mean.iter_mut().zip(v.coords.iter()) {
            *m += c;
        }
    }
    let inv = 1.0 / values.len() as f64;
    for m in mean.iter_mut() {
        *m *= inv;
    }

    values
        .iter()
        .map(|v| squared_distance(&mean, &v.coords))
        .sum()
}

/// Per-cluster sum of squared distances of assigned values to `centers`.
pub(crate) fn within_sum_of_squares(values: &[Value], centers: &[&[f64]]) -> Vec<f64> {
    let mut ss = vec![0.0; centers.len()];
    for v in values {
        if let Some(c) = v.cluster {
            ss[c] += squared_distance(centers[c], &v.coords);
        }
    }
    ss
}
