//! Unsupervised clustering of points in ℝⁿ.
//!
//! Two engines are provided:
//! - [`KMeans`]: Lloyd's k-means with D²-weighted seeding
//! - [`MeanShift`]: mean-shift with a pluggable [`Kernel`] ([`Uniform`] or
//!   [`TruncatedGaussian`]), using a kd-tree for neighbour queries and for
//!   merging converged modes
//!
//! Choosing the number of clusters is left to the caller, typically by seeding
//! and clustering repeatedly and keeping the first acceptable result.

pub mod cluster;
pub mod error;
pub mod spatial;

pub use cluster::{
    Center, Clusterer, DataSource, Indices, KMeans, KMeansConfig, Kernel, MeanShift,
    MeanShiftConfig, MergedCenter, Status, TruncatedGaussian, Uniform, Value, Weighted,
    WeightedPoints,
};
pub use error::{Error, Result};
pub use spatial::{KdTree, Neighbor};
