//! Spatial indexing for radius-bounded neighbour queries.
//!
//! This module provides:
//! - A kd-tree over fixed-dimensional points with median-of-random-sample pivoting
//! - A bounded keeper that collects query candidates in distance order
//!
//! Points are identified by a caller-chosen `usize` id, so the index never owns
//! anything but coordinates. All distances are squared Euclidean distances.
//!
//! # Examples
//!
//! ```rust
//! use clustering::spatial::KdTree;
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(1);
//! let points = vec![(vec![0.0, 0.0], 0), (vec![1.0, 0.0], 1), (vec![5.0, 5.0], 2)];
//! let tree = KdTree::build(2, points, &mut rng).unwrap();
//!
//! let hits = tree.nearest_within_radius(&[0.2, 0.0], 4.0, 10);
//! let ids: Vec<usize> = hits.iter().map(|n| n.id).collect();
//! assert_eq!(ids, vec![0, 1]);
//! ```

pub mod kd_tree;
pub mod keeper;

pub use kd_tree::KdTree;
pub use keeper::{DistKeeper, Neighbor};

/// Compute the squared Euclidean distance between two points of the same dimension.
/// Using squared distance to avoid unnecessary sqrt computations during comparisons.
pub fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0, |acc, (&x, &y)| acc + (x - y).powi(2))
}
