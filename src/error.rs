//! Error type shared by the spatial index and both clustering engines.

use thiserror::Error;

/// Result type for clustering operations
pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds reported by the clustering engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A parameter or the input data was rejected before any state changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `cluster` was called on a k-means engine that was never seeded.
    #[error("no centers: seed must be called before cluster")]
    NotSeeded,

    /// The iteration cap was reached before convergence.
    ///
    /// The engine still finishes the run, so its results are usable when this
    /// is returned.
    #[error("exceeded maximum iterations ({iterations}), last delta = {delta}")]
    NonConvergence { iterations: usize, delta: f64 },

    /// An internal consistency check failed, e.g. a neighbour query that
    /// returned nothing for a point that must at least find itself.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

impl Error {
    /// Whether the run that produced this error left no usable result.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::NonConvergence { .. })
    }
}
