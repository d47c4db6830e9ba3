//! Kernels driving the mean-shift iteration.
//!
//! A kernel owns the walkers ("modes") and a kd-tree over the unshifted data.
//! Each shift moves every mode to the kernel-weighted mean of the data points
//! found around it.

use rand::RngCore;

use crate::cluster::{convert, DataSource, Value};
use crate::error::{Error, Result};
use crate::spatial::KdTree;

/// A mean-shift kernel.
pub trait Kernel {
    /// Place one mode on every data point and index the data.
    fn init(&mut self, data: &dyn DataSource, rng: &mut dyn RngCore) -> Result<()>;

    /// Move every mode, in index order, to the weighted mean of its
    /// neighbourhood. Returns the summed squared displacement of all modes.
    fn shift(&mut self) -> Result<f64>;

    /// The kernel's logical radius, used to merge converged modes.
    fn bandwidth(&self) -> f64;

    /// Current mode positions, indexed like the data. Empty before `init`.
    fn modes(&self) -> &[Vec<f64>];
}

/// Walkers plus the index over the original points they move through.
///
/// `points` holds the validated coordinates and weights looked up by id for
/// each query hit. The tree owns its own copy of the coordinates.
#[derive(Debug, Clone)]
struct Modes {
    modes: Vec<Vec<f64>>,
    points: Vec<Value>,
    tree: KdTree,
}

impl Modes {
    fn new(data: &dyn DataSource, rng: &mut dyn RngCore) -> Result<Self> {
        let points = convert(data)?;
        let dims = points[0].coords().len();
        let tree = KdTree::build(
            dims,
            points.iter().enumerate().map(|(i, v)| (v.coords().to_vec(), i)),
            rng,
        )?;
        let modes = points.iter().map(|v| v.coords().to_vec()).collect();
        Ok(Self {
            modes,
            points,
            tree,
        })
    }

    /// Shift each mode to the mean of the points within `radius_sq`, each point
    /// weighted by `kernel(weight, dist_sq)`.
    fn shift<F>(&mut self, radius_sq: f64, kernel: F) -> Result<f64>
    where
        F: Fn(f64, f64) -> f64,
    {
        let n = self.points.len();
        let dims = self.points[0].coords().len();
        let mut mean = vec![0.0; dims];
        let mut delta = 0.0;

        for (i, mode) in self.modes.iter_mut().enumerate() {
            let hits = self.tree.nearest_within_radius(mode, radius_sq, n);
            if hits.is_empty() {
                return Err(Error::DegenerateGeometry(format!(
                    "mode {} has no data points within the kernel radius",
                    i
                )));
            }

            mean.iter_mut().for_each(|m| *m = 0.0);
            let mut div = 0.0;
            for hit in &hits {
                let point = &self.points[hit.id];
                let w = kernel(point.weight(), hit.dist_sq);
                div += w;
                for (m, c) in mean.iter_mut().zip(point.coords()) {
                    *m += c * w;
                }
            }
            if !(div > 0.0 && div.is_finite()) {
                return Err(Error::DegenerateGeometry(format!(
                    "mode {} has total kernel weight {}",
                    i, div
                )));
            }

            for (m, c) in mean.iter_mut().zip(mode.iter_mut()) {
                *m /= div;
                delta += (*c - *m) * (*c - *m);
                *c = *m;
            }
        }
        Ok(delta)
    }
}

fn not_initialised() -> Error {
    Error::InvalidArgument("kernel used before init".into())
}

/// Flat kernel: every point within `bandwidth` counts with its own weight.
#[derive(Debug, Clone)]
pub struct Uniform {
    bandwidth: f64,
    modes: Option<Modes>,
}

impl Uniform {
    pub fn new(bandwidth: f64) -> Self {
        Self {
            bandwidth,
            modes: None,
        }
    }
}

impl Kernel for Uniform {
    fn init(&mut self, data: &dyn DataSource, rng: &mut dyn RngCore) -> Result<()> {
        if !(self.bandwidth > 0.0 && self.bandwidth.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "bandwidth must be positive, got {}",
                self.bandwidth
            )));
        }
        self.modes = Some(Modes::new(data, rng)?);
        Ok(())
    }

    fn shift(&mut self) -> Result<f64> {
        let radius_sq = self.bandwidth * self.bandwidth;
        let modes = self.modes.as_mut().ok_or_else(not_initialised)?;
        modes.shift(radius_sq, |weight, _| weight)
    }

    /// The query radius is fixed, so this is the configured bandwidth.
    fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    fn modes(&self) -> &[Vec<f64>] {
        match &self.modes {
            Some(m) => m.modes.as_slice(),
            None => &[],
        }
    }
}

/// Gaussian kernel `exp(-d² / 2h²)` truncated at `h·√oversample`.
///
/// Points are gathered from the widened radius and then weighted by the
/// Gaussian falloff, so `oversample` trades query cost for how much of the
/// tail is kept.
#[derive(Debug, Clone)]
pub struct TruncatedGaussian {
    bandwidth: f64,
    oversample: f64,
    modes: Option<Modes>,
}

impl TruncatedGaussian {
    pub fn new(bandwidth: f64, oversample: f64) -> Self {
        Self {
            bandwidth,
            oversample,
            modes: None,
        }
    }
}

impl Kernel for TruncatedGaussian {
    fn init(&mut self, data: &dyn DataSource, rng: &mut dyn RngCore) -> Result<()> {
        if !(self.bandwidth > 0.0 && self.bandwidth.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "bandwidth must be positive, got {}",
                self.bandwidth
            )));
        }
        if !(self.oversample >= 1.0 && self.oversample.is_finite()) {
            return Err(Error::InvalidArgument(format!(
                "oversample must be at least 1, got {}",
                self.oversample
            )));
        }
        self.modes = Some(Modes::new(data, rng)?);
        Ok(())
    }

    fn shift(&mut self) -> Result<f64> {
        let h2 = self.bandwidth * self.bandwidth;
        let inv = 1.0 / (2.0 * h2);
        let modes = self.modes.as_mut().ok_or_else(not_initialised)?;
        modes.shift(h2 * self.oversample, |weight, dist_sq| {
            weight * (-dist_sq * inv).exp()
        })
    }

    /// The Gaussian's bandwidth, not the widened query radius.
    fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    fn modes(&self) -> &[Vec<f64>] {
        match &self.modes {
            Some(m) => m.modes.as_slice(),
            None => &[],
        }
    }
}
