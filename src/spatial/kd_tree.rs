use rand::seq::index;
use rand::Rng;

use super::keeper::{DistKeeper, Neighbor};
use super::squared_distance;
use crate::error::{Error, Result};

/// Number of elements sampled when estimating a node's median.
const RANDOMS: usize = 100;

#[derive(Debug, Clone)]
struct Node {
    point: Vec<f64>,
    id: usize,
    /// Splitting dimension. Left descendants are at or below `point[dim]`,
    /// right descendants are at or above it.
    dim: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// A kd-tree holding one point per node.
///
/// Bulk construction splits each node on the dimension of widest spread, at a
/// pivot chosen as the median of a random sample of at most `RANDOMS` points.
/// The resulting tree is balanced on average, not guaranteed to be.
#[derive(Debug, Clone)]
pub struct KdTree {
    dims: usize,
    root: Option<Box<Node>>,
    len: usize,
}

impl KdTree {
    /// Create an empty tree for `dims`-dimensional points.
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            root: None,
            len: 0,
        }
    }

    /// Build a tree from `(coordinates, id)` pairs.
    ///
    /// Fails if `dims` is zero or any point has a different dimension.
    pub fn build<I, R>(dims: usize, points: I, rng: &mut R) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<f64>, usize)>,
        R: Rng + ?Sized,
    {
        if dims == 0 {
            return Err(Error::InvalidArgument(
                "kd-tree points must have at least one dimension".into(),
            ));
        }
        let mut entries: Vec<(Vec<f64>, usize)> = points.into_iter().collect();
        if let Some((p, id)) = entries.iter().find(|(p, _)| p.len() != dims) {
            return Err(Error::InvalidArgument(format!(
                "point {} has {} dimensions, expected {}",
                id,
                p.len(),
                dims
            )));
        }

        let len = entries.len();
        let root = build_node(&mut entries, rng);
        log::trace!("built kd-tree over {} points in {} dimensions", len, dims);
        Ok(Self { dims, root, len })
    }

    /// Add a point without rebuilding. The new node splits on the dimension
    /// following its parent's.
    pub fn insert(&mut self, point: Vec<f64>, id: usize) -> Result<()> {
        if point.len() != self.dims {
            return Err(Error::InvalidArgument(format!(
                "point {} has {} dimensions, expected {}",
                id,
                point.len(),
                self.dims
            )));
        }

        insert_node(&mut self.root, point, id, 0, self.dims);
        self.len += 1;
        Ok(())
    }

    /// Return up to `capacity` indexed points within squared distance
    /// `radius_sq` of `query`, nearest first. Equally distant points come in
    /// the order the traversal reached them.
    pub fn nearest_within_radius(
        &self,
        query: &[f64],
        radius_sq: f64,
        capacity: usize,
    ) -> Vec<Neighbor> {
        debug_assert_eq!(query.len(), self.dims);
        let mut keeper = DistKeeper::new(radius_sq, capacity);
        if let Some(root) = &self.root {
            search(root, query, &mut keeper);
        }
        keeper.into_sorted()
    }

    /// The single nearest indexed point, if any. A distance of zero means
    /// `query` coincides with an existing point.
    pub fn nearest(&self, query: &[f64]) -> Option<Neighbor> {
        self.nearest_within_radius(query, f64::INFINITY, 1)
            .into_iter()
            .next()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(node: &Option<Box<Node>>) -> usize {
            match node {
                Some(n) => 1 + walk(&n.left).max(walk(&n.right)),
                None => 0,
            }
        }
        walk(&self.root)
    }
}

fn build_node<R: Rng + ?Sized>(entries: &mut [(Vec<f64>, usize)], rng: &mut R) -> Option<Box<Node>> {
    if entries.is_empty() {
        return None;
    }

    let dim = widest_dim(entries);
    let mid = partition(entries, dim, rng);
    let (left, rest) = entries.split_at_mut(mid);
    let (pivot, right) = rest.split_at_mut(1);
    let (point, id) = (std::mem::take(&mut pivot[0].0), pivot[0].1);

    Some(Box::new(Node {
        point,
        id,
        dim,
        left: build_node(left, rng),
        right: build_node(right, rng),
    }))
}

/// The dimension with the largest coordinate range across `entries`.
fn widest_dim(entries: &[(Vec<f64>, usize)]) -> usize {
    let dims = entries[0].0.len();
    let mut best_dim = 0;
    let mut best_spread = f64::NEG_INFINITY;
    for d in 0..dims {
        let (lo, hi) = entries
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (p, _)| {
                (lo.min(p[d]), hi.max(p[d]))
            });
        if hi - lo > best_spread {
            best_spread = hi - lo;
            best_dim = d;
        }
    }
    best_dim
}

/// Estimate the median along `dim` from a random sample and split `entries`
/// around it. Returns the split position: everything before it is at or below
/// the entry there on `dim`, everything after is at or above it.
///
/// The split is positional, so keys equal to the pivot may land on either
/// side. Runs of equal keys are cut in the middle to keep the tree balanced.
fn partition<R: Rng + ?Sized>(entries: &mut [(Vec<f64>, usize)], dim: usize, rng: &mut R) -> usize {
    let mut sample: Vec<usize> = if entries.len() <= RANDOMS {
        (0..entries.len()).collect()
    } else {
        index::sample(rng, entries.len(), RANDOMS).into_vec()
    };
    sample.sort_by(|&a, &b| entries[a].0[dim].total_cmp(&entries[b].0[dim]));
    let pivot = entries[sample[sample.len() / 2]].0[dim];

    let below = entries.iter().filter(|(p, _)| p[dim] < pivot).count();
    let at_most = entries.iter().filter(|(p, _)| p[dim] <= pivot).count();
    let mid = (entries.len() / 2).clamp(below, at_most.max(below + 1) - 1);
    entries.select_nth_unstable_by(mid, |a, b| a.0[dim].total_cmp(&b.0[dim]));
    mid
}

fn insert_node(slot: &mut Option<Box<Node>>, point: Vec<f64>, id: usize, dim: usize, dims: usize) {
    match slot {
        Some(node) => {
            let next = (node.dim + 1) % dims;
            if point[node.dim] < node.point[node.dim] {
                insert_node(&mut node.left, point, id, next, dims);
            } else {
                insert_node(&mut node.right, point, id, next, dims);
            }
        }
        None => {
            *slot = Some(Box::new(Node {
                point,
                id,
                dim,
                left: None,
                right: None,
            }));
        }
    }
}

fn search(node: &Node, query: &[f64], keeper: &mut DistKeeper) {
    keeper.keep(node.id, squared_distance(query, &node.point));

    let diff = query[node.dim] - node.point[node.dim];
    let (near, far) = if diff < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };
    if let Some(near) = near {
        search(near, query, keeper);
    }
    if let Some(far) = far {
        if diff * diff <= keeper.bound() {
            search(far, query, keeper);
        }
    }
}
