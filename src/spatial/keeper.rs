use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A point returned by a spatial query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// The id the point was indexed under.
    pub id: usize,
    /// Squared Euclidean distance from the query point.
    pub dist_sq: f64,
}

/// Heap entry. Ordered by distance, then by the order in which the query
/// visited it, so that the heap top is always the candidate to evict.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    dist_sq: f64,
    seq: usize,
    id: usize,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist_sq
            .total_cmp(&other.dist_sq)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

/// Collects at most `capacity` candidates lying within `radius_sq` of a query.
///
/// Backed by a max-heap keyed on distance: once full, a nearer candidate evicts
/// the farthest one kept so far. Among equally distant candidates the one seen
/// first wins.
#[derive(Debug, Clone)]
pub struct DistKeeper {
    radius_sq: f64,
    capacity: usize,
    seen: usize,
    heap: BinaryHeap<Candidate>,
}

impl DistKeeper {
    /// Create an empty keeper for squared radius `radius_sq` holding up to `capacity` candidates.
    pub fn new(radius_sq: f64, capacity: usize) -> Self {
        Self {
            radius_sq,
            capacity,
            seen: 0,
            heap: BinaryHeap::with_capacity(capacity.min(64)),
        }
    }

    /// Offer a candidate. Returns whether it was kept.
    pub fn keep(&mut self, id: usize, dist_sq: f64) -> bool {
        // NaN distances fail this comparison and are never kept.
        if !(dist_sq <= self.radius_sq) || self.capacity == 0 {
            return false;
        }
        let candidate = Candidate {
            dist_sq,
            seq: self.seen,
            id,
        };
        self.seen += 1;

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if candidate < *worst => {
                self.heap.pop();
                self.heap.push(candidate);
                true
            }
            _ => false,
        }
    }

    /// The squared distance beyond which no candidate can be kept any more:
    /// the radius until the keeper is full, then the farthest kept distance.
    pub fn bound(&self) -> f64 {
        if self.is_full() {
            self.heap.peek().map_or(self.radius_sq, |worst| worst.dist_sq)
        } else {
            self.radius_sq
        }
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Consume the keeper, returning the kept candidates nearest first.
    pub fn into_sorted(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|c| Neighbor {
                id: c.id,
                dist_sq: c.dist_sq,
            })
            .collect()
    }
}
