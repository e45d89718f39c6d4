//! 3-D k-d tree over measured field samples.
//!
//! Bulk-built once over the full sample set, immutable afterwards.
//! Nodes cycle the split axis with depth and take the median by a
//! linear-time partial sort, so construction is O(N log N). Queries are
//! k-nearest-neighbour with a bounded max-heap and branch-and-bound
//! pruning on the splitting-plane distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use cres_types::error::{TrackError, TrackResult};
use cres_types::state::MeasuredFieldPoint;

use crate::vec3;

/// One k-NN result: the sample, its index in the original sample
/// array, and its Euclidean distance from the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbour {
    pub id: usize,
    pub distance_m: f64,
    pub point: MeasuredFieldPoint,
}

#[derive(Debug)]
struct Node {
    point: MeasuredFieldPoint,
    id: usize,
    axis: usize,
    left: Option<Box<Node>>,
    right: Option<Box<Node>>,
}

/// Bulk-built, read-only spatial index.
#[derive(Debug)]
pub struct KdTree3 {
    root: Option<Box<Node>>,
    len: usize,
}

impl KdTree3 {
    /// Build from the full sample set. Sample ids are the indices into
    /// the input vector.
    pub fn build(points: Vec<MeasuredFieldPoint>) -> Self {
        let len = points.len();
        let mut entries: Vec<(MeasuredFieldPoint, usize)> =
            points.into_iter().enumerate().map(|(i, p)| (p, i)).collect();
        let root = build_recursive(&mut entries, 0);
        KdTree3 { root, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The k nearest samples to `query_m`, nearest first.
    ///
    /// `k` larger than the population returns every sample. Querying an
    /// empty tree is a caller error and fails fast.
    pub fn nearest(&self, query_m: [f64; 3], k: usize) -> TrackResult<Vec<Neighbour>> {
        let root = self.root.as_ref().ok_or_else(|| {
            TrackError::PhysicsViolation(
                "k-nearest-neighbour query on an empty spatial index".to_string(),
            )
        })?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Candidate> = BinaryHeap::with_capacity(k + 1);
        search(root, query_m, k, &mut heap);

        // Max-heap pops farthest first; reverse for nearest-first order.
        let mut out: Vec<Neighbour> = Vec::with_capacity(heap.len());
        while let Some(c) = heap.pop() {
            out.push(Neighbour {
                id: c.id,
                distance_m: c.distance_m,
                point: c.point,
            });
        }
        out.reverse();
        Ok(out)
    }
}

fn build_recursive(
    entries: &mut [(MeasuredFieldPoint, usize)],
    depth: usize,
) -> Option<Box<Node>> {
    if entries.is_empty() {
        return None;
    }
    let axis = depth % 3;
    let median = entries.len() / 2;
    entries.select_nth_unstable_by(median, |a, b| {
        a.0.position_m[axis].total_cmp(&b.0.position_m[axis])
    });

    let (left, rest) = entries.split_at_mut(median);
    let ((point, id), right) = rest.split_first_mut().expect("median element exists");

    Some(Box::new(Node {
        point: *point,
        id: *id,
        axis,
        left: build_recursive(left, depth + 1),
        right: build_recursive(right, depth + 1),
    }))
}

struct Candidate {
    distance_m: f64,
    id: usize,
    point: MeasuredFieldPoint,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.distance_m.total_cmp(&other.distance_m) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_m.total_cmp(&other.distance_m)
    }
}

fn search(node: &Node, query_m: [f64; 3], k: usize, heap: &mut BinaryHeap<Candidate>) {
    let distance_m = vec3::distance(node.point.position_m, query_m);
    if heap.len() < k {
        heap.push(Candidate {
            distance_m,
            id: node.id,
            point: node.point,
        });
    } else if distance_m < heap.peek().expect("heap is non-empty").distance_m {
        heap.pop();
        heap.push(Candidate {
            distance_m,
            id: node.id,
            point: node.point,
        });
    }

    let delta = query_m[node.axis] - node.point.position_m[node.axis];
    let (near, far) = if delta < 0.0 {
        (&node.left, &node.right)
    } else {
        (&node.right, &node.left)
    };

    if let Some(child) = near {
        search(child, query_m, k, heap);
    }
    if let Some(child) = far {
        // The far subtree can only improve the result if the splitting
        // plane is closer than the current k-th best distance.
        let kth = heap
            .peek()
            .map(|c| c.distance_m)
            .unwrap_or(f64::INFINITY);
        if heap.len() < k || delta.abs() < kth {
            search(child, query_m, k, heap);
        }
    }
}
