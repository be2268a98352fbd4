//! KD-tree spatial index over network node coordinates.
//!
//! The index ignores region tags: it answers purely geometric queries and
//! returns node identifiers, leaving region and quality filtering to the
//! matcher. Coordinates are stored as `f64` so that a query sitting exactly on
//! a node reports a distance of zero.

use std::collections::HashMap;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use tracing::{debug, warn};

use crate::graph::{Graph, NodeId};

/// Upper bound on results for a radius query before filtering.
pub const MAX_RADIUS_RESULTS: usize = 500;

/// KD-tree bucket size.
///
/// kiddo's mutable tree cannot split a bucket whose points all share one
/// value on the split axis, so more than `BUCKET_SIZE` nodes on a single
/// axis value (rounded coordinates along a meridian, say) would overflow it.
/// [`NodeIndex::from_nodes`] detects that case and scans linearly instead.
const BUCKET_SIZE: usize = 256;

type Tree = KdTree<f64, usize, 2, BUCKET_SIZE, u32>;

enum Backend {
    Tree(Tree),
    Linear(Vec<[f64; 2]>),
}

/// Spatial index over a subset of graph nodes.
pub struct NodeIndex {
    backend: Backend,
    /// Indexed node identifiers; the KD-tree item is the position in this vec,
    /// which preserves the candidate input order.
    nodes: Vec<NodeId>,
}

impl NodeIndex {
    /// Index every node of a graph.
    pub fn build(graph: &Graph) -> Self {
        Self::from_nodes(graph, 0..graph.node_count())
    }

    /// Index a chosen list of nodes, in the given order.
    pub fn from_nodes(graph: &Graph, ids: impl IntoIterator<Item = NodeId>) -> Self {
        let nodes: Vec<NodeId> = ids.into_iter().collect();
        let points: Vec<[f64; 2]> = nodes.iter().map(|&id| graph.node(id).coords()).collect();

        let crowded = max_shared_axis_value(&points);
        let backend = if crowded > BUCKET_SIZE {
            warn!(
                node_count = nodes.len(),
                shared = crowded,
                "too many nodes share one coordinate value for the KD-tree; using a linear scan"
            );
            Backend::Linear(points)
        } else {
            let mut tree: Tree = KdTree::new();
            for (position, point) in points.iter().enumerate() {
                tree.add(point, position);
            }
            Backend::Tree(tree)
        };

        debug!(node_count = nodes.len(), "built node index");
        Self { backend, nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether queries go through the KD-tree rather than a linear scan.
    pub fn uses_tree(&self) -> bool {
        matches!(self.backend, Backend::Tree(_))
    }

    /// Closest indexed node to a point, ties resolved towards input order.
    pub fn nearest(&self, point: [f64; 2]) -> Option<(NodeId, f64)> {
        if self.nodes.is_empty() {
            return None;
        }
        let (position, distance) = match &self.backend {
            Backend::Tree(tree) => {
                let best = tree.nearest_one::<SquaredEuclidean>(&point);
                // Equal-distance candidates (co-located nodes) are resolved by input order.
                let slack = f64::EPSILON.max(best.distance * 1e-12);
                let position = tree
                    .within::<SquaredEuclidean>(&point, best.distance + slack)
                    .iter()
                    .filter(|neighbour| neighbour.distance <= best.distance)
                    .map(|neighbour| neighbour.item)
                    .min()
                    .unwrap_or(best.item);
                (position, best.distance)
            }
            Backend::Linear(points) => points
                .iter()
                .enumerate()
                .map(|(position, candidate)| (position, squared_distance(candidate, &point)))
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))?,
        };
        Some((self.nodes[position], distance.sqrt()))
    }

    /// Nodes within `radius` of a point, at most [`MAX_RADIUS_RESULTS`] of
    /// them (the closest ones), returned in candidate input order.
    ///
    /// A radius of zero returns only nodes exactly at `point`.
    pub fn within_radius(&self, point: [f64; 2], radius: f64) -> Vec<(NodeId, f64)> {
        if radius < 0.0 || self.nodes.is_empty() {
            return Vec::new();
        }
        let limit = radius * radius;

        let mut hits: Vec<(usize, f64)> = match &self.backend {
            // Bounded k-nearest query, so the cost never depends on how many
            // nodes fall inside the radius.
            Backend::Tree(tree) => tree
                .nearest_n::<SquaredEuclidean>(&point, MAX_RADIUS_RESULTS)
                .into_iter()
                .filter(|neighbour| neighbour.distance <= limit)
                .map(|neighbour| (neighbour.item, neighbour.distance))
                .collect(),
            Backend::Linear(points) => {
                let mut hits: Vec<(usize, f64)> = points
                    .iter()
                    .enumerate()
                    .map(|(position, candidate)| (position, squared_distance(candidate, &point)))
                    .filter(|(_, distance)| *distance <= limit)
                    .collect();
                hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
                hits.truncate(MAX_RADIUS_RESULTS);
                hits
            }
        };
        hits.sort_by_key(|(position, _)| *position);

        hits.into_iter()
            .map(|(position, distance)| (self.nodes[position], distance.sqrt()))
            .collect()
    }
}

fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

/// Largest number of points sharing a single value on either axis.
fn max_shared_axis_value(points: &[[f64; 2]]) -> usize {
    (0..2)
        .map(|axis| {
            let mut counts: HashMap<u64, usize> = HashMap::new();
            for point in points {
                // `+ 0.0` folds -0.0 into 0.0.
                *counts.entry((point[axis] + 0.0).to_bits()).or_default() += 1;
            }
            counts.into_values().max().unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

impl std::fmt::Debug for NodeIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeIndex")
            .field("node_count", &self.nodes.len())
            .field("tree", &self.uses_tree())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeKey, QualityClass};

    fn line_graph(points: &[(f64, f64, &str)]) -> Graph {
        let mut graph = Graph::new();
        for window in points.windows(2) {
            let (ax, ay, ar) = window[0];
            let (bx, by, br) = window[1];
            graph.connect(
                NodeKey::new(ax, ay, ar),
                NodeKey::new(bx, by, br),
                QualityClass::Rank(1),
                1.0,
                None,
            );
        }
        graph
    }

    #[test]
    fn test_empty_index() {
        let index = NodeIndex::build(&Graph::new());
        assert!(index.is_empty());
        assert!(index.nearest([0.0, 0.0]).is_none());
        assert!(index.within_radius([0.0, 0.0], 1.0).is_empty());
    }

    #[test]
    fn test_nearest_basic() {
        let graph = line_graph(&[(0.0, 0.0, "A"), (1.0, 0.0, "A"), (2.0, 0.0, "A")]);
        let index = NodeIndex::build(&graph);

        let (id, distance) = index.nearest([1.9, 0.0]).expect("nearest");
        assert_eq!(graph.node(id), &NodeKey::new(2.0, 0.0, "A"));
        assert!((distance - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_prefers_input_order_on_ties() {
        let graph = line_graph(&[(5.0, 5.0, "B"), (5.0, 5.0, "A")]);
        let index = NodeIndex::build(&graph);

        let (id, distance) = index.nearest([5.0, 5.0]).expect("nearest");
        assert_eq!(id, 0);
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_radius_filtering_keeps_input_order() {
        let graph = line_graph(&[
            (0.3, 0.0, "A"),
            (0.1, 0.0, "A"),
            (5.0, 0.0, "A"),
            (0.2, 0.0, "A"),
        ]);
        let index = NodeIndex::build(&graph);

        let ids: Vec<_> = index
            .within_radius([0.0, 0.0], 1.0)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![0, 1, 3]);
    }

    #[test]
    fn test_zero_radius_finds_exact_coincidence() {
        let graph = line_graph(&[(2.0, 0.0, "A"), (2.0, 0.0, "B"), (2.5, 0.0, "B")]);
        let index = NodeIndex::build(&graph);

        let hits = index.within_radius([2.0, 0.0], 0.0);
        let ids: Vec<_> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(hits.iter().all(|(_, distance)| *distance == 0.0));
        assert!(index.within_radius([2.0, 0.0], -1.0).is_empty());
    }

    #[test]
    fn test_radius_results_are_bounded() {
        let mut graph = Graph::new();
        for i in 0..(MAX_RADIUS_RESULTS + 50) {
            graph.insert_node(NodeKey::new(i as f64 * 1e-4, i as f64 * 1e-5, "A"));
        }
        let index = NodeIndex::build(&graph);

        let hits = index.within_radius([0.0, 0.0], 10.0);
        assert_eq!(hits.len(), MAX_RADIUS_RESULTS);
        // The closest ones survive, in input order.
        assert_eq!(hits.first().map(|(id, _)| *id), Some(0));
        assert_eq!(hits.last().map(|(id, _)| *id), Some(MAX_RADIUS_RESULTS - 1));
    }

    #[test]
    fn test_many_nodes_on_one_meridian_fall_back_to_linear_scan() {
        let mut graph = Graph::new();
        for i in 0..(BUCKET_SIZE + 20) {
            graph.insert_node(NodeKey::new(3.0, i as f64 / 100.0, "A"));
        }
        let index = NodeIndex::build(&graph);
        assert!(!index.uses_tree());

        let (id, distance) = index.nearest([3.1, 0.5]).expect("nearest");
        assert_eq!(graph.node(id), &NodeKey::new(3.0, 0.5, "A"));
        assert!((distance - 0.1).abs() < 1e-9);

        let ids: Vec<_> = index
            .within_radius([3.0, 0.5], 0.015)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec![49, 50, 51]);
    }
}
