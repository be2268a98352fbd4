use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};

/// Fail unless every edge carries a cost.
pub fn ensure_annotated(graph: &Graph) -> Result<()> {
    match graph.edges().find(|(_, edge)| edge.cost.is_none()) {
        Some((from, edge)) => Err(Error::UnannotatedEdge {
            from: graph.node(from).to_string(),
            to: graph.node(edge.target).to_string(),
        }),
        None => Ok(()),
    }
}

/// Run Dijkstra's algorithm from `source` over edge costs.
///
/// Returns the cost to every node, indexed by [`NodeId`]; unreachable nodes
/// hold `f64::INFINITY`. Each node is settled once, so a (logged) negative
/// border cost can never make the search loop.
pub fn single_source_costs(graph: &Graph, source: NodeId) -> Vec<f64> {
    let mut distances = vec![f64::INFINITY; graph.node_count()];
    let mut settled = vec![false; graph.node_count()];
    let mut queue = BinaryHeap::new();

    if source >= graph.node_count() {
        return distances;
    }

    distances[source] = 0.0;
    queue.push(QueueEntry::new(source, 0.0));

    while let Some(entry) = queue.pop() {
        if settled[entry.node] {
            continue;
        }
        settled[entry.node] = true;
        let current_distance = distances[entry.node];

        for edge in graph.neighbours(entry.node) {
            let next = edge.target;
            if settled[next] {
                continue;
            }
            let next_cost = current_distance + edge.cost.unwrap_or(f64::INFINITY);
            if next_cost < distances[next] {
                distances[next] = next_cost;
                queue.push(QueueEntry::new(next, next_cost));
            }
        }
    }

    distances
}

#[derive(Copy, Clone, Debug, Default)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq(&other.0)
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct QueueEntry {
    node: NodeId,
    cost: FloatOrd,
}

impl QueueEntry {
    fn new(node: NodeId, cost: f64) -> Self {
        Self {
            node,
            cost: FloatOrd(cost),
        }
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering so BinaryHeap becomes a min-heap by cost.
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
