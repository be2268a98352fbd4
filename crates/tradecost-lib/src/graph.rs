use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};

/// Region tag reserved for nodes of the sea-link network.
pub const SEA_REGION: &str = "sea";

/// Dense identifier of a node inside a single [`Graph`].
pub type NodeId = usize;

/// Administrative area a node belongs to (ISO3 country code for roads).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(String);

impl RegionId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The reserved region used by every sea node.
    pub fn sea() -> Self {
        Self(SEA_REGION.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sea(&self) -> bool {
        self.0 == SEA_REGION
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RegionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RegionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identity of a network node: coordinate pair plus region tag.
///
/// Two nodes with identical coordinates but different regions are distinct;
/// that is what makes border crossings detectable. Equality and hashing use
/// the exact bit pattern of the coordinates (with `-0.0` folded into `0.0`).
#[derive(Debug, Clone)]
pub struct NodeKey {
    pub x: f64,
    pub y: f64,
    pub region: RegionId,
}

impl NodeKey {
    pub fn new(x: f64, y: f64, region: impl Into<RegionId>) -> Self {
        Self {
            x,
            y,
            region: region.into(),
        }
    }

    pub fn coords(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Euclidean distance from this node to a point, in coordinate units.
    pub fn distance_to(&self, point: [f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        (dx * dx + dy * dy).sqrt()
    }

    /// True when both nodes sit on exactly the same coordinates.
    pub fn same_location(&self, other: &NodeKey) -> bool {
        coord_bits(self.x) == coord_bits(other.x) && coord_bits(self.y) == coord_bits(other.y)
    }
}

fn coord_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for NodeKey {
    fn eq(&self, other: &Self) -> bool {
        self.same_location(other) && self.region == other.region
    }
}

impl Eq for NodeKey {}

impl Hash for NodeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        coord_bits(self.x).hash(state);
        coord_bits(self.y).hash(state);
        self.region.hash(state);
    }
}

/// Persisted form is `(x, y, REGION)` using shortest round-trip float formatting.
impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?}, {})", self.x, self.y, self.region)
    }
}

impl FromStr for NodeKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let invalid = || Error::InvalidNode {
            value: value.to_string(),
        };

        let inner = value
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(invalid)?;

        let mut parts = inner.splitn(3, ',').map(str::trim);
        let x = parts
            .next()
            .and_then(|raw| raw.parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let y = parts
            .next()
            .and_then(|raw| raw.parse::<f64>().ok())
            .ok_or_else(invalid)?;
        let region = parts
            .next()
            .map(|raw| raw.trim_matches(|c| c == '\'' || c == '"'))
            .filter(|raw| !raw.is_empty())
            .ok_or_else(invalid)?;

        Ok(NodeKey::new(x, y, region))
    }
}

/// Classification of an edge: drives the rate lookup, or marks synthetic edges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QualityClass {
    /// Ordinal road quality; higher is better.
    Rank(i64),
    /// Non-ordinal class such as a sea-link class.
    Named(String),
    /// Synthetic road/sea transfer at a port.
    PortFee,
    /// Synthetic transfer between two regions.
    BorderCrossing,
}

impl QualityClass {
    /// Parse the `quality` property of a GeoJSON feature.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => {
                if let Some(rank) = number.as_i64() {
                    Some(QualityClass::Rank(rank))
                } else {
                    number
                        .as_f64()
                        .filter(|v| v.fract() == 0.0)
                        .map(|v| QualityClass::Rank(v as i64))
                }
            }
            Value::String(raw) => raw.parse().ok(),
            _ => None,
        }
    }

    /// Ordinal rank for road qualities; `None` for every other class.
    pub fn rank(&self) -> Option<i64> {
        match self {
            QualityClass::Rank(rank) => Some(*rank),
            _ => None,
        }
    }

    /// Key used when looking up the class in a rate table.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityClass::Rank(rank) => write!(f, "{rank}"),
            QualityClass::Named(name) => f.write_str(name),
            QualityClass::PortFee => f.write_str("port_fee"),
            QualityClass::BorderCrossing => f.write_str("border_crossing"),
        }
    }
}

impl FromStr for QualityClass {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Ok(match trimmed {
            "port_fee" => QualityClass::PortFee,
            "border_crossing" => QualityClass::BorderCrossing,
            _ => match trimmed.parse::<i64>() {
                Ok(rank) => QualityClass::Rank(rank),
                Err(_) => QualityClass::Named(trimmed.to_string()),
            },
        })
    }
}

/// Directed edge. At most one edge exists per ordered node pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub quality: QualityClass,
    /// Physical length in meters; zero for synthetic edges.
    pub length: f64,
    /// Traversal cost once annotated (currency or hours).
    pub cost: Option<f64>,
}

/// Directed weighted graph keyed by [`NodeKey`].
///
/// Nodes keep their insertion order, which matching relies on for its
/// tie-break policy.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeKey>,
    lookup: HashMap<NodeKey, NodeId>,
    adjacency: Vec<Vec<Edge>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[NodeKey] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &NodeKey {
        &self.nodes[id]
    }

    pub fn node_id(&self, key: &NodeKey) -> Option<NodeId> {
        self.lookup.get(key).copied()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.lookup.contains_key(key)
    }

    /// Insert a node if absent and return its identifier.
    pub fn insert_node(&mut self, key: NodeKey) -> NodeId {
        if let Some(&id) = self.lookup.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.lookup.insert(key.clone(), id);
        self.nodes.push(key);
        self.adjacency.push(Vec::new());
        id
    }

    /// Outgoing edges of a node.
    pub fn neighbours(&self, id: NodeId) -> &[Edge] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.neighbours(from).iter().find(|edge| edge.target == to)
    }

    /// Look up an edge by node identity.
    pub fn edge_between(&self, from: &NodeKey, to: &NodeKey) -> Option<&Edge> {
        let from = self.node_id(from)?;
        let to = self.node_id(to)?;
        self.edge(from, to)
    }

    /// Add an edge, replacing any existing edge for the same ordered pair.
    pub fn add_edge(&mut self, from: NodeId, edge: Edge) {
        let edges = &mut self.adjacency[from];
        match edges.iter_mut().find(|existing| existing.target == edge.target) {
            Some(existing) => *existing = edge,
            None => edges.push(edge),
        }
    }

    /// Add an edge between two node identities, inserting the nodes as needed.
    pub fn connect(
        &mut self,
        from: NodeKey,
        to: NodeKey,
        quality: QualityClass,
        length: f64,
        cost: Option<f64>,
    ) -> (NodeId, NodeId) {
        let from_id = self.insert_node(from);
        let to_id = self.insert_node(to);
        self.add_edge(
            from_id,
            Edge {
                target: to_id,
                quality,
                length,
                cost,
            },
        );
        (from_id, to_id)
    }

    /// Mutable access to every edge, used by cost annotation.
    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut Edge> {
        self.adjacency.iter_mut().flat_map(|edges| edges.iter_mut())
    }

    /// Iterate every edge as `(from, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeId, &Edge)> {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(from, edges)| edges.iter().map(move |edge| (from, edge)))
    }

    /// Best road rank across a node's outgoing edges.
    pub fn max_quality(&self, id: NodeId) -> Option<i64> {
        self.neighbours(id)
            .iter()
            .filter_map(|edge| edge.quality.rank())
            .max()
    }

    /// Merge another graph into this one.
    ///
    /// Nodes are deduplicated by identity. An edge present in both graphs
    /// must carry identical attributes, otherwise the union fails.
    pub fn union(&mut self, other: &Graph) -> Result<()> {
        let remap: Vec<NodeId> = other
            .nodes
            .iter()
            .map(|key| self.insert_node(key.clone()))
            .collect();

        for (from, edge) in other.edges() {
            let from_id = remap[from];
            let mapped = Edge {
                target: remap[edge.target],
                ..edge.clone()
            };
            if let Some(existing) = self.edge(from_id, mapped.target) {
                if *existing != mapped {
                    return Err(Error::ConflictingEdge {
                        from: self.nodes[from_id].to_string(),
                        to: self.nodes[mapped.target].to_string(),
                    });
                }
                continue;
            }
            self.adjacency[from_id].push(mapped);
        }

        Ok(())
    }

    /// Union of two graphs as a new graph.
    pub fn compose(first: &Graph, second: &Graph) -> Result<Graph> {
        let mut composed = first.clone();
        composed.union(second)?;
        Ok(composed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_identity_includes_region() {
        let a = NodeKey::new(1.0, 2.0, "AAA");
        let b = NodeKey::new(1.0, 2.0, "BBB");
        assert_ne!(a, b);
        assert!(a.same_location(&b));
        assert_eq!(a, NodeKey::new(1.0, 2.0, "AAA"));
    }

    #[test]
    fn negative_zero_matches_zero() {
        let mut graph = Graph::new();
        let id = graph.insert_node(NodeKey::new(0.0, 1.0, "AAA"));
        assert_eq!(graph.node_id(&NodeKey::new(-0.0, 1.0, "AAA")), Some(id));
    }

    #[test]
    fn node_tuple_round_trips() {
        let key = NodeKey::new(12.345_678_901_234_5, -0.1, "DEU");
        let parsed: NodeKey = key.to_string().parse().expect("parse");
        assert_eq!(parsed, key);
        assert_eq!(parsed.x.to_bits(), key.x.to_bits());
    }

    #[test]
    fn node_tuple_accepts_quoted_region() {
        let parsed: NodeKey = "(1.5, 2.5, 'FRA')".parse().expect("parse");
        assert_eq!(parsed, NodeKey::new(1.5, 2.5, "FRA"));
        assert!("1.5, 2.5, FRA".parse::<NodeKey>().is_err());
        assert!("(1.5, x, FRA)".parse::<NodeKey>().is_err());
    }

    #[test]
    fn quality_parsing() {
        assert_eq!(
            QualityClass::from_json(&serde_json::json!(3)),
            Some(QualityClass::Rank(3))
        );
        assert_eq!(
            QualityClass::from_json(&serde_json::json!("2")),
            Some(QualityClass::Rank(2))
        );
        assert_eq!(
            QualityClass::from_json(&serde_json::json!("sea")),
            Some(QualityClass::Named("sea".to_string()))
        );
        assert_eq!(QualityClass::from_json(&serde_json::json!(null)), None);
    }

    #[test]
    fn add_edge_collapses_parallel_edges() {
        let mut graph = Graph::new();
        let a = NodeKey::new(0.0, 0.0, "AAA");
        let b = NodeKey::new(1.0, 0.0, "AAA");
        graph.connect(a.clone(), b.clone(), QualityClass::Rank(1), 10.0, None);
        graph.connect(a.clone(), b.clone(), QualityClass::Rank(2), 20.0, None);

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge_between(&a, &b).expect("edge");
        assert_eq!(edge.quality, QualityClass::Rank(2));
    }

    #[test]
    fn union_rejects_conflicting_edge_attributes() {
        let a = NodeKey::new(0.0, 0.0, "AAA");
        let b = NodeKey::new(1.0, 0.0, "AAA");
        let mut first = Graph::new();
        first.connect(a.clone(), b.clone(), QualityClass::Rank(1), 10.0, None);

        let mut other_quality = Graph::new();
        other_quality.connect(a.clone(), b.clone(), QualityClass::Rank(2), 10.0, None);
        assert!(matches!(
            Graph::compose(&first, &other_quality),
            Err(Error::ConflictingEdge { .. })
        ));

        let mut other_length = Graph::new();
        other_length.connect(a.clone(), b.clone(), QualityClass::Rank(1), 11.0, None);
        assert!(matches!(
            first.union(&other_length),
            Err(Error::ConflictingEdge { .. })
        ));

        // The reverse direction is a different ordered pair.
        let mut reverse = Graph::new();
        reverse.connect(b, a, QualityClass::Rank(2), 99.0, None);
        let composed = Graph::compose(&first, &reverse).expect("no conflict");
        assert_eq!(composed.edge_count(), 2);
    }
}
