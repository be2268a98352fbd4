//! Synthetic transfer edges: port road/sea transfers and border crossings.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::compose::FeatureError;
use crate::config::{BorderCosts, CostMode};
use crate::error::Result;
use crate::geojson::{load_features, Feature};
use crate::graph::{Edge, Graph, NodeId, QualityClass};
use crate::matching::PortMatch;
use crate::spatial::NodeIndex;

/// Per-crossing override value meaning "use the regional default".
pub const NO_OVERRIDE: f64 = -1.0;

/// Property of a border point holding its override cost.
pub const BORDER_COST_PROPERTY: &str = "border_cost";

/// Where border crossings come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderSource {
    /// Coordinate-identical nodes of different regions anywhere in the graph.
    #[default]
    Auto,
    /// An explicit list of border-crossing points.
    Points,
}

impl fmt::Display for BorderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            BorderSource::Auto => "auto",
            BorderSource::Points => "points",
        };
        f.write_str(value)
    }
}

impl FromStr for BorderSource {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BorderSource::Auto),
            "points" => Ok(BorderSource::Points),
            other => Err(format!("unknown border source '{other}'")),
        }
    }
}

/// An explicit border-crossing location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderPoint {
    pub point: [f64; 2],
    /// Cost applied in both directions instead of the regional default.
    pub override_cost: Option<f64>,
}

impl BorderPoint {
    pub fn new(point: [f64; 2], override_cost: f64) -> Self {
        Self {
            point,
            override_cost: parse_override(override_cost),
        }
    }

    fn from_feature(index: usize, feature: &Feature) -> Result<Self> {
        Ok(Self {
            point: feature.point(index)?,
            override_cost: feature
                .f64_property(BORDER_COST_PROPERTY)
                .and_then(parse_override),
        })
    }
}

fn parse_override(value: f64) -> Option<f64> {
    (value != NO_OVERRIDE).then_some(value)
}

/// Two co-located nodes of different regions to be joined by a crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderPair {
    pub a: NodeId,
    pub b: NodeId,
    pub override_cost: Option<f64>,
}

/// Read port locations from a point feature collection.
pub fn load_port_points(path: &Path) -> Result<(Vec<[f64; 2]>, Vec<FeatureError>)> {
    let features = load_features(path)?;
    let mut points = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        match feature.point(index) {
            Ok(point) => points.push(point),
            Err(error) => skipped.push(FeatureError { index, error }),
        }
    }
    report_skipped("ports", &skipped);
    Ok((points, skipped))
}

/// Read border crossing points from a point feature collection.
pub fn load_border_points(path: &Path) -> Result<(Vec<BorderPoint>, Vec<FeatureError>)> {
    let features = load_features(path)?;
    let mut points = Vec::with_capacity(features.len());
    let mut skipped = Vec::new();
    for (index, feature) in features.iter().enumerate() {
        match BorderPoint::from_feature(index, feature) {
            Ok(point) => points.push(point),
            Err(error) => skipped.push(FeatureError { index, error }),
        }
    }
    report_skipped("border crossings", &skipped);
    Ok((points, skipped))
}

fn report_skipped(source: &str, skipped: &[FeatureError]) {
    for failure in skipped {
        warn!(source, feature = failure.index, error = %failure.error, "skipped malformed feature");
    }
}

/// Join matched road and sea nodes at each port with a zero-length edge
/// pair costing `cost`.
///
/// Ports whose road or sea match lies `tolerance` or further away get no
/// transfer. Returns the number of ports connected.
pub fn add_port_transfers(
    graph: &mut Graph,
    ports: &[PortMatch],
    cost: f64,
    tolerance: f64,
) -> usize {
    let mut created = 0;
    for port in ports {
        let Some(sea) = &port.nodes.sea else {
            continue;
        };
        let road = &port.nodes.road;
        if road.distance_to(port.point) >= tolerance || sea.distance_to(port.point) >= tolerance {
            debug!(road = %road, sea = %sea, "port too far from network; no transfer");
            continue;
        }

        let (Some(road_id), Some(sea_id)) = (graph.node_id(road), graph.node_id(sea)) else {
            warn!(road = %road, sea = %sea, "port nodes missing from graph");
            continue;
        };
        add_transfer_pair(graph, road_id, sea_id, QualityClass::PortFee, cost, cost);
        created += 1;
    }

    info!(ports = ports.len(), created, "sea transfers created");
    created
}

/// Find coordinate-identical node pairs belonging to different road regions.
///
/// Every two nodes at the same location with differing regions form a pair;
/// sea nodes never take part.
pub fn detect_border_pairs(graph: &Graph) -> Vec<BorderPair> {
    let mut by_location: HashMap<(u64, u64), Vec<NodeId>> = HashMap::new();
    for (id, node) in graph.nodes().iter().enumerate() {
        if node.region.is_sea() {
            continue;
        }
        let key = (location_bits(node.x), location_bits(node.y));
        by_location.entry(key).or_default().push(id);
    }

    let mut pairs = Vec::new();
    for ids in by_location.values().filter(|ids| ids.len() > 1) {
        for (i, &a) in ids.iter().enumerate() {
            for &b in &ids[i + 1..] {
                if graph.node(a).region != graph.node(b).region {
                    pairs.push(BorderPair {
                        a,
                        b,
                        override_cost: None,
                    });
                }
            }
        }
    }
    pairs.sort_by_key(|pair| (pair.a, pair.b));

    info!(pairs = pairs.len(), "detected border crossings");
    pairs
}

fn location_bits(value: f64) -> u64 {
    if value == 0.0 {
        0
    } else {
        value.to_bits()
    }
}

/// Resolve explicit border points to node pairs.
///
/// Road nodes within `tolerance` of a point are collected in graph order. A
/// point touching a single node is a data-extent artifact and is skipped, as
/// is a point touching none; otherwise the first two nodes are the sides.
pub fn locate_border_pairs(
    graph: &Graph,
    points: &[BorderPoint],
    tolerance: f64,
) -> Vec<BorderPair> {
    let road_nodes = (0..graph.node_count()).filter(|&id| !graph.node(id).region.is_sea());
    let index = NodeIndex::from_nodes(graph, road_nodes);

    let mut pairs = Vec::new();
    for border in points {
        let hits = index.within_radius(border.point, tolerance);
        match hits.as_slice() {
            [] => info!(point = ?border.point, "no road node at border point; skipping"),
            [(only, _)] => info!(
                point = ?border.point,
                node = %graph.node(*only),
                "border point touches a single road node; skipping"
            ),
            [(a, _), (b, _), ..] => pairs.push(BorderPair {
                a: *a,
                b: *b,
                override_cost: border.override_cost,
            }),
        }
    }

    info!(
        points = points.len(),
        pairs = pairs.len(),
        "located border crossings"
    );
    pairs
}

/// Add a crossing edge pair for every border pair.
///
/// Each direction costs the pair's override when present, otherwise the
/// border table's cost for leaving that side's region towards the other.
/// Negative costs are logged and applied as-is. Returns the number of
/// crossings created.
pub fn add_border_crossings(
    graph: &mut Graph,
    pairs: &[BorderPair],
    table: &BorderCosts,
    mode: CostMode,
) -> Result<usize> {
    for pair in pairs {
        let region_a = graph.node(pair.a).region.clone();
        let region_b = graph.node(pair.b).region.clone();

        let (cost_ab, cost_ba) = match pair.override_cost {
            Some(cost) => (cost, cost),
            None => (
                table.lookup(&region_a, &region_b, mode)?,
                table.lookup(&region_b, &region_a, mode)?,
            ),
        };

        if cost_ab.min(cost_ba) < 0.0 {
            warn!(
                from = %region_a,
                to = %region_b,
                cost_ab,
                cost_ba,
                "border cost is less than zero"
            );
        }

        add_transfer_pair(
            graph,
            pair.a,
            pair.b,
            QualityClass::BorderCrossing,
            cost_ab,
            cost_ba,
        );
    }

    info!(crossings = pairs.len(), "border crossings created");
    Ok(pairs.len())
}

fn add_transfer_pair(
    graph: &mut Graph,
    a: NodeId,
    b: NodeId,
    quality: QualityClass,
    cost_ab: f64,
    cost_ba: f64,
) {
    graph.add_edge(
        a,
        Edge {
            target: b,
            quality: quality.clone(),
            length: 0.0,
            cost: Some(cost_ab),
        },
    );
    graph.add_edge(
        b,
        Edge {
            target: a,
            quality,
            length: 0.0,
            cost: Some(cost_ba),
        },
    );
}
