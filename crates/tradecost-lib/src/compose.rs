//! Network composition: per-region road graphs, the sea graph and their union.
//!
//! Roads are partitioned by region before being converted, so coordinate
//! identical endpoints in two countries stay distinct nodes. Rail is carried
//! as an always-empty graph.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::geojson::{feature_error, load_features, Feature};
use crate::graph::{Graph, NodeKey, QualityClass, RegionId};

/// Property holding the region code of a road feature.
pub const REGION_PROPERTY: &str = "iso3";
/// Property holding the quality class of a line feature.
pub const QUALITY_PROPERTY: &str = "quality";
/// Property holding the physical length in meters.
pub const LENGTH_PROPERTY: &str = "length";
/// Optional property holding a precomputed traversal cost.
pub const COST_PROPERTY: &str = "cost";

/// A feature that could not be turned into graph edges.
#[derive(Debug)]
pub struct FeatureError {
    pub index: usize,
    pub error: Error,
}

/// A validated line segment ready to be inserted into a graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LineSegment {
    pub start: [f64; 2],
    pub end: [f64; 2],
    pub quality: QualityClass,
    pub length: f64,
    pub cost: Option<f64>,
}

impl LineSegment {
    /// Validate a line feature and extract the attributes the graph needs.
    pub fn from_feature(index: usize, feature: &Feature) -> Result<Self> {
        let (start, end) = feature.line_endpoints(index)?;
        let quality = feature
            .property(QUALITY_PROPERTY)
            .ok_or_else(|| feature_error(index, "missing 'quality' property"))
            .and_then(|value| {
                QualityClass::from_json(value)
                    .ok_or_else(|| feature_error(index, "invalid 'quality' property"))
            })?;
        let length = feature
            .f64_property(LENGTH_PROPERTY)
            .ok_or_else(|| feature_error(index, "missing or invalid 'length' property"))?;
        if length < 0.0 || !length.is_finite() {
            return Err(feature_error(index, format!("invalid length {length}")));
        }
        let cost = feature.f64_property(COST_PROPERTY);

        Ok(Self {
            start,
            end,
            quality,
            length,
            cost,
        })
    }
}

/// Road, rail and sea graphs plus their union.
#[derive(Debug, Clone, Default)]
pub struct Network {
    pub road: Graph,
    pub rail: Graph,
    pub sea: Graph,
    pub unified: Graph,
}

/// Outcome of composing a network from feature sets.
#[derive(Debug, Default)]
pub struct ComposeReport {
    pub network: Network,
    pub skipped: Vec<FeatureError>,
}

/// Convert features of a single region into a directed graph.
///
/// Both directions of every segment become edges carrying the same
/// attributes. Invalid features are returned in the error list and skipped.
pub fn features_to_graph<'a, I>(features: I, region: &RegionId) -> (Graph, Vec<FeatureError>)
where
    I: IntoIterator<Item = (usize, &'a Feature)>,
{
    let mut graph = Graph::new();
    let mut skipped = Vec::new();

    for (index, feature) in features {
        match LineSegment::from_feature(index, feature) {
            Ok(segment) => add_segment(&mut graph, &segment, region),
            Err(error) => skipped.push(FeatureError { index, error }),
        }
    }

    (graph, skipped)
}

/// Insert both directions of a segment.
pub fn add_segment(graph: &mut Graph, segment: &LineSegment, region: &RegionId) {
    let start = NodeKey::new(segment.start[0], segment.start[1], region.clone());
    let end = NodeKey::new(segment.end[0], segment.end[1], region.clone());
    graph.connect(
        start.clone(),
        end.clone(),
        segment.quality.clone(),
        segment.length,
        segment.cost,
    );
    graph.connect(
        end,
        start,
        segment.quality.clone(),
        segment.length,
        segment.cost,
    );
}

/// Build the road graph: partition features by region, convert each
/// partition, then union the per-region graphs.
pub fn build_road_graph(features: &[Feature]) -> Result<(Graph, Vec<FeatureError>)> {
    let mut partitions: BTreeMap<RegionId, Vec<(usize, &Feature)>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        match feature.str_property(REGION_PROPERTY) {
            Some(region) if !region.trim().is_empty() => partitions
                .entry(RegionId::new(region.trim()))
                .or_default()
                .push((index, feature)),
            _ => skipped.push(FeatureError {
                index,
                error: feature_error(index, "missing 'iso3' property"),
            }),
        }
    }

    let mut road = Graph::new();
    for (region, members) in &partitions {
        let (graph, mut errors) = features_to_graph(members.iter().copied(), region);
        skipped.append(&mut errors);
        road.union(&graph)?;
    }

    info!(
        regions = partitions.len(),
        nodes = road.node_count(),
        edges = road.edge_count(),
        "built road graph"
    );
    Ok((road, skipped))
}

/// Build the sea graph under the reserved sea region.
pub fn build_sea_graph(features: &[Feature]) -> (Graph, Vec<FeatureError>) {
    let (graph, skipped) = features_to_graph(features.iter().enumerate(), &RegionId::sea());
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built sea graph"
    );
    (graph, skipped)
}

/// Compose road, rail and sea graphs into one network.
pub fn compose_network(road: Graph, rail: Graph, sea: Graph) -> Result<Network> {
    let mut unified = Graph::compose(&road, &rail)?;
    unified.union(&sea)?;
    Ok(Network {
        road,
        rail,
        sea,
        unified,
    })
}

/// Compose a network from in-memory road and sea feature sets.
pub fn compose_from_features(roads: &[Feature], sea: &[Feature]) -> Result<ComposeReport> {
    let (road_graph, mut skipped) = build_road_graph(roads)?;
    let (sea_graph, mut sea_skipped) = build_sea_graph(sea);
    skipped.append(&mut sea_skipped);

    for failure in &skipped {
        warn!(feature = failure.index, error = %failure.error, "skipped malformed feature");
    }

    let network = compose_network(road_graph, Graph::new(), sea_graph)?;
    info!(
        nodes = network.unified.node_count(),
        edges = network.unified.edge_count(),
        skipped = skipped.len(),
        "composed network"
    );
    Ok(ComposeReport { network, skipped })
}

/// Read road and sea GeoJSON files and compose the network.
pub fn load_network(roads_path: &Path, sea_path: &Path) -> Result<ComposeReport> {
    info!(roads = %roads_path.display(), sea = %sea_path.display(), "reading GeoJSONs");
    let roads = load_features(roads_path)?;
    let sea = load_features(sea_path)?;
    compose_from_features(&roads, &sea)
}
