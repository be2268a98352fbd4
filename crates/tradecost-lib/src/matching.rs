//! Nearest-node matching for settlements and ports.
//!
//! Road matching prefers, within a search radius and the settlement's own
//! region, the candidate whose best outgoing edge has the highest quality.
//! When no same-region candidate is within the radius the globally nearest
//! road node is used instead. Sea matching is plain nearest-neighbour.

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::compose::Network;
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId, NodeKey, RegionId};
use crate::progress::Progress;
use crate::settlements::Settlement;
use crate::spatial::NodeIndex;

/// How to choose among candidates that share the best quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// First candidate in graph insertion order.
    #[default]
    InputOrder,
    /// Closest candidate; input order among equal distances.
    Nearest,
}

/// Highest-quality node within `radius` of `point` in `region`.
///
/// `index` must be built over nodes of `graph`. Returns `None` only when the
/// index is empty.
pub fn match_node(
    point: [f64; 2],
    region: &RegionId,
    index: &NodeIndex,
    graph: &Graph,
    radius: f64,
    tie_break: TieBreak,
) -> Option<NodeId> {
    let in_region: Vec<(NodeId, f64)> = index
        .within_radius(point, radius)
        .into_iter()
        .filter(|(id, _)| graph.node(*id).region == *region)
        .collect();

    if in_region.is_empty() {
        return index.nearest(point).map(|(id, _)| id);
    }

    let best_quality = in_region
        .iter()
        .map(|(id, _)| graph.max_quality(*id))
        .max()
        .flatten();
    let mut best = in_region
        .into_iter()
        .filter(|(id, _)| graph.max_quality(*id) == best_quality);

    match tie_break {
        TieBreak::InputOrder => best.next().map(|(id, _)| id),
        TieBreak::Nearest => best
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id),
    }
}

/// Nodes matched to a settlement or port.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedNodes {
    pub road: NodeKey,
    pub sea: Option<NodeKey>,
    pub any: NodeKey,
}

/// A port location with its matched nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct PortMatch {
    pub point: [f64; 2],
    pub nodes: MatchedNodes,
}

/// Spatial indexes over the road and sea networks.
#[derive(Debug)]
pub struct NetworkMatcher<'a> {
    network: &'a Network,
    road_index: NodeIndex,
    sea_index: NodeIndex,
    radius: f64,
    tie_break: TieBreak,
}

impl<'a> NetworkMatcher<'a> {
    pub fn new(network: &'a Network, radius: f64, tie_break: TieBreak) -> Self {
        Self {
            road_index: NodeIndex::build(&network.road),
            sea_index: NodeIndex::build(&network.sea),
            network,
            radius,
            tie_break,
        }
    }

    /// Best road node for a point declared in `region`.
    pub fn nearest_road(&self, point: [f64; 2], region: &RegionId) -> Result<NodeKey> {
        match_node(
            point,
            region,
            &self.road_index,
            &self.network.road,
            self.radius,
            self.tie_break,
        )
        .map(|id| self.network.road.node(id).clone())
        .ok_or_else(|| Error::EmptyNetwork {
            network: "road".to_string(),
        })
    }

    /// Nearest sea node regardless of region or quality.
    pub fn nearest_sea(&self, point: [f64; 2]) -> Option<NodeKey> {
        self.sea_index
            .nearest(point)
            .map(|(id, _)| self.network.sea.node(id).clone())
    }

    /// Match a settlement; it always routes from its road node.
    pub fn match_settlement(&self, settlement: &Settlement) -> Result<MatchedNodes> {
        let point = settlement.point();
        let road = self.nearest_road(point, &settlement.region)?;
        Ok(MatchedNodes {
            sea: self.nearest_sea(point),
            any: road.clone(),
            road,
        })
    }

    /// Match a port: nearest road node, nearest sea node, and whichever of
    /// the two is closer as the routing node.
    pub fn match_port(&self, point: [f64; 2]) -> Result<PortMatch> {
        let road = self
            .road_index
            .nearest(point)
            .map(|(id, _)| self.network.road.node(id).clone())
            .ok_or_else(|| Error::EmptyNetwork {
                network: "road".to_string(),
            })?;
        let sea = self.nearest_sea(point);
        let any = match &sea {
            Some(sea) if sea.distance_to(point) < road.distance_to(point) => sea.clone(),
            _ => road.clone(),
        };
        Ok(PortMatch {
            point,
            nodes: MatchedNodes { road, sea, any },
        })
    }
}

/// Match every settlement in parallel.
///
/// Rows with persisted matches that still exist in the network are kept
/// unless `force` is set. Returns how many rows were (re)matched.
pub fn match_settlements(
    settlements: &mut [Settlement],
    matcher: &NetworkMatcher<'_>,
    force: bool,
) -> Result<usize> {
    let unified = &matcher.network.unified;
    let progress = Progress::new("match settlements", settlements.len());

    let rematched: Vec<bool> = settlements
        .par_iter_mut()
        .map(|settlement| -> Result<bool> {
            let reusable = !force
                && settlement.is_matched()
                && [&settlement.nearest_road, &settlement.nearest_any]
                    .into_iter()
                    .flatten()
                    .all(|node| unified.contains(node));

            if reusable {
                progress.tick();
                return Ok(false);
            }
            if settlement.is_matched() && !force {
                warn!(
                    settlement = %settlement.id,
                    "persisted match is not part of the network; rematching"
                );
            }

            let matched = matcher.match_settlement(settlement)?;
            debug!(settlement = %settlement.id, road = %matched.road, "matched settlement");
            settlement.nearest_road = Some(matched.road);
            settlement.nearest_sea = matched.sea;
            settlement.nearest_any = Some(matched.any);
            progress.tick();
            Ok(true)
        })
        .collect::<Result<_>>()?;

    let count = rematched.iter().filter(|&&fresh| fresh).count();
    info!(
        matched = count,
        reused = settlements.len() - count,
        "settlements matched"
    );
    Ok(count)
}

/// Match every port location in parallel.
pub fn match_ports(points: &[[f64; 2]], matcher: &NetworkMatcher<'_>) -> Result<Vec<PortMatch>> {
    let ports: Vec<PortMatch> = points
        .par_iter()
        .map(|&point| matcher.match_port(point))
        .collect::<Result<_>>()?;
    info!(ports = ports.len(), "ports matched");
    Ok(ports)
}
