//! End-to-end stages: settlement matching, cost matrix and market access.
//!
//! Each stage takes a request describing its inputs and returns a serializable
//! report. The in-memory building blocks ([`prepare_graph`]) are exposed
//! separately so callers can drive the model without touching the filesystem.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{info, warn};

use crate::compose::{load_network, Network};
use crate::config::{load_match_radius, CostMode, DataPaths, MarketAccessParams, ModelConfig};
use crate::costs::annotate_costs;
use crate::error::Result;
use crate::graph::Graph;
use crate::market_access::{compute_market_access, DecayMode, LN_MA_COLUMN};
use crate::matching::{match_ports, match_settlements, NetworkMatcher, PortMatch, TieBreak};
use crate::matrix::{compute_cost_matrix, CostMatrix};
use crate::settlements::SettlementTable;
use crate::transfer::{
    add_border_crossings, add_port_transfers, detect_border_pairs, load_border_points,
    load_port_points, locate_border_pairs, BorderPoint, BorderSource,
};

/// Mass columns accepted for market access.
pub const MASS_COLUMNS: [&str; 3] = ["GDP", "mass", "population"];

/// How border crossings are found in [`prepare_graph`].
#[derive(Debug, Clone, PartialEq)]
pub enum BorderInput {
    /// Coordinate-identical nodes of different regions.
    Auto,
    /// Explicit crossing points.
    Points(Vec<BorderPoint>),
}

/// Counts of synthetic edges added to a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub annotated_edges: usize,
    pub port_transfers: usize,
    pub border_crossings: usize,
    pub border_points_skipped: usize,
}

/// Annotate a copy of the unified graph and add port and border transfers.
pub fn prepare_graph(
    network: &Network,
    ports: &[PortMatch],
    borders: &BorderInput,
    config: &ModelConfig,
) -> Result<(Graph, TransferSummary)> {
    let mut graph = network.unified.clone();
    let annotated_edges = annotate_costs(&mut graph, &config.rates)?;
    let port_transfers =
        add_port_transfers(&mut graph, ports, config.port_cost, config.port_tolerance);

    let (pairs, border_points_skipped) = match borders {
        BorderInput::Auto => (detect_border_pairs(&graph), 0),
        BorderInput::Points(points) => {
            let pairs = locate_border_pairs(&graph, points, config.border_tolerance);
            let skipped = points.len() - pairs.len();
            (pairs, skipped)
        }
    };
    let border_crossings =
        add_border_crossings(&mut graph, &pairs, &config.border_costs, config.mode)?;

    Ok((
        graph,
        TransferSummary {
            annotated_edges,
            port_transfers,
            border_crossings,
            border_points_skipped,
        },
    ))
}

/// Inputs of the settlement matching stage.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub paths: DataPaths,
    /// Overrides `match_radius` from the cost parameter table.
    pub radius: Option<f64>,
    pub tie_break: TieBreak,
    pub force_rematch: bool,
}

impl MatchRequest {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            radius: None,
            tie_break: TieBreak::default(),
            force_rematch: false,
        }
    }
}

/// Outcome of the settlement matching stage.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub radius: f64,
    pub settlements: usize,
    pub matched: usize,
    pub nodes: usize,
    pub edges: usize,
    pub skipped_features: usize,
    pub cities: PathBuf,
}

/// Compose the network, match settlements and persist the matches.
pub fn run_matching(request: &MatchRequest) -> Result<MatchReport> {
    let paths = &request.paths;
    let radius = match request.radius {
        Some(radius) => radius,
        None => load_match_radius(&paths.params_dir)?,
    };

    info!("1. Loading network");
    let report = load_network(&paths.roads, &paths.sea)?;

    info!(radius, "2. Matching settlements");
    let mut table = SettlementTable::from_path(&paths.cities)?;
    let matcher = NetworkMatcher::new(&report.network, radius, request.tie_break);
    let matched = match_settlements(&mut table.rows, &matcher, request.force_rematch)?;
    if matched > 0 {
        table.save(&paths.cities)?;
    }

    Ok(MatchReport {
        radius,
        settlements: table.len(),
        matched,
        nodes: report.network.unified.node_count(),
        edges: report.network.unified.edge_count(),
        skipped_features: report.skipped.len(),
        cities: paths.cities.clone(),
    })
}

/// Inputs of the cost matrix stage.
#[derive(Debug, Clone)]
pub struct CostMatrixRequest {
    pub paths: DataPaths,
    pub mode: CostMode,
    /// Border cost table replacing `border_costs.csv` in the parameters dir.
    pub border_costs: Option<PathBuf>,
    pub border_source: BorderSource,
    /// Overrides `match_radius` from the cost parameter table.
    pub radius: Option<f64>,
    pub tie_break: TieBreak,
    pub force_rematch: bool,
}

impl CostMatrixRequest {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            mode: CostMode::default(),
            border_costs: None,
            border_source: BorderSource::default(),
            radius: None,
            tie_break: TieBreak::default(),
            force_rematch: false,
        }
    }
}

/// Outcome of the cost matrix stage.
#[derive(Debug, Clone, Serialize)]
pub struct CostMatrixReport {
    pub mode: CostMode,
    pub settlements: usize,
    pub matched: usize,
    pub nodes: usize,
    pub edges: usize,
    pub skipped_features: usize,
    #[serde(flatten)]
    pub transfers: TransferSummary,
    pub unreachable_pairs: usize,
    pub outfile: PathBuf,
}

/// Run the full pipeline and write the cost matrix.
pub fn run_cost_matrix(request: &CostMatrixRequest) -> Result<CostMatrixReport> {
    let paths = &request.paths;
    let mut config = ModelConfig::load(
        &paths.params_dir,
        request.mode,
        request.border_costs.as_deref(),
    )?;
    config.tie_break = request.tie_break;
    if let Some(radius) = request.radius {
        config.match_radius = radius;
    }

    info!("1. Loading network");
    let network_report = load_network(&paths.roads, &paths.sea)?;
    let network = &network_report.network;
    let matcher = NetworkMatcher::new(network, config.match_radius, config.tie_break);

    info!(radius = config.match_radius, "2. Matching settlements");
    let mut table = SettlementTable::from_path(&paths.cities)?;
    let matched = match_settlements(&mut table.rows, &matcher, request.force_rematch)?;
    if matched > 0 {
        table.save(&paths.cities)?;
    }

    info!("3. Matching ports");
    let ports = if paths.ports.exists() {
        let (points, _) = load_port_points(&paths.ports)?;
        match_ports(&points, &matcher)?
    } else {
        warn!(path = %paths.ports.display(), "no ports file; sea transfers disabled");
        Vec::new()
    };

    info!(source = %request.border_source, "4. Adding costs and transfers");
    let borders = match request.border_source {
        BorderSource::Auto => BorderInput::Auto,
        BorderSource::Points => {
            let (points, _) = load_border_points(&paths.border_crossings)?;
            BorderInput::Points(points)
        }
    };
    let (graph, transfers) = prepare_graph(network, &ports, &borders, &config)?;

    info!("5. Calculating cost matrix");
    let matrix = compute_cost_matrix(&graph, &table.rows, &config)?;
    matrix.save(&paths.cost_matrix)?;

    let report = CostMatrixReport {
        mode: config.mode,
        settlements: table.len(),
        matched,
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        skipped_features: network_report.skipped.len(),
        transfers,
        unreachable_pairs: matrix.unreachable_count(),
        outfile: paths.cost_matrix.clone(),
    };
    info!(
        nodes = report.nodes,
        edges = report.edges,
        port_transfers = transfers.port_transfers,
        border_crossings = transfers.border_crossings,
        border_points_skipped = transfers.border_points_skipped,
        unreachable = report.unreachable_pairs,
        "cost matrix complete"
    );
    Ok(report)
}

/// Inputs of the market access stage.
#[derive(Debug, Clone)]
pub struct MarketAccessRequest {
    pub paths: DataPaths,
    pub decay: DecayMode,
}

/// Outcome of the market access stage.
#[derive(Debug, Clone, Serialize)]
pub struct MarketAccessReport {
    pub decay: DecayMode,
    pub settlements: usize,
    pub outfile: PathBuf,
}

/// Score every settlement against a saved cost matrix and write the
/// settlement table with an added `ln MA` column.
pub fn run_market_access(request: &MarketAccessRequest) -> Result<MarketAccessReport> {
    let paths = &request.paths;
    let params = MarketAccessParams::load(&paths.params_dir)?;
    info!(outfile = %paths.market_access.display(), "file will export here");

    info!("1. Reading cost matrix");
    let matrix = CostMatrix::load(&paths.cost_matrix)?;

    info!("2. Reading settlements");
    let mut table = SettlementTable::from_path(&paths.cities)?;
    let masses = table.numeric_column(&MASS_COLUMNS)?;

    info!("3. Calculating market access");
    let scores = market_access_column(&matrix, &table, &masses, &params, request.decay)?;
    table.set_column(LN_MA_COLUMN, &scores);

    info!("4. Exporting");
    table.save(&paths.market_access)?;

    Ok(MarketAccessReport {
        decay: request.decay,
        settlements: table.len(),
        outfile: paths.market_access.clone(),
    })
}

fn market_access_column(
    matrix: &CostMatrix,
    table: &SettlementTable,
    masses: &[f64],
    params: &MarketAccessParams,
    decay: DecayMode,
) -> Result<Vec<String>> {
    let access = compute_market_access(matrix, &table.ids(), masses, params, decay)?;
    Ok(access.iter().map(|score| score.ln_ma.to_string()).collect())
}
