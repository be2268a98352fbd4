//! Tradecost library entry points.
//!
//! This crate composes a multimodal transport network from road and sea
//! line features, matches settlements and ports to network nodes, prices
//! every edge, adds port and border transfers, and computes an all-pairs
//! settlement cost matrix plus a market-access index on top of it. Higher
//! level consumers (the CLI) should only depend on the functions exported
//! here instead of reimplementing behavior.
//!

#![deny(warnings)]

pub mod compose;
pub mod config;
pub mod costs;
pub mod error;
pub mod geojson;
pub mod graph;
pub mod market_access;
pub mod matching;
pub mod matrix;
pub mod path;
pub mod pipeline;
mod progress;
pub mod settlements;
pub mod spatial;
mod table;
pub mod transfer;

pub use compose::{compose_from_features, compose_network, load_network, ComposeReport, Network};
pub use config::{
    load_match_radius, BorderCost, BorderCosts, CostMode, DataPaths, MarketAccessParams,
    ModelConfig, Parameters, Tariffs, TransportRates,
};
pub use costs::annotate_costs;
pub use error::{Error, Result};
pub use geojson::{load_features, read_features, Feature};
pub use graph::{Edge, Graph, NodeId, NodeKey, QualityClass, RegionId};
pub use market_access::{compute_market_access, DecayMode, MarketAccess};
pub use matching::{match_ports, match_settlements, NetworkMatcher, PortMatch, TieBreak};
pub use matrix::{compute_cost_matrix, CostMatrix, UNREACHABLE_SENTINEL};
pub use path::single_source_costs;
pub use pipeline::{
    prepare_graph, run_cost_matrix, run_market_access, run_matching, BorderInput,
    CostMatrixReport, CostMatrixRequest, MarketAccessReport, MarketAccessRequest, MatchReport,
    MatchRequest, TransferSummary,
};
pub use settlements::{Settlement, SettlementTable};
pub use spatial::NodeIndex;
pub use transfer::{BorderPoint, BorderSource};
