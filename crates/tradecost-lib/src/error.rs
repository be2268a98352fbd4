use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the tradecost library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// A geographic feature was malformed (missing properties, wrong geometry).
    #[error("feature {index}: {message}")]
    Feature { index: usize, message: String },

    /// Raised when a GeoJSON document is not a `FeatureCollection`.
    #[error("expected a GeoJSON FeatureCollection in {path}")]
    NotFeatureCollection { path: PathBuf },

    /// Raised when a quality class has no entry in the transport rate table.
    #[error("unknown key: quality class '{class}' has no transport rate")]
    UnknownQualityClass { class: String },

    /// Raised when a region has no border cost entry.
    #[error("unknown key: no border cost for crossings from '{from}' to '{to}'")]
    UnknownBorderRegion { from: String, to: String },

    /// Raised when a destination region has no tariff entry.
    #[error("unknown key: region '{region}' has no tariff")]
    UnknownTariffRegion { region: String },

    /// Raised when a named scalar parameter is missing.
    #[error("unknown key: parameter '{name}' is not defined")]
    MissingParameter { name: String },

    /// Raised when two graphs disagree on the attributes of the same edge.
    #[error("conflicting attributes for edge {from} -> {to}")]
    ConflictingEdge { from: String, to: String },

    /// Raised when a tabular input lacks a required column.
    #[error("{table} is missing required column '{column}'. Available: {available}")]
    MissingColumn {
        table: String,
        column: String,
        available: String,
    },

    /// Raised when a tabular cell could not be parsed.
    #[error("invalid value in {table} at row {row}: {message}")]
    InvalidValue {
        table: String,
        row: u64,
        message: String,
    },

    /// Raised when a persisted node tuple cannot be parsed.
    #[error("invalid node tuple '{value}'")]
    InvalidNode { value: String },

    /// Raised when a node referenced by a record is absent from the graph.
    #[error("node {node} is not part of the network")]
    NodeNotInGraph { node: String },

    /// Raised when matching is attempted against an empty candidate set.
    #[error("cannot match against an empty {network} network")]
    EmptyNetwork { network: String },

    /// Raised when shortest paths are requested over an edge without a cost.
    #[error("edge {from} -> {to} has no cost; annotate the graph first")]
    UnannotatedEdge { from: String, to: String },

    /// Raised when a cost matrix is malformed.
    #[error("invalid cost matrix: {message}")]
    InvalidMatrix { message: String },

    /// Raised when a settlement has not been matched to a routing node.
    #[error("settlement {id} has no routing node")]
    UnmatchedSettlement { id: String },

    /// Wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Wrapper for CSV errors.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Wrapper for JSON errors.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
