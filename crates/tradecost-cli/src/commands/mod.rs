// One module per CLI subcommand. main.rs parses arguments and dispatches
// here; each handler builds a library request and returns the stage report.

pub mod cost_matrix;
pub mod market_access;
pub mod matching;
