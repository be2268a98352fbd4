//! `match` command: compose the network and persist settlement matches.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use tradecost_lib::{run_matching, DataPaths, MatchReport, MatchRequest, TieBreak};

/// Arguments for the match command.
#[derive(Debug, Clone, Args)]
pub struct MatchArgs {
    /// Settlement table to match and rewrite.
    #[arg(long)]
    pub cities: Option<PathBuf>,
    /// Road line features.
    #[arg(long)]
    pub roads: Option<PathBuf>,
    /// Sea link line features.
    #[arg(long)]
    pub sea: Option<PathBuf>,
    /// Directory holding the parameter tables (read for `match_radius`).
    #[arg(long)]
    pub params_dir: Option<PathBuf>,
    /// Search radius for same-region candidates, in coordinate units.
    /// Overrides `match_radius` from the parameter tables.
    #[arg(long)]
    pub radius: Option<f64>,
    /// Break quality ties by distance instead of network order.
    #[arg(long)]
    pub nearest_tie_break: bool,
    /// Ignore persisted matches and rematch every settlement.
    #[arg(long, short = 'f')]
    pub force_rematch: bool,
}

impl MatchArgs {
    /// Convert CLI args to a library request.
    pub fn to_request(&self, mut paths: DataPaths) -> MatchRequest {
        if let Some(cities) = &self.cities {
            paths.cities = cities.clone();
        }
        if let Some(roads) = &self.roads {
            paths.roads = roads.clone();
        }
        if let Some(sea) = &self.sea {
            paths.sea = sea.clone();
        }
        if let Some(params_dir) = &self.params_dir {
            paths.params_dir = params_dir.clone();
        }
        MatchRequest {
            paths,
            radius: self.radius,
            tie_break: if self.nearest_tie_break {
                TieBreak::Nearest
            } else {
                TieBreak::InputOrder
            },
            force_rematch: self.force_rematch,
        }
    }
}

/// Handle the match subcommand.
pub fn handle_match(args: &MatchArgs, paths: DataPaths) -> Result<MatchReport> {
    let request = args.to_request(paths);
    run_matching(&request).with_context(|| {
        format!(
            "failed to match settlements in {}",
            request.paths.cities.display()
        )
    })
}
