//! `cost-matrix` command: the full network-to-matrix pipeline.

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::Args;

use tradecost_lib::{
    run_cost_matrix, BorderSource, CostMatrixReport, CostMatrixRequest, CostMode, DataPaths,
    TieBreak,
};

/// Arguments for the cost-matrix command.
#[derive(Debug, Clone, Args)]
pub struct CostMatrixArgs {
    /// Where to write the cost matrix.
    #[arg(long, short = 'o')]
    pub outfile: Option<PathBuf>,
    /// Border cost table to use instead of the one in the parameters dir.
    #[arg(long = "bcost-file", short = 'b')]
    pub bcost_file: Option<PathBuf>,
    /// Compute travel time in hours instead of freight cost.
    #[arg(long, short = 't')]
    pub time: bool,
    /// Ignore persisted matches and rematch every settlement.
    #[arg(long, short = 'f')]
    pub force_rematch: bool,
    /// Where border crossings come from.
    #[arg(long, default_value = "auto", value_parser = parse_border_source)]
    pub border_source: BorderSource,
    /// Border crossing points (used with `--border-source points`).
    #[arg(long)]
    pub border_crossings: Option<PathBuf>,
    /// Port points.
    #[arg(long)]
    pub ports: Option<PathBuf>,
    /// Settlement table.
    #[arg(long)]
    pub cities: Option<PathBuf>,
    /// Directory holding the parameter tables.
    #[arg(long)]
    pub params_dir: Option<PathBuf>,
    /// Search radius for same-region candidates, in coordinate units.
    /// Overrides `match_radius` from the parameter tables.
    #[arg(long)]
    pub radius: Option<f64>,
    /// Break quality ties by distance instead of network order.
    #[arg(long)]
    pub nearest_tie_break: bool,
}

fn parse_border_source(raw: &str) -> std::result::Result<BorderSource, String> {
    raw.parse()
}

impl CostMatrixArgs {
    /// Convert CLI args to a library request.
    pub fn to_request(&self, mut paths: DataPaths) -> CostMatrixRequest {
        let overrides = [
            (&mut paths.cost_matrix, &self.outfile),
            (&mut paths.border_crossings, &self.border_crossings),
            (&mut paths.ports, &self.ports),
            (&mut paths.cities, &self.cities),
            (&mut paths.params_dir, &self.params_dir),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }

        CostMatrixRequest {
            paths,
            mode: if self.time {
                CostMode::Time
            } else {
                CostMode::Freight
            },
            border_costs: self.bcost_file.clone(),
            border_source: self.border_source,
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

/// Handle the cost-matrix subcommand.
pub fn handle_cost_matrix(args: &CostMatrixArgs, paths: DataPaths) -> Result<CostMatrixReport> {
    let request = args.to_request(paths);
    if request.border_source == BorderSource::Points {
        ensure!(
            request.paths.border_crossings.exists(),
            "border crossing points not found at {}",
            request.paths.border_crossings.display()
        );
    }
    run_cost_matrix(&request).with_context(|| {
        format!(
            "failed to compute the {} cost matrix into {}",
            request.mode,
            request.paths.cost_matrix.display()
        )
    })
}
