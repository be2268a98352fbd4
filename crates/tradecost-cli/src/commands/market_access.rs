//! `market-access` command: score settlements against a saved cost matrix.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use tradecost_lib::{
    run_market_access, DataPaths, DecayMode, MarketAccessReport, MarketAccessRequest,
};

/// Arguments for the market-access command.
#[derive(Debug, Clone, Args)]
pub struct MarketAccessArgs {
    /// Cost matrix to read.
    #[arg(long, short = 'i')]
    pub infile: Option<PathBuf>,
    /// Where to write the scored settlement table.
    #[arg(long, short = 'o')]
    pub outfile: Option<PathBuf>,
    /// Harris (1954) market potential: reciprocal cost decay.
    #[arg(long)]
    pub harris: bool,
    /// Settlement table holding the GDP column.
    #[arg(long)]
    pub cities: Option<PathBuf>,
    /// Directory holding the parameter tables.
    #[arg(long)]
    pub params_dir: Option<PathBuf>,
}

impl MarketAccessArgs {
    /// Convert CLI args to a library request.
    pub fn to_request(&self, mut paths: DataPaths) -> MarketAccessRequest {
        if let Some(infile) = &self.infile {
            paths.cost_matrix = infile.clone();
        }
        if let Some(outfile) = &self.outfile {
            paths.market_access = outfile.clone();
        }
        if let Some(cities) = &self.cities {
            paths.cities = cities.clone();
        }
        if let Some(params_dir) = &self.params_dir {
            paths.params_dir = params_dir.clone();
        }
        MarketAccessRequest {
            paths,
            decay: if self.harris {
                DecayMode::Harris
            } else {
                DecayMode::Power
            },
        }
    }
}

/// Handle the market-access subcommand.
pub fn handle_market_access(
    args: &MarketAccessArgs,
    paths: DataPaths,
) -> Result<MarketAccessReport> {
    let request = args.to_request(paths);
    run_market_access(&request).with_context(|| {
        format!(
            "failed to compute market access from {}",
            request.paths.cost_matrix.display()
        )
    })
}
