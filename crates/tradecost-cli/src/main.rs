use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tradecost_cli::output::{print_footer, render, OutputFormat, StageReport};
use tradecost_cli::terminal::ColorPalette;
use tradecost_lib::DataPaths;

mod commands;

use commands::cost_matrix::{handle_cost_matrix, CostMatrixArgs};
use commands::market_access::{handle_market_access, MarketAccessArgs};
use commands::matching::{handle_match, MatchArgs};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multimodal transport cost matrices and market access")]
struct Cli {
    /// Root that default data and parameter paths are resolved against.
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Report format printed after a stage completes.
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose the network and match settlements to routing nodes.
    Match(MatchArgs),
    /// Build the transport graph and compute the settlement cost matrix.
    CostMatrix(CostMatrixArgs),
    /// Compute market access from a saved cost matrix.
    MarketAccess(MarketAccessArgs),
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let started = Instant::now();
    let paths = DataPaths::rooted_at(cli.data_root.as_deref().unwrap_or(Path::new(".")));
    let palette = match cli.format {
        OutputFormat::Text => ColorPalette::detect(),
        OutputFormat::Json => ColorPalette::plain(),
    };

    match &cli.command {
        Command::Match(args) => emit(&handle_match(args, paths)?, cli.format, &palette)?,
        Command::CostMatrix(args) => emit(&handle_cost_matrix(args, paths)?, cli.format, &palette)?,
        Command::MarketAccess(args) => {
            emit(&handle_market_access(args, paths)?, cli.format, &palette)?
        }
    }

    if cli.format == OutputFormat::Text {
        print_footer(started.elapsed(), &palette);
    }
    Ok(())
}

fn emit<R: StageReport>(report: &R, format: OutputFormat, palette: &ColorPalette) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    render(report, format, &mut out, palette).context("failed to write report")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
