//! Stage report rendering.
//!
//! Each pipeline stage returns a serializable report. `text` renders a short
//! human summary; `json` emits the report itself for scripting.

use std::io::{self, Write};
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

use tradecost_lib::{CostMatrixReport, MarketAccessReport, MatchReport};

use crate::terminal::{format_with_separators, ColorPalette};

/// Report format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// A report that knows how to summarize itself for humans.
pub trait StageReport: Serialize {
    fn render_text<W: Write>(&self, out: &mut W, palette: &ColorPalette) -> io::Result<()>;
}

/// Write `report` to `out` in the requested format.
pub fn render<R: StageReport, W: Write>(
    report: &R,
    format: OutputFormat,
    out: &mut W,
    palette: &ColorPalette,
) -> io::Result<()> {
    match format {
        OutputFormat::Text => report.render_text(out, palette),
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, report)?;
            writeln!(out)
        }
    }
}

fn count(palette: &ColorPalette, value: usize, warn_when_nonzero: bool) -> String {
    let color = if warn_when_nonzero && value > 0 {
        palette.orange
    } else {
        palette.green
    };
    format!("{color}{}{}", format_with_separators(value), palette.reset)
}

impl StageReport for MatchReport {
    fn render_text<W: Write>(&self, out: &mut W, palette: &ColorPalette) -> io::Result<()> {
        writeln!(
            out,
            "Matched {} of {} settlements against {} nodes / {} edges (radius {})",
            count(palette, self.matched, false),
            count(palette, self.settlements, false),
            count(palette, self.nodes, false),
            count(palette, self.edges, false),
            self.radius,
        )?;
        if self.skipped_features > 0 {
            writeln!(
                out,
                "Skipped {} malformed features",
                count(palette, self.skipped_features, true)
            )?;
        }
        writeln!(out, "Settlements written to {}", self.cities.display())
    }
}

impl StageReport for CostMatrixReport {
    fn render_text<W: Write>(&self, out: &mut W, palette: &ColorPalette) -> io::Result<()> {
        writeln!(
            out,
            "Cost matrix ({}) for {} settlements",
            self.mode,
            count(palette, self.settlements, false)
        )?;
        writeln!(
            out,
            "  network: {} nodes, {} edges",
            count(palette, self.nodes, false),
            count(palette, self.edges, false)
        )?;
        writeln!(
            out,
            "  transfers: {} ports, {} border crossings ({} points skipped)",
            count(palette, self.transfers.port_transfers, false),
            count(palette, self.transfers.border_crossings, false),
            count(palette, self.transfers.border_points_skipped, true)
        )?;
        writeln!(
            out,
            "  unreachable pairs: {}",
            count(palette, self.unreachable_pairs, true)
        )?;
        writeln!(out, "Matrix written to {}", self.outfile.display())
    }
}

impl StageReport for MarketAccessReport {
    fn render_text<W: Write>(&self, out: &mut W, palette: &ColorPalette) -> io::Result<()> {
        writeln!(
            out,
            "Market access ({} decay) for {} settlements",
            self.decay,
            count(palette, self.settlements, false)
        )?;
        writeln!(out, "Scores written to {}", self.outfile.display())
    }
}

/// Print the footer with elapsed time.
pub fn print_footer(elapsed: Duration, palette: &ColorPalette) {
    let elapsed_ms = elapsed.as_millis();
    let time_str = if elapsed_ms < 1000 {
        format!("{elapsed_ms}ms")
    } else {
        format!("{:.2}s", elapsed.as_secs_f64())
    };
    println!("{}Completed in {time_str}{}", palette.gray, palette.reset);
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn report() -> MarketAccessReport {
        MarketAccessReport {
            decay: tradecost_lib::DecayMode::Harris,
            settlements: 1200,
            outfile: PathBuf::from("output/market_access.csv"),
        }
    }

    #[test]
    fn text_report_is_plain_without_color() {
        let mut out = Vec::new();
        render(&report(), OutputFormat::Text, &mut out, &ColorPalette::plain()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Market access (harris decay) for 1,200 settlements"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn json_report_serializes_fields() {
        let mut out = Vec::new();
        render(&report(), OutputFormat::Json, &mut out, &ColorPalette::plain()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["decay"], "harris");
        assert_eq!(value["settlements"], 1200);
    }
}
