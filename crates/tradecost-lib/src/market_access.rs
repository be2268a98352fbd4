//! Market access: distance-decay weighted sums of settlement mass over the
//! cost matrix.
//!
//! For settlement `i` the firm-side sum weighs every other settlement `j` by
//! the cost of shipping `j -> i`; the consumer side uses `i -> j`. The two are
//! combined into `ln MA = (1 - beta) ln FMA + beta ln CMA`.

use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::config::MarketAccessParams;
use crate::error::{Error, Result};
use crate::matrix::CostMatrix;
use crate::progress::Progress;

/// Output column holding the combined log index.
pub const LN_MA_COLUMN: &str = "ln MA";

/// Sums are floored here so the logarithm stays finite.
pub const MIN_ACCESS: f64 = 1e-99;

/// Distance-decay function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    /// `mass * (cost + 1)^(-theta)`.
    #[default]
    Power,
    /// Harris market potential: `mass / cost`.
    Harris,
}

impl fmt::Display for DecayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            DecayMode::Power => "power",
            DecayMode::Harris => "harris",
        };
        f.write_str(value)
    }
}

impl FromStr for DecayMode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "power" => Ok(DecayMode::Power),
            "harris" => Ok(DecayMode::Harris),
            other => Err(format!("unknown decay mode '{other}'")),
        }
    }
}

/// Market access of one settlement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketAccess {
    /// Firm market access.
    pub firm: f64,
    /// Consumer market access.
    pub consumer: f64,
    pub ln_ma: f64,
}

impl MarketAccess {
    fn combine(firm: f64, consumer: f64, beta: f64) -> Self {
        let firm = firm.max(MIN_ACCESS);
        let consumer = consumer.max(MIN_ACCESS);
        Self {
            firm,
            consumer,
            ln_ma: (1.0 - beta) * firm.ln() + beta * consumer.ln(),
        }
    }
}

fn decay(cost: f64, params: &MarketAccessParams, mode: DecayMode) -> f64 {
    let cost = cost.max(params.min_cost);
    match mode {
        DecayMode::Power => (cost + 1.0).powf(-params.theta),
        DecayMode::Harris => 1.0 / cost,
    }
}

/// Compute market access for settlements `ids` with masses `masses`.
///
/// Every ID must be present in `matrix`. Unreachable pairs contribute
/// nothing to the side on which they are unreachable. Results are returned
/// in the order of `ids`.
pub fn compute_market_access(
    matrix: &CostMatrix,
    ids: &[String],
    masses: &[f64],
    params: &MarketAccessParams,
    mode: DecayMode,
) -> Result<Vec<MarketAccess>> {
    if ids.len() != masses.len() {
        return Err(Error::InvalidMatrix {
            message: format!("{} settlements but {} masses", ids.len(), masses.len()),
        });
    }
    let positions: Vec<usize> = ids
        .iter()
        .map(|id| {
            matrix.position(id).ok_or_else(|| Error::InvalidMatrix {
                message: format!("settlement {id} is missing from the cost matrix"),
            })
        })
        .collect::<Result<_>>()?;

    info!(
        settlements = ids.len(),
        mode = %mode,
        theta = params.theta,
        beta = params.beta,
        "calculating market access"
    );
    let progress = Progress::new("market access", ids.len());

    let results: Vec<MarketAccess> = positions
        .par_iter()
        .enumerate()
        .map(|(i, &pi)| {
            let mut firm = 0.0;
            let mut consumer = 0.0;
            for (j, &pj) in positions.iter().enumerate() {
                if i == j {
                    continue;
                }
                if let Some(inbound) = matrix.get(pj, pi) {
                    firm += masses[j] * decay(inbound, params, mode);
                }
                if let Some(outbound) = matrix.get(pi, pj) {
                    consumer += masses[j] * decay(outbound, params, mode);
                }
            }
            progress.tick();
            MarketAccess::combine(firm, consumer, params.beta)
        })
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MarketAccessParams {
        MarketAccessParams {
            theta: 2.0,
            beta: 0.5,
            min_cost: 0.1,
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn power_decay_uses_directional_costs() {
        let matrix = CostMatrix::from_rows(
            ids(&["a", "b"]),
            vec![vec![Some(0.0), Some(1.0)], vec![Some(3.0), Some(0.0)]],
        )
        .unwrap();

        let access = compute_market_access(
            &matrix,
            &ids(&["a", "b"]),
            &[10.0, 20.0],
            &params(),
            DecayMode::Power,
        )
        .unwrap();

        // a: firm uses b -> a (3.0), consumer uses a -> b (1.0).
        assert!((access[0].firm - 20.0 / 16.0).abs() < 1e-12);
        assert!((access[0].consumer - 20.0 / 4.0).abs() < 1e-12);
        let expected = 0.5 * (20.0f64 / 16.0).ln() + 0.5 * (20.0f64 / 4.0).ln();
        assert!((access[0].ln_ma - expected).abs() < 1e-12);
    }

    #[test]
    fn harris_clips_small_costs() {
        let matrix = CostMatrix::from_rows(
            ids(&["a", "b"]),
            vec![vec![Some(0.0), Some(0.01)], vec![Some(0.01), Some(0.0)]],
        )
        .unwrap();

        let access = compute_market_access(
            &matrix,
            &ids(&["a", "b"]),
            &[1.0, 5.0],
            &params(),
            DecayMode::Harris,
        )
        .unwrap();
        assert!((access[0].firm - 50.0).abs() < 1e-9);
        assert!((access[1].consumer - 10.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_pairs_are_floored() {
        let matrix = CostMatrix::from_rows(
            ids(&["a", "b"]),
            vec![vec![Some(0.0), None], vec![None, Some(0.0)]],
        )
        .unwrap();

        let access = compute_market_access(
            &matrix,
            &ids(&["a", "b"]),
            &[1.0, 1.0],
            &params(),
            DecayMode::Power,
        )
        .unwrap();
        assert_eq!(access[0].firm, MIN_ACCESS);
        assert!(access[0].ln_ma.is_finite());
    }

    #[test]
    fn unknown_settlement_is_an_error() {
        let matrix = CostMatrix::from_rows(ids(&["a"]), vec![vec![Some(0.0)]]).unwrap();
        let result =
            compute_market_access(&matrix, &ids(&["z"]), &[1.0], &params(), DecayMode::Power);
        assert!(result.is_err());
    }
}
