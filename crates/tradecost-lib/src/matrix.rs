//! All-pairs settlement cost matrix.
//!
//! One shortest-path search runs per origin settlement over the composed,
//! annotated and transfer-augmented graph. Searches are independent and run on
//! the rayon pool; each writes only its own matrix row.
//!
//! Cell `(a, b)` holds the normalized cost of shipping from `a` to `b`:
//!
//! - diagonal cells are `0.0` by definition;
//! - freight mode: `path_cost / shipment_value`, plus the destination tariff
//!   when the two settlements are in different regions;
//! - time mode: the raw path cost in hours;
//! - unreachable destinations are `None` in memory and are written as
//!   [`UNREACHABLE_SENTINEL`].

use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::{CostMode, ModelConfig};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::path::{ensure_annotated, single_source_costs};
use crate::progress::Progress;
use crate::settlements::Settlement;

/// Value written to disk for an unreachable origin/destination pair.
///
/// Negative border costs can, in principle, produce a reachable cell of
/// exactly `-1.0`. Such a cell is indistinguishable from the sentinel once
/// written and reads back as unreachable; [`CostMatrix::save`] warns when it
/// happens.
pub const UNREACHABLE_SENTINEL: f64 = -1.0;

/// Square matrix of normalized costs keyed by settlement ID.
#[derive(Debug, Clone, PartialEq)]
pub struct CostMatrix {
    ids: Vec<String>,
    cells: Vec<Option<f64>>,
    positions: HashMap<String, usize>,
}

impl CostMatrix {
    /// Build a matrix from row-major cells.
    pub fn from_rows(ids: Vec<String>, rows: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let n = ids.len();
        if rows.len() != n || rows.iter().any(|row| row.len() != n) {
            return Err(Error::InvalidMatrix {
                message: format!("expected a {n}x{n} matrix"),
            });
        }
        let positions: HashMap<String, usize> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();
        if positions.len() != n {
            return Err(Error::InvalidMatrix {
                message: "duplicate settlement ids".to_string(),
            });
        }
        Ok(Self {
            ids,
            cells: rows.into_iter().flatten().collect(),
            positions,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Cost from row `origin` to column `destination`; `None` if unreachable.
    pub fn get(&self, origin: usize, destination: usize) -> Option<f64> {
        self.cells[origin * self.ids.len() + destination]
    }

    /// Cost between two settlement IDs; the outer `None` means an unknown ID.
    pub fn get_by_id(&self, origin: &str, destination: &str) -> Option<Option<f64>> {
        Some(self.get(self.position(origin)?, self.position(destination)?))
    }

    pub fn row(&self, origin: usize) -> &[Option<f64>] {
        let n = self.ids.len();
        &self.cells[origin * n..(origin + 1) * n]
    }

    pub fn unreachable_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    /// Reachable cells whose cost equals [`UNREACHABLE_SENTINEL`].
    pub fn sentinel_collisions(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| **cell == Some(UNREACHABLE_SENTINEL))
            .count()
    }

    /// Write as CSV: empty corner cell, IDs across the header, one row per origin.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = WriterBuilder::new().from_writer(writer);
        let mut header = Vec::with_capacity(self.ids.len() + 1);
        header.push(String::new());
        header.extend(self.ids.iter().cloned());
        csv.write_record(&header)?;

        for (i, id) in self.ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.ids.len() + 1);
            record.push(id.clone());
            record.extend(
                self.row(i)
                    .iter()
                    .map(|cell| cell.unwrap_or(UNREACHABLE_SENTINEL).to_string()),
            );
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let collisions = self.sentinel_collisions();
        if collisions > 0 {
            warn!(
                collisions,
                sentinel = UNREACHABLE_SENTINEL,
                "reachable costs equal the unreachable sentinel and will read back as unreachable"
            );
        }
        self.write_to(File::create(path)?)?;
        info!(path = %path.display(), size = self.len(), "cost matrix written");
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = ReaderBuilder::new().has_headers(false).from_reader(reader);
        let mut records = csv.records();

        let header = records.next().transpose()?.ok_or_else(|| Error::InvalidMatrix {
            message: "missing header row".to_string(),
        })?;
        let ids: Vec<String> = header.iter().skip(1).map(|s| s.trim().to_string()).collect();

        let mut rows = Vec::with_capacity(ids.len());
        let mut row_ids = Vec::with_capacity(ids.len());
        for (offset, record) in records.enumerate() {
            let record = record?;
            let line = offset + 2;
            row_ids.push(record.get(0).unwrap_or_default().trim().to_string());
            let row = record
                .iter()
                .skip(1)
                .map(|raw| -> Result<Option<f64>> {
                    let value: f64 = raw.trim().parse().map_err(|e| Error::InvalidMatrix {
                        message: format!("line {line}: invalid cost '{raw}': {e}"),
                    })?;
                    Ok((value != UNREACHABLE_SENTINEL).then_some(value))
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        if row_ids != ids {
            return Err(Error::InvalidMatrix {
                message: "row IDs do not match column IDs".to_string(),
            });
        }
        Self::from_rows(ids, rows)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let matrix = Self::from_reader(File::open(path)?)?;
        info!(path = %path.display(), size = matrix.len(), "read cost matrix");
        Ok(matrix)
    }
}

/// Compute the settlement cost matrix over a fully prepared graph.
///
/// Every settlement must already be matched (`nearest_any`) to a node of
/// `graph`, and every edge must carry a cost.
pub fn compute_cost_matrix(
    graph: &Graph,
    settlements: &[Settlement],
    config: &ModelConfig,
) -> Result<CostMatrix> {
    ensure_annotated(graph)?;

    let nodes: Vec<NodeId> = settlements
        .iter()
        .map(|settlement| {
            let node = settlement
                .nearest_any
                .as_ref()
                .ok_or_else(|| Error::UnmatchedSettlement {
                    id: settlement.id.clone(),
                })?;
            graph.node_id(node).ok_or_else(|| Error::NodeNotInGraph {
                node: node.to_string(),
            })
        })
        .collect::<Result<_>>()?;

    let tariffs = destination_tariffs(settlements, config)?;

    info!(
        settlements = settlements.len(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        mode = %config.mode,
        "calculating cost matrix"
    );
    let progress = Progress::new("cost matrix", settlements.len());

    let rows: Vec<Vec<Option<f64>>> = settlements
        .par_iter()
        .enumerate()
        .map(|(i, origin)| {
            let costs = single_source_costs(graph, nodes[i]);
            let row = settlements
                .iter()
                .enumerate()
                .map(|(j, destination)| {
                    if i == j {
                        return Some(0.0);
                    }
                    let raw = costs[nodes[j]];
                    if !raw.is_finite() {
                        return None;
                    }
                    Some(match config.mode {
                        CostMode::Time => raw,
                        CostMode::Freight => {
                            let transport = raw / config.shipment_value;
                            if origin.region == destination.region {
                                transport
                            } else {
                                transport + tariffs[j]
                            }
                        }
                    })
                })
                .collect();
            progress.tick();
            row
        })
        .collect();

    let ids = settlements.iter().map(|s| s.id.clone()).collect();
    let matrix = CostMatrix::from_rows(ids, rows)?;

    let unreachable = matrix.unreachable_count();
    if unreachable > 0 {
        warn!(unreachable, "some settlement pairs are unreachable");
    }
    Ok(matrix)
}

/// Tariff of each settlement's region as a destination.
///
/// Only needed (and only required to exist) in freight mode when the
/// settlements span more than one region.
fn destination_tariffs(settlements: &[Settlement], config: &ModelConfig) -> Result<Vec<f64>> {
    let regions: BTreeSet<_> = settlements.iter().map(|s| &s.region).collect();
    if config.mode == CostMode::Time || regions.len() < 2 {
        return Ok(vec![0.0; settlements.len()]);
    }
    settlements
        .iter()
        .map(|settlement| config.tariffs.rate(&settlement.region))
        .collect()
}
