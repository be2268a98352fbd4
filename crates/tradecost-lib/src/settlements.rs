//! Settlement table: read once, enriched with matched nodes, persisted back.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use csv::WriterBuilder;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::{NodeKey, RegionId};
use crate::table::{csv_reader, normalize_header, ColumnMap};

pub const NEAREST_ROAD_COLUMN: &str = "nearest_road";
pub const NEAREST_SEA_COLUMN: &str = "nearest_sea";
pub const NEAREST_ANY_COLUMN: &str = "nearest_any";

const MATCH_COLUMNS: [&str; 3] = [NEAREST_ROAD_COLUMN, NEAREST_SEA_COLUMN, NEAREST_ANY_COLUMN];
const TABLE_NAME: &str = "settlement table";

/// One settlement row.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub region: RegionId,
    pub nearest_road: Option<NodeKey>,
    pub nearest_sea: Option<NodeKey>,
    /// Node used as the routing origin/destination.
    pub nearest_any: Option<NodeKey>,
    /// Raw values of every non-match column, aligned with the table headers.
    values: Vec<String>,
}

impl Settlement {
    pub fn new(id: impl Into<String>, x: f64, y: f64, region: impl Into<RegionId>) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            region: region.into(),
            nearest_road: None,
            nearest_sea: None,
            nearest_any: None,
            values: Vec::new(),
        }
    }

    pub fn point(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    pub fn is_matched(&self) -> bool {
        self.nearest_road.is_some() && self.nearest_any.is_some()
    }
}

/// Settlement rows plus the headers needed to write them back unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettlementTable {
    headers: Vec<String>,
    pub rows: Vec<Settlement>,
}

impl SettlementTable {
    /// Build a table from rows alone (headers `id,X,Y,iso3`).
    pub fn from_rows(rows: Vec<Settlement>) -> Self {
        let headers = ["ORIG_FID", "X", "Y", "iso3"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.values = vec![
                    row.id.clone(),
                    format!("{:?}", row.x),
                    format!("{:?}", row.y),
                    row.region.to_string(),
                ];
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let table = Self::from_reader(File::open(path)?)?;
        info!(path = %path.display(), settlements = table.rows.len(), "read settlements");
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv_reader(reader);
        let raw_headers = csv.headers()?.clone();
        let columns = ColumnMap::resolve(
            TABLE_NAME,
            &raw_headers,
            &[
                ("id", &["ORIG_FID", "id", "settlement_id", "city_id"]),
                ("x", &["X", "lon", "longitude"]),
                ("y", &["Y", "lat", "latitude"]),
                ("region", &["iso3", "region", "country"]),
                (NEAREST_ROAD_COLUMN, &[NEAREST_ROAD_COLUMN]),
                (NEAREST_SEA_COLUMN, &[NEAREST_SEA_COLUMN]),
                (NEAREST_ANY_COLUMN, &[NEAREST_ANY_COLUMN]),
            ],
        );
        columns.require(&["id", "x", "y", "region"])?;

        let match_positions: Vec<usize> = MATCH_COLUMNS
            .iter()
            .filter_map(|column| columns.position(column))
            .collect();
        let kept: Vec<usize> = (0..raw_headers.len())
            .filter(|i| !match_positions.contains(i))
            .collect();
        let headers = kept.iter().map(|&i| raw_headers[i].to_string()).collect();

        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for (offset, record) in csv.records().enumerate() {
            let record = record?;
            let row = offset as u64 + 2;
            let id = columns.get_str(&record, "id", row)?;
            if !seen.insert(id.clone()) {
                return Err(columns.invalid(row, format!("duplicate settlement id '{id}'")));
            }

            let node = |column: &str| -> Result<Option<NodeKey>> {
                columns
                    .get(&record, column)
                    .map(str::parse::<NodeKey>)
                    .transpose()
            };

            rows.push(Settlement {
                x: columns.get_f64(&record, "x", row)?,
                y: columns.get_f64(&record, "y", row)?,
                region: RegionId::new(columns.get_str(&record, "region", row)?),
                nearest_road: node(NEAREST_ROAD_COLUMN)?,
                nearest_sea: node(NEAREST_SEA_COLUMN)?,
                nearest_any: node(NEAREST_ANY_COLUMN)?,
                values: kept
                    .iter()
                    .map(|&i| record.get(i).unwrap_or_default().to_string())
                    .collect(),
                id,
            });
        }

        Ok(Self { headers, rows })
    }

    /// True when every row carries persisted matches.
    pub fn has_matches(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(Settlement::is_matched)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.rows.iter().map(|row| row.id.clone()).collect()
    }

    /// Numeric values of the first column matching one of `names`.
    pub fn numeric_column(&self, names: &[&str]) -> Result<Vec<f64>> {
        let wanted: Vec<String> = names.iter().map(|n| normalize_header(n)).collect();
        let position = self
            .headers
            .iter()
            .position(|h| wanted.contains(&normalize_header(h)))
            .ok_or_else(|| Error::MissingColumn {
                table: TABLE_NAME.to_string(),
                column: names.first().copied().unwrap_or_default().to_string(),
                available: self.headers.join(", "),
            })?;

        self.rows
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                let raw = row.values.get(position).map(String::as_str).unwrap_or("");
                raw.trim().parse::<f64>().map_err(|e| Error::InvalidValue {
                    table: TABLE_NAME.to_string(),
                    row: offset as u64 + 2,
                    message: format!("invalid {} '{raw}': {e}", self.headers[position]),
                })
            })
            .collect()
    }

    /// Append a column, replacing an existing one with the same name.
    pub fn set_column(&mut self, name: &str, values: &[String]) {
        let position = match self.headers.iter().position(|h| h == name) {
            Some(position) => position,
            None => {
                self.headers.push(name.to_string());
                self.headers.len() - 1
            }
        };
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.resize(self.headers.len(), String::new());
            row.values[position] = value.clone();
        }
    }

    /// Write the table with match columns appended.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = WriterBuilder::new().from_writer(writer);
        let mut header: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        header.extend(MATCH_COLUMNS);
        csv.write_record(&header)?;

        let render =
            |node: &Option<NodeKey>| node.as_ref().map(NodeKey::to_string).unwrap_or_default();
        for row in &self.rows {
            let mut record: Vec<String> = row.values.clone();
            record.resize(self.headers.len(), String::new());
            record.push(render(&row.nearest_road));
            record.push(render(&row.nearest_sea));
            record.push(render(&row.nearest_any));
            csv.write_record(&record)?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.write_to(File::create(path)?)?;
        debug!(path = %path.display(), rows = self.rows.len(), "saved settlements");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_synonym_headers_and_keeps_extra_columns() {
        let csv = "id,lon,lat,country,GDP\na,1.5,2.5,AAA,100\nb,3,4,BBB,50\n";
        let table = SettlementTable::from_reader(csv.as_bytes()).expect("parse");

        assert_eq!(table.ids(), vec!["a", "b"]);
        assert_eq!(table.rows[1].region, RegionId::new("BBB"));
        assert!(!table.has_matches());
        assert_eq!(table.numeric_column(&["GDP"]).unwrap(), vec![100.0, 50.0]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let csv = "ORIG_FID,X,Y,iso3\n1,0,0,AAA\n1,1,1,AAA\n";
        assert!(SettlementTable::from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn set_column_replaces_existing() {
        let mut table = SettlementTable::from_rows(vec![Settlement::new("a", 0.0, 0.0, "AAA")]);
        table.set_column("score", &["1".to_string()]);
        table.set_column("score", &["2".to_string()]);

        let mut out = Vec::new();
        table.write_to(&mut out).expect("write");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("ORIG_FID,X,Y,iso3,score,nearest_road"));
        assert!(text.contains(",2,"));
    }
}
