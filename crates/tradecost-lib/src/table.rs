//! Shared helpers for reading CSV tables with tolerant headers.

use std::collections::BTreeMap;
use std::io::Read;

use csv::{Reader, ReaderBuilder, StringRecord, Trim};

use crate::error::{Error, Result};

/// Normalize a header string for robust matching.
pub(crate) fn normalize_header(header: &str) -> String {
    header
        .to_ascii_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Open a CSV reader with trimmed fields.
pub(crate) fn csv_reader<R: Read>(reader: R) -> Reader<R> {
    ReaderBuilder::new().trim(Trim::Fields).from_reader(reader)
}

/// Mapping of canonical column names to header positions.
#[derive(Debug, Clone)]
pub(crate) struct ColumnMap {
    table: String,
    headers: StringRecord,
    index: BTreeMap<&'static str, usize>,
}

impl ColumnMap {
    /// Resolve canonical columns from a header row using synonym lists.
    pub(crate) fn resolve(
        table: &str,
        headers: &StringRecord,
        synonyms: &[(&'static str, &[&str])],
    ) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let mut index = BTreeMap::new();

        for (canon, alts) in synonyms {
            'outer: for alt in *alts {
                let alt_n = normalize_header(alt);
                for (i, header) in normalized.iter().enumerate() {
                    if *header == alt_n {
                        index.insert(*canon, i);
                        break 'outer;
                    }
                }
            }
        }

        Self {
            table: table.to_string(),
            headers: headers.clone(),
            index,
        }
    }

    pub(crate) fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub(crate) fn has(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    /// Fail unless every listed column was found.
    pub(crate) fn require(&self, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|column| !self.has(column)) {
            Some(missing) => Err(Error::MissingColumn {
                table: self.table.clone(),
                column: missing.to_string(),
                available: self
                    .headers
                    .iter()
                    .map(|h| h.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            None => Ok(()),
        }
    }

    /// Raw cell value, `None` when the column is absent or the cell is empty.
    pub(crate) fn get<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.position(column)
            .and_then(|i| record.get(i))
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn get_str(&self, record: &StringRecord, column: &str, row: u64) -> Result<String> {
        self.get(record, column)
            .map(str::to_string)
            .ok_or_else(|| self.invalid(row, format!("missing {column}")))
    }

    pub(crate) fn get_f64(&self, record: &StringRecord, column: &str, row: u64) -> Result<f64> {
        let raw = self
            .get(record, column)
            .ok_or_else(|| self.invalid(row, format!("missing {column}")))?;
        raw.parse::<f64>()
            .map_err(|e| self.invalid(row, format!("invalid {column} '{raw}': {e}")))
    }

    pub(crate) fn invalid(&self, row: u64, message: String) -> Error {
        Error::InvalidValue {
            table: self.table.clone(),
            row,
            message,
        }
    }
}
