//! Persisted history file
//!
//! The history is a plain CSV file rewritten in full on every run. Text
//! carries no types, so loading re-parses each column into its canonical
//! type and recomputes the calendar parts from the date.

use super::{Dataset, TabularRecord};
use crate::export::csv::write_records;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the history file
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("Invalid date {value:?} on line {line}")]
    InvalidDate { line: u64, value: String },
    #[error("Invalid price {value:?} on line {line}")]
    InvalidPrice { line: u64, value: String },
}

/// Location of a dataset's persisted history
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the history
    ///
    /// Returns `Ok(None)` when the file is absent or zero bytes.
    pub fn load(&self) -> Result<Option<Dataset>, HistoryError> {
        let metadata = match fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        if metadata.len() == 0 {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })?;

        read_history(file).map(Some)
    }

    /// Overwrite the history with `dataset`, creating parent directories
    pub fn save(&self, dataset: &Dataset) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = File::create(&self.path).map_err(io_err)?;
        let mut writer = BufWriter::new(file);
        write_records(&mut writer, dataset.records())?;
        writer.flush().map_err(io_err)?;

        tracing::debug!(path = ?self.path, rows = dataset.len(), "Saved history");
        Ok(())
    }
}

/// Parse history CSV text into a dataset
///
/// Header names are matched case-insensitively so files written with
/// capitalized headers still load. Rows are kept in file order; a repeated
/// date keeps its first row.
fn read_history<R: std::io::Read>(input: R) -> Result<Dataset, HistoryError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);

    let headers = rdr.headers()?.clone();
    let date_idx = column_index(&headers, "date")?;
    let price_idx = column_index(&headers, "price")?;

    let mut dataset = Dataset::default();
    let mut seen = HashSet::new();
    let mut duplicates = 0usize;

    for result in rdr.records() {
        let row = result?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let date_text = row.get(date_idx).unwrap_or_default();
        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|_| {
            HistoryError::InvalidDate {
                line,
                value: date_text.to_string(),
            }
        })?;

        let price_text = row.get(price_idx).unwrap_or_default();
        let record = price_text
            .parse::<f64>()
            .ok()
            .and_then(|price| TabularRecord::new(date, price))
            .ok_or_else(|| HistoryError::InvalidPrice {
                line,
                value: price_text.to_string(),
            })?;

        if seen.insert(date) {
            dataset.push(record);
        } else {
            duplicates += 1;
        }
    }

    if duplicates > 0 {
        tracing::warn!(duplicates, "History contained repeated dates; kept first rows");
    }

    Ok(dataset)
}

fn column_index(headers: &StringRecord, name: &'static str) -> Result<usize, HistoryError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or(HistoryError::MissingColumn(name))
}
