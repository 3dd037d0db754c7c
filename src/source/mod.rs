//! Source adapters
//!
//! Each adapter fetches a raw payload and parses it into validated
//! [`TabularRecord`]s. Rows without a real calendar date or a finite price
//! are dropped here and never reach the merge engine.

mod eia;
mod fred;
mod http;
mod local;

pub use eia::EiaXlsSource;
pub use fred::FredCsvSource;
pub use http::HttpFetcher;
pub use local::LocalCsvSource;

use crate::config::SourceConfig;
use crate::dataset::TabularRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Fetch and parse errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("Missing column: {0}")]
    MissingColumn(String),
    #[error("No valid records in {0} payload")]
    NoRecords(String),
}

/// Trait for price source implementations
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;
    /// Retrieve the raw payload
    async fn fetch(&self) -> Result<Vec<u8>, SourceError>;
    /// Turn a payload into validated records
    fn parse(&self, payload: &[u8]) -> Result<Vec<TabularRecord>, SourceError>;
}

/// Build the adapter described by `config`
pub fn build_source(config: &SourceConfig) -> Result<Box<dyn SourceAdapter>, SourceError> {
    Ok(match config {
        SourceConfig::FredCsv(c) => Box::new(FredCsvSource::new(c.clone())?),
        SourceConfig::EiaXls(c) => Box::new(EiaXlsSource::new(c.clone())?),
        SourceConfig::LocalCsv(c) => Box::new(LocalCsvSource::new(c.clone())),
    })
}

/// Parse a price cell, rejecting blanks, placeholders and non-finite values
pub(crate) fn parse_price(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

/// Collects valid rows and counts the rest
#[derive(Debug, Default)]
pub(crate) struct RecordCollector {
    records: Vec<TabularRecord>,
    dropped: usize,
}

impl RecordCollector {
    pub(crate) fn push(&mut self, date: Option<NaiveDate>, price: Option<f64>) {
        match date.zip(price).and_then(|(d, p)| TabularRecord::new(d, p)) {
            Some(record) => self.records.push(record),
            None => self.dropped += 1,
        }
    }

    /// Finish collection; an empty result is an error
    pub(crate) fn finish(self, source: &str) -> Result<Vec<TabularRecord>, SourceError> {
        if self.dropped > 0 {
            tracing::debug!(source, dropped = self.dropped, "Dropped invalid rows");
        }
        if self.records.is_empty() {
            return Err(SourceError::NoRecords(source.to_string()));
        }
        Ok(self.records)
    }
}
