//! Local CSV adapter
//!
//! Reads a series already downloaded to disk, such as an EIA "Download
//! Data (CSV)" export with `Day` and price columns in `%m/%d/%Y` form.

use super::{parse_price, RecordCollector, SourceAdapter, SourceError};
use crate::config::LocalCsvSourceConfig;
use crate::dataset::TabularRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};

/// CSV file on disk with configurable column names
pub struct LocalCsvSource {
    config: LocalCsvSourceConfig,
}

impl LocalCsvSource {
    pub fn new(config: LocalCsvSourceConfig) -> Self {
        Self { config }
    }

    fn column(&self, headers: &StringRecord, name: &str) -> Result<usize, SourceError> {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| SourceError::MissingColumn(name.to_string()))
    }
}

#[async_trait]
impl SourceAdapter for LocalCsvSource {
    fn name(&self) -> &str {
        "local_csv"
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        tracing::info!(path = ?self.config.path, "Reading local series");
        tokio::fs::read(&self.config.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.config.path.clone(),
                source,
            })
    }

    fn parse(&self, payload: &[u8]) -> Result<Vec<TabularRecord>, SourceError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(payload);

        let headers = rdr.headers()?.clone();
        let date_idx = self.column(&headers, &self.config.date_column)?;
        let price_idx = self.column(&headers, &self.config.price_column)?;

        let mut collector = RecordCollector::default();
        for result in rdr.records() {
            let row = result?;
            let date = row
                .get(date_idx)
                .and_then(|d| NaiveDate::parse_from_str(d, &self.config.date_format).ok());
            let price = row.get(price_idx).and_then(parse_price);
            collector.push(date, price);
        }

        collector.finish(self.name())
    }
}
