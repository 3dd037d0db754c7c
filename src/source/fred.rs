//! FRED graph CSV adapter
//!
//! `fredgraph.csv` returns two columns: the observation date (headed
//! `observation_date`, or `DATE` in older exports) and the series value
//! headed by the series id. Missing observations appear as `.` or blank.

use super::{parse_price, HttpFetcher, RecordCollector, SourceAdapter, SourceError};
use crate::config::FredSourceConfig;
use crate::dataset::TabularRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::time::Duration;

/// Downloads one FRED series as CSV
pub struct FredCsvSource {
    config: FredSourceConfig,
    http: HttpFetcher,
}

impl FredCsvSource {
    pub fn new(config: FredSourceConfig) -> Result<Self, SourceError> {
        let http = HttpFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    /// Query parameters: configured extras plus the series id
    pub fn query(&self) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = self
            .config
            .query
            .iter()
            .filter(|(k, _)| k.as_str() != "id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        query.push(("id".to_string(), self.config.series_id.clone()));
        query
    }

    fn locate_columns(&self, headers: &StringRecord) -> (usize, usize) {
        let date_idx = headers
            .iter()
            .position(|h| {
                h.eq_ignore_ascii_case("observation_date") || h.eq_ignore_ascii_case("date")
            })
            .unwrap_or(0);
        let price_idx = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(&self.config.series_id))
            .unwrap_or(if date_idx == 0 { 1 } else { 0 });
        (date_idx, price_idx)
    }
}

#[async_trait]
impl SourceAdapter for FredCsvSource {
    fn name(&self) -> &str {
        "fred_csv"
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        tracing::info!(series = %self.config.series_id, "Downloading series from FRED");
        self.http.get(&self.config.url, &self.query()).await
    }

    fn parse(&self, payload: &[u8]) -> Result<Vec<TabularRecord>, SourceError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(payload);

        let headers = rdr.headers()?.clone();
        if headers.len() < 2 {
            return Err(SourceError::MissingColumn(self.config.series_id.clone()));
        }
        let (date_idx, price_idx) = self.locate_columns(&headers);

        let mut collector = RecordCollector::default();
        for result in rdr.records() {
            let row = result?;
            let date = row
                .get(date_idx)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            let price = row.get(price_idx).and_then(parse_price);
            collector.push(date, price);
        }

        collector.finish(self.name())
    }
}
