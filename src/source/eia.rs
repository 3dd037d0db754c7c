//! EIA history spreadsheet adapter
//!
//! EIA publishes daily series as legacy `.xls` workbooks. The data sheet
//! opens with two banner rows (source key and series description) followed
//! by a `Date` header row, then one row per observation.

use super::{parse_price, HttpFetcher, RecordCollector, SourceAdapter, SourceError};
use crate::config::EiaXlsSourceConfig;
use crate::dataset::TabularRecord;
use async_trait::async_trait;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::NaiveDate;
use std::io::Cursor;
use std::time::Duration;

const BANNER_ROWS: usize = 2;

/// Downloads an EIA daily series workbook
pub struct EiaXlsSource {
    config: EiaXlsSourceConfig,
    http: HttpFetcher,
}

impl EiaXlsSource {
    pub fn new(config: EiaXlsSourceConfig) -> Result<Self, SourceError> {
        let http = HttpFetcher::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl SourceAdapter for EiaXlsSource {
    fn name(&self) -> &str {
        "eia_xls"
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        tracing::info!(url = %self.config.url, "Downloading workbook from EIA");
        self.http.get(&self.config.url, &[]).await
    }

    fn parse(&self, payload: &[u8]) -> Result<Vec<TabularRecord>, SourceError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(payload))?;
        let range = workbook.worksheet_range(&self.config.sheet)?;

        let mut collector = RecordCollector::default();
        for row in range.rows().skip(BANNER_ROWS) {
            let Some(first) = row.first() else {
                continue;
            };
            if is_header_cell(first) {
                continue;
            }

            let date = cell_date(first);
            let price = row.get(1).and_then(cell_price);
            collector.push(date, price);
        }

        collector.finish(self.name())
    }
}

fn is_header_cell(cell: &Data) -> bool {
    matches!(cell, Data::String(s) if s.trim().eq_ignore_ascii_case("date"))
}

/// Excel date cells carry a serial number; some exports use text instead
fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::String(s) => parse_date_text(s.trim()),
        Data::Empty | Data::Error(_) | Data::Bool(_) => None,
        other => other.as_date(),
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    ["%Y-%m-%d", "%b %d, %Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

fn cell_price(cell: &Data) -> Option<f64> {
    match cell {
        Data::Float(f) => Some(*f).filter(|p| p.is_finite()),
        Data::Int(i) => Some(*i as f64),
        Data::String(s) => parse_price(s),
        _ => None,
    }
}
