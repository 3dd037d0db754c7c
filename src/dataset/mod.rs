//! Normalized price observations
//!
//! Every source converges on [`TabularRecord`] before it reaches the merge
//! engine. A [`Dataset`] is the ordered, date-unique collection persisted
//! between runs.

mod history;
mod merge;

pub use history::{HistoryError, HistoryStore};
pub use merge::{merge, merge_with_history, MergeOutcome, MergeResult};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// Column names in persisted and exported order
pub const COLUMNS: [&str; 5] = ["date", "price", "year", "month", "day"];

/// One price observation
///
/// The calendar parts are always derived from `date`; there is no way to
/// construct a record with parts that disagree with it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TabularRecord {
    date: NaiveDate,
    price: f64,
    year: i32,
    month: i8,
    day: i8,
}

impl TabularRecord {
    /// Build a record, rejecting prices that are NaN or infinite
    pub fn new(date: NaiveDate, price: f64) -> Option<Self> {
        if !price.is_finite() {
            return None;
        }

        Some(Self {
            date,
            price,
            year: date.year(),
            // month() is 1..=12 and day() is 1..=31
            month: date.month() as i8,
            day: date.day() as i8,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> i8 {
        self.month
    }

    pub fn day(&self) -> i8 {
        self.day
    }
}

/// Date-unique collection of records, newest first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    records: Vec<TabularRecord>,
}

impl Dataset {
    /// Build a dataset from an arbitrary batch
    ///
    /// The first occurrence of a date wins; the result is sorted descending.
    pub fn from_batch(records: impl IntoIterator<Item = TabularRecord>) -> Self {
        let mut seen = HashSet::new();
        let records = records
            .into_iter()
            .filter(|r| seen.insert(r.date))
            .collect();

        let mut dataset = Self { records };
        dataset.sort_descending();
        dataset
    }

    /// Sort newest first. Stable, so rows sharing a date keep their order.
    pub fn sort_descending(&mut self) {
        self.records.sort_by(|a, b| b.date.cmp(&a.date));
    }

    pub fn records(&self) -> &[TabularRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<TabularRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Set of dates present
    pub fn dates(&self) -> HashSet<NaiveDate> {
        self.records.iter().map(|r| r.date).collect()
    }

    /// Whether records are in strictly descending date order
    pub fn is_sorted_descending(&self) -> bool {
        self.records.windows(2).all(|w| w[0].date > w[1].date)
    }

    /// The `n` oldest records, oldest first
    pub fn oldest(&self, n: usize) -> Vec<TabularRecord> {
        let mut sample: Vec<_> = self.records.clone();
        sample.sort_by_key(|r| r.date);
        sample.truncate(n);
        sample
    }

    /// Range statistics, or `None` for an empty dataset
    pub fn summary(&self, unit: &str) -> Option<DatasetSummary> {
        let first = self.records.iter().map(|r| r.date).min()?;
        let last = self.records.iter().map(|r| r.date).max()?;
        let min_price = self.records.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);
        let max_price = self
            .records
            .iter()
            .map(|r| r.price)
            .fold(f64::NEG_INFINITY, f64::max);

        Some(DatasetSummary {
            rows: self.records.len(),
            first_date: first,
            last_date: last,
            min_price,
            max_price,
            unit: unit.to_string(),
        })
    }

    pub(crate) fn push(&mut self, record: TabularRecord) {
        self.records.push(record);
    }
}

/// Row count and value ranges of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub min_price: f64,
    pub max_price: f64,
    pub unit: String,
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows, {} to {}, price ${:.2} - ${:.2}",
            self.rows, self.first_date, self.last_date, self.min_price, self.max_price
        )?;
        if !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn record(date: &str, price: f64) -> TabularRecord {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    TabularRecord::new(date, price).unwrap()
}
