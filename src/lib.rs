//! commodity-feeds: daily commodity price feeds
//!
//! This library provides the core components for:
//! - Fetching FRED and EIA price series
//! - Incremental merge into a CSV history keyed by date
//! - Export to CSV, JSON and Parquet
//! - Publishing exported files as a hosted dataset
//! - Structured logging and batch-job metrics

pub mod cli;
pub mod config;
pub mod dataset;
pub mod export;
pub mod pipeline;
pub mod publish;
pub mod source;
pub mod telemetry;
