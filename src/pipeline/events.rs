//! Structured progress events
//!
//! The pipeline reports every stage through a [`PipelineObserver`] instead of
//! printing, so runs can be observed in tests without capturing stdout.

use crate::dataset::DatasetSummary;
use crate::export::{ExportFormat, ExportedFile};
use std::path::PathBuf;

/// A pipeline stage result
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    FetchStarted { dataset: String, source: String },
    Fetched { dataset: String, bytes: usize },
    Parsed { dataset: String, records: usize },
    Summary { dataset: String, summary: DatasetSummary },
    HistoryLoaded { path: PathBuf, rows: usize },
    HistoryCreated { path: PathBuf },
    HistoryRecovered { path: PathBuf, reason: String },
    RecordsAppended { added: usize, total: usize },
    HistoryUpToDate { total: usize },
    HistorySaved { path: PathBuf, rows: usize },
    HistorySaveFailed { path: PathBuf, reason: String },
    Exported(ExportedFile),
    ExportFailed { format: ExportFormat, path: PathBuf, reason: String },
}

/// Receives pipeline events
pub trait PipelineObserver {
    fn on_event(&mut self, event: &PipelineEvent);
}

/// Collects events, mostly for tests
impl PipelineObserver for Vec<PipelineEvent> {
    fn on_event(&mut self, event: &PipelineEvent) {
        self.push(event.clone());
    }
}

/// Reports events as log lines
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PipelineObserver for LogObserver {
    fn on_event(&mut self, event: &PipelineEvent) {
        match event {
            PipelineEvent::FetchStarted { dataset, source } => {
                tracing::info!(dataset = %dataset, source = %source, "Fetching");
            }
            PipelineEvent::Fetched { dataset, bytes } => {
                tracing::info!(dataset = %dataset, bytes, "Data downloaded");
            }
            PipelineEvent::Parsed { dataset, records } => {
                tracing::info!(dataset = %dataset, records, "Payload parsed");
            }
            PipelineEvent::Summary { dataset, summary } => {
                tracing::info!(dataset = %dataset, "Fetched {}", summary);
            }
            PipelineEvent::HistoryLoaded { path, rows } => {
                tracing::info!(path = ?path, rows, "Existing history loaded");
            }
            PipelineEvent::HistoryCreated { path } => {
                tracing::info!(path = ?path, "Creating new history");
            }
            PipelineEvent::HistoryRecovered { path, reason } => {
                tracing::warn!(
                    path = ?path,
                    reason = %reason,
                    "Existing history unreadable, creating new dataset from downloaded data"
                );
            }
            PipelineEvent::RecordsAppended { added, total } => {
                tracing::info!(added, total, "Added new records");
            }
            PipelineEvent::HistoryUpToDate { total } => {
                tracing::info!(total, "No new records, data is up to date");
            }
            PipelineEvent::HistorySaved { path, rows } => {
                tracing::info!(path = ?path, rows, "History saved");
            }
            PipelineEvent::HistorySaveFailed { path, reason } => {
                tracing::error!(path = ?path, reason = %reason, "Failed to save history");
            }
            PipelineEvent::Exported(file) => {
                tracing::info!(
                    format = %file.format,
                    path = ?file.path,
                    rows = file.rows,
                    bytes = file.bytes,
                    "Exported"
                );
            }
            PipelineEvent::ExportFailed {
                format,
                path,
                reason,
            } => {
                tracing::error!(format = %format, path = ?path, reason = %reason, "Export failed");
            }
        }
    }
}
