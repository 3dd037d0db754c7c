//! Fetch, merge, persist and export one dataset
//!
//! A run is strictly sequential. Fetch and parse failures abort it before
//! anything is written; history and export failures are reported and the
//! run carries on.

mod events;

pub use events::{LogObserver, PipelineEvent, PipelineObserver};

use crate::config::{DatasetConfig, OutputConfig};
use crate::dataset::{merge_with_history, Dataset, DatasetSummary, HistoryStore, MergeOutcome};
use crate::export::{ExportReport, Exporter};
use crate::source::{build_source, SourceAdapter, SourceError};
use crate::telemetry;
use thiserror::Error;

/// Fatal pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Fetch(#[source] SourceError),
    #[error("parse failed: {0}")]
    Parse(#[source] SourceError),
}

/// What a completed run produced
#[derive(Debug)]
pub struct PipelineReport {
    /// Merged dataset as persisted and exported
    pub dataset: Dataset,
    /// Valid records in the fetched batch
    pub fetched: usize,
    /// Summary of the fetched batch
    pub summary: Option<DatasetSummary>,
    pub merge: MergeOutcome,
    pub history_saved: bool,
    pub export: ExportReport,
}

/// One dataset's fetch-merge-export pipeline
pub struct Pipeline {
    name: String,
    unit: String,
    source: Box<dyn SourceAdapter>,
    history: HistoryStore,
    exporter: Exporter,
}

impl Pipeline {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        source: Box<dyn SourceAdapter>,
        history: HistoryStore,
        exporter: Exporter,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            source,
            history,
            exporter,
        }
    }

    /// Build the pipeline for a configured dataset
    pub fn from_config(
        dataset: &DatasetConfig,
        output: &OutputConfig,
    ) -> Result<Self, SourceError> {
        let source = build_source(&dataset.source)?;
        Ok(Self::new(
            dataset.name.clone(),
            dataset.unit.clone(),
            source,
            HistoryStore::new(dataset.history_path(output)),
            Exporter::new(dataset.dataset_dir(output), dataset.name.clone()),
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Run the pipeline once
    pub async fn run(
        &self,
        observer: &mut dyn PipelineObserver,
    ) -> Result<PipelineReport, PipelineError> {
        let mut emit = |event: PipelineEvent| {
            telemetry::record_event(&self.name, &event);
            observer.on_event(&event);
        };

        emit(PipelineEvent::FetchStarted {
            dataset: self.name.clone(),
            source: self.source.name().to_string(),
        });
        let payload = self.source.fetch().await.map_err(PipelineError::Fetch)?;
        emit(PipelineEvent::Fetched {
            dataset: self.name.clone(),
            bytes: payload.len(),
        });

        let records = self.source.parse(&payload).map_err(PipelineError::Parse)?;
        let batch = Dataset::from_batch(records);
        emit(PipelineEvent::Parsed {
            dataset: self.name.clone(),
            records: batch.len(),
        });

        let summary = batch.summary(&self.unit);
        if let Some(summary) = &summary {
            emit(PipelineEvent::Summary {
                dataset: self.name.clone(),
                summary: summary.clone(),
            });
        }

        let fetched = batch.len();
        let merged = merge_with_history(&self.history, batch.into_records());
        let path = self.history.path().to_path_buf();
        match &merged.outcome {
            MergeOutcome::ColdStart => emit(PipelineEvent::HistoryCreated { path: path.clone() }),
            MergeOutcome::Recovered { reason } => emit(PipelineEvent::HistoryRecovered {
                path: path.clone(),
                reason: reason.clone(),
            }),
            MergeOutcome::Appended { added } => {
                emit(PipelineEvent::HistoryLoaded {
                    path: path.clone(),
                    rows: merged.existing_rows,
                });
                emit(PipelineEvent::RecordsAppended {
                    added: *added,
                    total: merged.dataset.len(),
                });
            }
            MergeOutcome::UpToDate => {
                emit(PipelineEvent::HistoryLoaded {
                    path: path.clone(),
                    rows: merged.existing_rows,
                });
                emit(PipelineEvent::HistoryUpToDate {
                    total: merged.dataset.len(),
                });
            }
        }

        let history_saved = match self.history.save(&merged.dataset) {
            Ok(()) => {
                emit(PipelineEvent::HistorySaved {
                    path,
                    rows: merged.dataset.len(),
                });
                true
            }
            Err(e) => {
                emit(PipelineEvent::HistorySaveFailed {
                    path,
                    reason: e.to_string(),
                });
                false
            }
        };

        let export = self.exporter.export_all(&merged.dataset);
        for file in &export.written {
            emit(PipelineEvent::Exported(file.clone()));
        }
        for failure in &export.failed {
            emit(PipelineEvent::ExportFailed {
                format: failure.format,
                path: failure.path.clone(),
                reason: failure.error.to_string(),
            });
        }

        Ok(PipelineReport {
            dataset: merged.dataset,
            fetched,
            summary,
            merge: merged.outcome,
            history_saved,
            export,
        })
    }
}
