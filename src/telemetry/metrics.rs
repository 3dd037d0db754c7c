//! Prometheus metrics
//!
//! Counters are derived from pipeline and publish events. A batch job has no
//! scrape endpoint, so the rendered exposition text is written to a file for
//! a textfile collector at the end of the run.

use crate::pipeline::PipelineEvent;
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Installed recorder plus where to write its output
pub struct MetricsTextfile {
    handle: PrometheusHandle,
    path: PathBuf,
}

impl MetricsTextfile {
    /// Install the global Prometheus recorder
    pub fn install(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("Failed to install metrics recorder: {}", e))?;

        Ok(Self {
            handle,
            path: path.into(),
        })
    }

    /// Render current metrics to the text file
    pub fn write(&self) -> anyhow::Result<()> {
        write_atomically(&self.path, &self.handle.render())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Write via a temp file in the same directory so collectors never read a
/// partial file. The temp file is removed if the write fails.
fn write_atomically(path: &Path, contents: &str) -> anyhow::Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            parent
        }
        None => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Update counters for a pipeline event
pub fn record_event(dataset: &str, event: &PipelineEvent) {
    let dataset = dataset.to_string();
    match event {
        PipelineEvent::Parsed { records, .. } => {
            counter!("commodity_records_fetched_total", "dataset" => dataset)
                .increment(*records as u64);
        }
        PipelineEvent::RecordsAppended { added, .. } => {
            counter!("commodity_records_appended_total", "dataset" => dataset)
                .increment(*added as u64);
        }
        PipelineEvent::HistoryRecovered { .. } => {
            counter!("commodity_history_recoveries_total", "dataset" => dataset).increment(1);
        }
        PipelineEvent::HistorySaveFailed { .. } => {
            counter!("commodity_history_save_failures_total", "dataset" => dataset).increment(1);
        }
        PipelineEvent::Exported(file) => {
            counter!(
                "commodity_exports_total",
                "dataset" => dataset,
                "format" => file.format.as_str(),
                "status" => "success"
            )
            .increment(1);
        }
        PipelineEvent::ExportFailed { format, .. } => {
            counter!(
                "commodity_exports_total",
                "dataset" => dataset,
                "format" => format.as_str(),
                "status" => "failed"
            )
            .increment(1);
        }
        _ => {}
    }
}

/// Count one publish attempt and its outcome
pub fn record_publish_attempt(dataset: &str, outcome: &'static str) {
    counter!(
        "commodity_publish_attempts_total",
        "dataset" => dataset.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
