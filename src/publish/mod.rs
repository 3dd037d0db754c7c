//! Dataset publishing
//!
//! Exported files are staged with a `dataset-metadata.json` document and
//! handed to a [`PublishSink`]. The sink reports a typed [`SinkOutcome`]
//! which the [`Publisher`] retry loop consumes.

mod kaggle;
mod metadata;
mod retry;
mod staging;
mod uploader;

pub use kaggle::{classify_client_output, filter_client_stderr, KaggleCliSink};
pub use metadata::{
    map_license, resolve_owner, resolve_slug, DatasetMetadata, License, OwnerSources, Resource,
    ResourceSchema, SchemaField,
};
pub use retry::{Publisher, RetryPolicy};
pub use staging::{collect_files, stage, StagedUpload, METADATA_FILE};
pub use uploader::{version_notes, UploadOutcome, Uploader};

use crate::config::{PublishConfig, PublishDatasetConfig};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result of one sink call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Accepted; carries the service's version or status message
    Published(String),
    /// Transient server-side condition worth retrying
    Retryable(String),
    /// Remote dataset missing or not accessible; creation may help
    NeedsCreation(String),
    /// Anything else
    Fatal(String),
}

impl SinkOutcome {
    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SinkOutcome::Published(_) => "published",
            SinkOutcome::Retryable(_) => "retryable",
            SinkOutcome::NeedsCreation(_) => "needs_creation",
            SinkOutcome::Fatal(_) => "fatal",
        }
    }
}

/// Trait for dataset hosting implementations
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Upload `folder` as a new version of an existing dataset
    async fn create_version(&self, folder: &Path, notes: &str) -> SinkOutcome;
    /// Create the dataset from `folder`
    async fn create_dataset(&self, folder: &Path, public: bool) -> SinkOutcome;
}

/// How a publish succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishResult {
    VersionCreated(String),
    DatasetCreated(String),
}

/// Publish errors
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Dataset not configured for publishing: {0}")]
    UnknownDataset(String),
    #[error("No enabled datasets found")]
    NoEnabledDatasets,
    #[error("No valid files found for upload of {0}")]
    NoFiles(String),
    #[error(
        "Could not determine owner for {0}; set kaggle_owner, publish.owner or KAGGLE_USERNAME"
    )]
    OwnerUnknown(String),
    #[error("No kaggle_slug or kaggle_dataset configured for {0}")]
    MissingSlug(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Upload failed after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },
    #[error("Remote dataset not found and creation is disabled: {0}")]
    NotFound(String),
    #[error("Dataset creation required but not confirmed; re-run with --yes to allow creation")]
    CreationNotConfirmed,
    #[error("Failed to create dataset: {reason} (original error: {original})")]
    CreationFailed { reason: String, original: String },
    #[error("Upload rejected: {0}")]
    Rejected(String),
}

impl PublishError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Pick the datasets to publish: the named one, or every enabled one
pub fn select_datasets<'a>(
    config: &'a PublishConfig,
    name: Option<&str>,
) -> Result<Vec<(&'a str, &'a PublishDatasetConfig)>, PublishError> {
    let selected: Vec<_> = match name {
        Some(name) => {
            let (key, dataset) = config
                .datasets
                .get_key_value(name)
                .ok_or_else(|| PublishError::UnknownDataset(name.to_string()))?;
            vec![(key.as_str(), dataset)]
        }
        None => config
            .datasets
            .iter()
            .filter(|(_, d)| d.enabled)
            .map(|(k, d)| (k.as_str(), d))
            .collect(),
    };

    if selected.is_empty() {
        return Err(PublishError::NoEnabledDatasets);
    }
    Ok(selected)
}
