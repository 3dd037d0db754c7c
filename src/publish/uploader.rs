//! Per-dataset upload flow: resolve, stage, publish

use super::metadata::{resolve_owner, resolve_slug, DatasetMetadata, OwnerSources};
use super::retry::{Publisher, RetryPolicy};
use super::staging::{collect_files, stage};
use super::{PublishError, PublishResult, PublishSink};
use crate::config::{PublishConfig, PublishDatasetConfig};
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// What an upload did
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// Nothing was sent
    DryRun {
        id: String,
        files: Vec<String>,
        metadata: DatasetMetadata,
        create_if_missing: bool,
    },
    Published { id: String, result: PublishResult },
}

/// Version notes attached to every upload
pub fn version_notes(now: DateTime<Utc>) -> String {
    format!("Auto-update: {}", now.format("%Y-%m-%d %H:%M:%S UTC"))
}

/// Uploads configured datasets through a sink
pub struct Uploader<S: PublishSink> {
    config: PublishConfig,
    root: PathBuf,
    sink: S,
    owners: OwnerSources,
    dry_run: bool,
    confirmed: bool,
}

impl<S: PublishSink> Uploader<S> {
    /// `root` is the directory configured file paths are relative to
    pub fn new(config: PublishConfig, root: impl Into<PathBuf>, sink: S) -> Self {
        Self {
            config,
            root: root.into(),
            sink,
            owners: OwnerSources::default(),
            dry_run: false,
            confirmed: false,
        }
    }

    pub fn with_owner_sources(mut self, owners: OwnerSources) -> Self {
        self.owners = owners;
        self
    }

    /// Prepare everything but make no calls to the sink
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Allow dataset creation without prompting
    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Upload one dataset
    pub async fn upload(
        &self,
        name: &str,
        dataset: &PublishDatasetConfig,
    ) -> Result<UploadOutcome, PublishError> {
        let files = collect_files(&self.root, &dataset.files);
        if files.is_empty() {
            return Err(PublishError::NoFiles(name.to_string()));
        }

        let owner = resolve_owner(dataset, &self.config, &self.owners)
            .ok_or_else(|| PublishError::OwnerUnknown(name.to_string()))?;
        let slug =
            resolve_slug(dataset).ok_or_else(|| PublishError::MissingSlug(name.to_string()))?;

        let configured: Vec<String> = files.iter().map(|(file, _)| file.clone()).collect();
        let resolved: Vec<PathBuf> = files.into_iter().map(|(_, path)| path).collect();
        let mut metadata = DatasetMetadata::build(name, dataset, &owner, &slug, &configured);
        let id = metadata.id.clone();

        let image = dataset.image.as_ref().map(|p| self.root.join(p)).filter(|p| {
            let exists = p.is_file();
            if !exists {
                tracing::warn!(image = ?p, "Image not found, skipping");
            }
            exists
        });

        let staged = stage(&resolved, image.as_deref(), &mut metadata)?;
        let create_if_missing = dataset.create_if_missing || self.config.create_if_missing;

        if self.dry_run {
            tracing::info!(
                dataset = %name,
                id = %id,
                files = staged.files().len(),
                create_if_missing,
                "Dry run, skipping upload"
            );
            return Ok(UploadOutcome::DryRun {
                id,
                files: staged.files().to_vec(),
                metadata,
                create_if_missing,
            });
        }

        tracing::info!(dataset = %name, id = %id, "Uploading dataset version");

        let result = Publisher::new(&self.sink, name, RetryPolicy::from(&self.config.retry))
            .create_if_missing(create_if_missing)
            .confirmed(self.confirmed)
            .public(self.config.is_public)
            .publish(staged.dir(), &version_notes(Utc::now()))
            .await?;

        match &result {
            PublishResult::VersionCreated(message) => {
                tracing::info!(
                    dataset = %name,
                    id = %id,
                    message = %message,
                    "Dataset version created"
                )
            }
            PublishResult::DatasetCreated(message) => {
                tracing::info!(dataset = %name, id = %id, message = %message, "Dataset created")
            }
        }

        Ok(UploadOutcome::Published { id, result })
    }
}
