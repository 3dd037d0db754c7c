//! Publish command implementation

use super::fetch::run_dataset;
use crate::config::{Config, PublishDatasetConfig};
use crate::publish::{
    select_datasets, KaggleCliSink, OwnerSources, PublishResult, UploadOutcome, Uploader,
};
use clap::Args;

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Publish only this dataset
    #[arg(short, long)]
    pub dataset: Option<String>,

    /// Stage files and metadata without uploading
    #[arg(long)]
    pub dry_run: bool,

    /// Allow creating datasets that do not exist yet
    #[arg(short, long)]
    pub yes: bool,
}

impl PublishArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let selected = select_datasets(&config.publish, self.dataset.as_deref())?;

        let sink = KaggleCliSink::new(config.publish.kaggle_bin.clone(), config.publish.quiet);
        let uploader = Uploader::new(config.publish.clone(), config.output.root.clone(), sink)
            .with_owner_sources(OwnerSources::from_env())
            .dry_run(self.dry_run)
            .confirmed(self.yes);

        let mut failed = Vec::new();
        for (name, dataset) in &selected {
            if let Err(e) = refresh(config, name, dataset).await {
                tracing::error!(
                    dataset = %name,
                    error = %format!("{:#}", e),
                    "Refresh failed, skipping upload"
                );
                failed.push(*name);
                continue;
            }

            match uploader.upload(name, dataset).await {
                Ok(outcome) => print_outcome(name, &outcome),
                Err(e) => {
                    tracing::error!(dataset = %name, error = %e, "Upload failed");
                    failed.push(*name);
                }
            }
        }

        if !failed.is_empty() {
            anyhow::bail!(
                "{} of {} uploads failed: {}",
                failed.len(),
                selected.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}

/// Run the configured refresh pipeline; failures are tolerated only when
/// `allow_refresh_failure` is set
async fn refresh(
    config: &Config,
    name: &str,
    dataset: &PublishDatasetConfig,
) -> anyhow::Result<()> {
    let Some(source) = &dataset.refresh else {
        return Ok(());
    };

    tracing::info!(dataset = %name, refresh = %source, "Refreshing before upload");
    match run_dataset(config, source).await {
        Ok(report) => {
            tracing::info!(dataset = %name, rows = report.dataset.len(), "Refresh complete");
            Ok(())
        }
        Err(e) if dataset.allow_refresh_failure => {
            tracing::warn!(
                dataset = %name,
                error = %format!("{:#}", e),
                "Refresh failed, uploading existing files"
            );
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn print_outcome(name: &str, outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::DryRun {
            id,
            files,
            metadata,
            create_if_missing,
        } => {
            println!();
            println!("[dry run] {} -> {}", name, id);
            println!("  Title: {}", metadata.title);
            let licenses: Vec<&str> = metadata.licenses.iter().map(|l| l.name.as_str()).collect();
            println!("  License: {}", licenses.join(", "));
            for file in files {
                println!("  File: {}", file);
            }
            println!("  Create if missing: {}", create_if_missing);
        }
        UploadOutcome::Published { id, result } => match result {
            PublishResult::VersionCreated(message) => {
                println!("{}: new version of {} ({})", name, id, message)
            }
            PublishResult::DatasetCreated(message) => {
                println!("{}: created {} ({})", name, id, message)
            }
        },
    }
}
