//! Fetch command implementation

use crate::config::Config;
use crate::pipeline::{LogObserver, Pipeline, PipelineReport};
use anyhow::Context;
use clap::Args;

/// Rows shown as a sample after each run
const SAMPLE_ROWS: usize = 5;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Dataset to fetch (repeatable; all configured datasets when omitted)
    #[arg(short, long = "dataset")]
    pub datasets: Vec<String>,
}

impl FetchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let names: Vec<String> = if self.datasets.is_empty() {
            config.datasets.iter().map(|d| d.name.clone()).collect()
        } else {
            self.datasets.clone()
        };

        if names.is_empty() {
            anyhow::bail!("No datasets configured");
        }

        let mut failed = Vec::new();
        for name in &names {
            match run_dataset(config, name).await {
                Ok(report) => print_report(name, &report),
                Err(e) => {
                    tracing::error!(
                        dataset = %name,
                        error = %format!("{:#}", e),
                        "Pipeline failed"
                    );
                    failed.push(name.as_str());
                }
            }
        }

        if !failed.is_empty() {
            anyhow::bail!(
                "{} of {} datasets failed: {}",
                failed.len(),
                names.len(),
                failed.join(", ")
            );
        }
        Ok(())
    }
}

/// Run the pipeline for one configured dataset
pub async fn run_dataset(config: &Config, name: &str) -> anyhow::Result<PipelineReport> {
    let dataset = config
        .dataset(name)
        .with_context(|| format!("Unknown dataset: {}", name))?;
    let pipeline = Pipeline::from_config(dataset, &config.output)
        .with_context(|| format!("Failed to build pipeline for {}", name))?;

    let report = pipeline.run(&mut LogObserver).await?;
    Ok(report)
}

fn print_report(name: &str, report: &PipelineReport) {
    println!();
    println!("{}", name);
    if let Some(summary) = &report.summary {
        println!("  Fetched: {}", summary);
    }
    println!("  Merge: {}", report.merge);
    println!(
        "  History: {} rows ({})",
        report.dataset.len(),
        if report.history_saved { "saved" } else { "NOT saved" }
    );
    for file in &report.export.written {
        println!("  Exported {}: {} ({} bytes)", file.format, file.path.display(), file.bytes);
    }
    for failure in &report.export.failed {
        println!("  Export {} failed: {}", failure.format, failure.error);
    }

    let sample = report.dataset.oldest(SAMPLE_ROWS);
    if !sample.is_empty() {
        println!("  Oldest rows:");
        for record in sample {
            println!("    {}  {:>10.2}", record.date(), record.price());
        }
    }
}
