use clap::Parser;
use commodity_feeds::cli::{Cli, Commands};
use commodity_feeds::config::{Config, SourceConfig};
use commodity_feeds::publish::resolve_slug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::example()?
        }
    };

    // Initialize telemetry; metrics are flushed when the guard drops
    let _telemetry = commodity_feeds::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Fetch(args) => {
            tracing::info!("Starting fetch");
            args.execute(&config).await?;
        }
        Commands::Publish(args) => {
            tracing::info!(dry_run = args.dry_run, "Starting publish");
            args.execute(&config).await?;
        }
        Commands::List => {
            println!("Publish datasets:");
            for (name, dataset) in &config.publish.datasets {
                println!(
                    "  {} [{}] {} ({}, {} files)",
                    name,
                    if dataset.enabled { "enabled" } else { "disabled" },
                    dataset.title.as_deref().unwrap_or("-"),
                    resolve_slug(dataset).as_deref().unwrap_or("no slug"),
                    dataset.files.len()
                );
            }
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Output root: {}", config.output.root.display());
            println!(
                "  Logging: {} ({:?})",
                config.telemetry.log_level, config.telemetry.log_format
            );
            for dataset in &config.datasets {
                let source = match &dataset.source {
                    SourceConfig::FredCsv(fred) => format!("FRED {}", fred.series_id),
                    SourceConfig::EiaXls(eia) => format!("EIA {}", eia.url),
                    SourceConfig::LocalCsv(local) => format!("file {}", local.path.display()),
                };
                println!(
                    "  Dataset: {} -> {} [{}]",
                    dataset.name,
                    dataset.history_path(&config.output).display(),
                    source
                );
            }
            println!(
                "  Publish: {} datasets, retry {}x from {}ms",
                config.publish.datasets.len(),
                config.publish.retry.max_attempts,
                config.publish.retry.initial_backoff_ms
            );
        }
    }

    Ok(())
}
