//! CLI interface for commodity-feeds
//!
//! Provides subcommands for:
//! - `fetch`: Run the fetch-merge-export pipeline
//! - `publish`: Upload exported datasets
//! - `list`: Show publishable datasets
//! - `config`: Show configuration

mod fetch;
mod publish;

pub use fetch::{run_dataset, FetchArgs};
pub use publish::PublishArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "commodity-feeds")]
#[command(about = "Daily commodity price feeds with incremental history and dataset publishing")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "commodity.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, merge and export datasets
    Fetch(FetchArgs),
    /// Publish exported datasets
    Publish(PublishArgs),
    /// List datasets configured for publishing
    List,
    /// Show configuration
    Config,
}
