//! Configuration types for commodity-feeds

use crate::telemetry::LogFormat;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Bundled example configuration, used when no config file can be loaded
pub const EXAMPLE_CONFIG: &str = include_str!("../config.toml.example");

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
    #[serde(default)]
    pub publish: PublishConfig,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus text file written at the end of each run
    pub metrics_textfile: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_textfile: None,
        }
    }
}

/// Where dataset directories live
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_root")]
    pub root: PathBuf,
}

fn default_output_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: default_output_root(),
        }
    }
}

/// One price series and how to fetch it
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetConfig {
    /// Base file name for history and exports
    pub name: String,
    pub title: Option<String>,
    /// Price unit label, e.g. "USD per barrel"
    #[serde(default)]
    pub unit: String,
    /// Directory under `output.root`; defaults to `name`
    pub dir: Option<PathBuf>,
    pub source: SourceConfig,
}

impl DatasetConfig {
    /// Directory holding this dataset's history and exports
    pub fn dataset_dir(&self, output: &OutputConfig) -> PathBuf {
        let dir = self.dir.clone().unwrap_or_else(|| PathBuf::from(&self.name));
        output.root.join(dir)
    }

    /// Path of the persisted history file
    pub fn history_path(&self, output: &OutputConfig) -> PathBuf {
        self.dataset_dir(output).join(format!("{}.csv", self.name))
    }
}

/// Source adapter selection
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    FredCsv(FredSourceConfig),
    EiaXls(EiaXlsSourceConfig),
    LocalCsv(LocalCsvSourceConfig),
}

/// FRED graph CSV download
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FredSourceConfig {
    #[serde(default = "default_fred_url")]
    pub url: String,
    /// Series identifier, e.g. DCOILBRENTEU
    pub series_id: String,
    /// Extra query parameters sent with the request
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default = "default_fred_timeout")]
    pub timeout_secs: u64,
}

fn default_fred_url() -> String {
    "https://fred.stlouisfed.org/graph/fredgraph.csv".to_string()
}
fn default_fred_timeout() -> u64 {
    10
}

/// EIA history spreadsheet download
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EiaXlsSourceConfig {
    /// e.g. https://www.eia.gov/dnav/ng/hist_xls/RNGWHHDd.xls
    pub url: String,
    #[serde(default = "default_eia_sheet")]
    pub sheet: String,
    #[serde(default = "default_eia_timeout")]
    pub timeout_secs: u64,
}

fn default_eia_sheet() -> String {
    "Data 1".to_string()
}
fn default_eia_timeout() -> u64 {
    30
}

/// CSV file already on disk
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LocalCsvSourceConfig {
    pub path: PathBuf,
    pub date_column: String,
    pub price_column: String,
    /// chrono format string for the date column
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

/// Dataset hosting upload configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// Fallback dataset owner
    pub owner: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub quiet: bool,
    #[serde(default)]
    pub create_if_missing: bool,
    /// Path or name of the kaggle command-line client
    #[serde(default = "default_kaggle_bin")]
    pub kaggle_bin: String,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub datasets: BTreeMap<String, PublishDatasetConfig>,
}

fn default_true() -> bool {
    true
}
fn default_kaggle_bin() -> String {
    "kaggle".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            owner: None,
            is_public: true,
            quiet: false,
            create_if_missing: false,
            kaggle_bin: default_kaggle_bin(),
            retry: RetryConfig::default(),
            datasets: BTreeMap::new(),
        }
    }
}

/// Retry schedule for transient publish failures
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    2_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// One remote dataset
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishDatasetConfig {
    #[serde(default)]
    pub enabled: bool,
    pub kaggle_slug: Option<String>,
    pub kaggle_owner: Option<String>,
    /// Full `owner/slug` reference
    pub kaggle_dataset: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub license: Option<String>,
    pub update_frequency: Option<String>,
    /// Thumbnail image, relative to the project root
    pub image: Option<PathBuf>,
    /// Files to upload, relative to the project root
    #[serde(default)]
    pub files: Vec<String>,
    /// Per-file descriptions keyed by full path or file name
    #[serde(default)]
    pub file_info: BTreeMap<String, FileInfo>,
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub create_if_missing: bool,
    /// Dataset to run through the pipeline before uploading
    pub refresh: Option<String>,
    #[serde(default)]
    pub allow_refresh_failure: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileInfo {
    pub description: Option<String>,
}

/// Column description included in the remote file schema
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type", default = "default_column_type")]
    pub column_type: String,
    #[serde(default)]
    pub description: String,
}

fn default_column_type() -> String {
    "string".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// The bundled example configuration
    pub fn example() -> anyhow::Result<Self> {
        Ok(toml::from_str(EXAMPLE_CONFIG)?)
    }

    /// Look up a dataset by name
    pub fn dataset(&self, name: &str) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.name == name)
    }
}
