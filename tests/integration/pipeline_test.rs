//! Pipeline integration tests

use async_trait::async_trait;
use chrono::NaiveDate;
use commodity_feeds::config::{DatasetConfig, LocalCsvSourceConfig, OutputConfig, SourceConfig};
use commodity_feeds::dataset::{Dataset, HistoryStore, MergeOutcome, TabularRecord};
use commodity_feeds::export::{ExportFormat, Exporter, ParquetReader};
use commodity_feeds::pipeline::{Pipeline, PipelineError, PipelineEvent};
use commodity_feeds::source::{SourceAdapter, SourceError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// In-memory source returning a fixed batch or a fixed failure
struct FixtureSource {
    records: Vec<(&'static str, f64)>,
    fail_fetch: bool,
}

impl FixtureSource {
    fn new(records: Vec<(&'static str, f64)>) -> Self {
        Self {
            records,
            fail_fetch: false,
        }
    }

    fn failing() -> Self {
        Self {
            records: Vec::new(),
            fail_fetch: true,
        }
    }
}

#[async_trait]
impl SourceAdapter for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self) -> Result<Vec<u8>, SourceError> {
        if self.fail_fetch {
            return Err(SourceError::Status {
                url: "https://example.invalid/series.csv".to_string(),
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(b"fixture".to_vec())
    }

    fn parse(&self, _payload: &[u8]) -> Result<Vec<TabularRecord>, SourceError> {
        Ok(self.records.iter().map(|(d, p)| record(d, *p)).collect())
    }
}

fn record(date: &str, price: f64) -> TabularRecord {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    TabularRecord::new(date, price).unwrap()
}

fn pipeline(root: &Path, source: FixtureSource) -> Pipeline {
    Pipeline::new(
        "crude_oil_brent",
        "USD per barrel",
        Box::new(source),
        HistoryStore::new(root.join("crude_oil_brent.csv")),
        Exporter::new(root, "crude_oil_brent"),
    )
}

fn prices(dataset: &Dataset) -> Vec<(String, f64)> {
    dataset
        .records()
        .iter()
        .map(|r| (r.date().to_string(), r.price()))
        .collect()
}

#[tokio::test]
async fn test_existing_rows_win_on_collision() {
    let temp_dir = TempDir::new().unwrap();
    let history = HistoryStore::new(temp_dir.path().join("crude_oil_brent.csv"));
    history
        .save(&Dataset::from_batch(vec![
            record("2024-01-03", 81.0),
            record("2024-01-02", 80.1),
        ]))
        .unwrap();

    let pipeline = pipeline(
        temp_dir.path(),
        FixtureSource::new(vec![("2024-01-03", 999.9), ("2024-01-04", 82.5)]),
    );
    let mut events: Vec<PipelineEvent> = Vec::new();
    let report = pipeline.run(&mut events).await.unwrap();

    assert_eq!(report.merge, MergeOutcome::Appended { added: 1 });
    assert_eq!(
        prices(&report.dataset),
        vec![
            ("2024-01-04".to_string(), 82.5),
            ("2024-01-03".to_string(), 81.0),
            ("2024-01-02".to_string(), 80.1),
        ]
    );
    assert!(events.contains(&PipelineEvent::RecordsAppended { added: 1, total: 3 }));

    let reloaded = history.load().unwrap().unwrap();
    assert_eq!(prices(&reloaded), prices(&report.dataset));
}

#[tokio::test]
async fn test_cold_start_writes_everything() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = pipeline(
        temp_dir.path(),
        FixtureSource::new(vec![("2024-01-02", 80.1), ("2024-01-03", 81.0)]),
    );

    let mut events: Vec<PipelineEvent> = Vec::new();
    let report = pipeline.run(&mut events).await.unwrap();

    assert_eq!(report.merge, MergeOutcome::ColdStart);
    assert!(report.history_saved);
    assert!(report.export.is_complete());
    assert_eq!(report.export.written.len(), 3);
    assert!(matches!(events.first(), Some(PipelineEvent::FetchStarted { .. })));
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::HistoryCreated { .. })));

    let csv = fs::read_to_string(temp_dir.path().join("crude_oil_brent.csv")).unwrap();
    assert_eq!(
        csv,
        "date,price,year,month,day\n2024-01-03,81.0,2024,1,3\n2024-01-02,80.1,2024,1,2\n"
    );

    let parquet = ParquetReader::new(pipeline.exporter().path_for(ExportFormat::Parquet))
        .read_dataset()
        .unwrap();
    assert_eq!(prices(&parquet), prices(&report.dataset));

    let json: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(pipeline.exporter().path_for(ExportFormat::Json)).unwrap(),
    )
    .unwrap();
    assert_eq!(json[0]["date"], "2024-01-03");
    assert_eq!(json[1]["day"], 2);
}

#[tokio::test]
async fn test_zero_byte_history_is_cold_start() {
    let temp_dir = TempDir::new().unwrap();
    let history_path = temp_dir.path().join("crude_oil_brent.csv");
    fs::write(&history_path, "").unwrap();

    let pipeline = pipeline(temp_dir.path(), FixtureSource::new(vec![("2024-02-01", 3.5)]));
    let report = pipeline.run(&mut Vec::<PipelineEvent>::new()).await.unwrap();

    assert_eq!(report.merge, MergeOutcome::ColdStart);
    assert_eq!(prices(&report.dataset), vec![("2024-02-01".to_string(), 3.5)]);
    assert_eq!(
        fs::read_to_string(&history_path).unwrap(),
        "date,price,year,month,day\n2024-02-01,3.5,2024,2,1\n"
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let batch = vec![("2024-01-02", 80.1), ("2024-01-03", 81.0)];

    let first = pipeline(temp_dir.path(), FixtureSource::new(batch.clone()))
        .run(&mut Vec::<PipelineEvent>::new())
        .await
        .unwrap();
    let before = fs::read(temp_dir.path().join("crude_oil_brent.csv")).unwrap();

    let mut events: Vec<PipelineEvent> = Vec::new();
    let second = pipeline(temp_dir.path(), FixtureSource::new(batch))
        .run(&mut events)
        .await
        .unwrap();

    assert_eq!(second.merge, MergeOutcome::UpToDate);
    assert_eq!(prices(&first.dataset), prices(&second.dataset));
    assert!(events.contains(&PipelineEvent::HistoryUpToDate { total: 2 }));
    assert_eq!(fs::read(temp_dir.path().join("crude_oil_brent.csv")).unwrap(), before);
}

#[tokio::test]
async fn test_fetch_failure_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = pipeline(temp_dir.path(), FixtureSource::failing());

    let mut events: Vec<PipelineEvent> = Vec::new();
    let err = pipeline.run(&mut events).await.unwrap_err();

    assert!(matches!(err, PipelineError::Fetch(SourceError::Status { status: 503, .. })));
    assert_eq!(events.len(), 1);
    assert_eq!(fs::read_dir(temp_dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_corrupt_history_is_replaced() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("crude_oil_brent.csv"),
        "when,value\nyesterday,lots\n",
    )
    .unwrap();

    let pipeline = pipeline(temp_dir.path(), FixtureSource::new(vec![("2024-01-02", 80.1)]));
    let mut events: Vec<PipelineEvent> = Vec::new();
    let report = pipeline.run(&mut events).await.unwrap();

    assert!(matches!(report.merge, MergeOutcome::Recovered { .. }));
    assert!(events.iter().any(|e| matches!(e, PipelineEvent::HistoryRecovered { .. })));
    assert_eq!(report.dataset.len(), 1);
}

#[tokio::test]
async fn test_history_save_failure_still_exports() {
    let temp_dir = TempDir::new().unwrap();
    // A directory where the history file should go
    let history_path = temp_dir.path().join("crude_oil_brent.csv");
    fs::create_dir_all(history_path.join("blocker")).unwrap();

    let pipeline = pipeline(temp_dir.path(), FixtureSource::new(vec![("2024-01-02", 80.1)]));
    let mut events: Vec<PipelineEvent> = Vec::new();
    let report = pipeline.run(&mut events).await.unwrap();

    assert!(!report.history_saved);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::HistorySaveFailed { path, .. } if *path == history_path
    )));
    assert!(!events.iter().any(|e| matches!(e, PipelineEvent::HistorySaved { .. })));

    assert!(report.export.is_complete());
    assert_eq!(report.export.written.len(), 3);
    for format in ExportFormat::ALL {
        assert!(pipeline.exporter().path_for(format).is_file(), "{format} missing");
    }
    assert!(history_path.is_dir());
}

#[tokio::test]
async fn test_export_failure_is_isolated() {
    let temp_dir = TempDir::new().unwrap();
    // A plain file where the json directory should go
    fs::write(temp_dir.path().join("json"), "blocker").unwrap();

    let pipeline = pipeline(temp_dir.path(), FixtureSource::new(vec![("2024-01-02", 80.1)]));
    let mut events: Vec<PipelineEvent> = Vec::new();
    let report = pipeline.run(&mut events).await.unwrap();

    assert!(report.history_saved);
    assert!(!report.export.is_complete());
    assert_eq!(report.export.failed.len(), 1);
    assert_eq!(report.export.failed[0].format, ExportFormat::Json);
    assert_eq!(report.export.written.len(), 2);
    assert!(events.iter().any(|e| matches!(
        e,
        PipelineEvent::ExportFailed {
            format: ExportFormat::Json,
            ..
        }
    )));
    assert!(pipeline.exporter().path_for(ExportFormat::Parquet).exists());
}

#[tokio::test]
async fn test_local_csv_dataset_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let download = temp_dir.path().join("henry_hub_download.csv");
    fs::write(
        &download,
        "Day,Henry Hub Natural Gas Spot Price Dollars per Million Btu\n\
         01/03/2024,2.75\n\
         01/02/2024,2.58\n\
         01/01/2024,\n",
    )
    .unwrap();

    let dataset = DatasetConfig {
        name: "henry_hub_natural_gas".to_string(),
        title: None,
        unit: "USD per MMBtu".to_string(),
        dir: Some("HenryHub".into()),
        source: SourceConfig::LocalCsv(LocalCsvSourceConfig {
            path: download,
            date_column: "day".to_string(),
            price_column: "Henry Hub Natural Gas Spot Price Dollars per Million Btu".to_string(),
            date_format: "%m/%d/%Y".to_string(),
        }),
    };
    let output = OutputConfig {
        root: temp_dir.path().to_path_buf(),
    };

    let pipeline = Pipeline::from_config(&dataset, &output).unwrap();
    let report = pipeline.run(&mut Vec::<PipelineEvent>::new()).await.unwrap();

    assert_eq!(report.fetched, 2);
    let summary = report.summary.unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(summary.unit, "USD per MMBtu");
    assert!(temp_dir
        .path()
        .join("HenryHub/henry_hub_natural_gas.csv")
        .exists());
    assert!(temp_dir
        .path()
        .join("HenryHub/parquet/henry_hub_natural_gas.parquet")
        .exists());
}
