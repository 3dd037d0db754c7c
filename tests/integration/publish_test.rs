//! Publish flow integration tests against a scripted sink

use async_trait::async_trait;
use commodity_feeds::config::{PublishConfig, PublishDatasetConfig, RetryConfig};
use commodity_feeds::publish::{
    OwnerSources, PublishError, PublishResult, PublishSink, Publisher, RetryPolicy, SinkOutcome,
    UploadOutcome, Uploader, METADATA_FILE,
};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Version { notes: String },
    Create { public: bool },
}

/// Replays scripted outcomes and records every call
#[derive(Default)]
struct ScriptedSink {
    versions: Mutex<VecDeque<SinkOutcome>>,
    creates: Mutex<VecDeque<SinkOutcome>>,
    calls: Mutex<Vec<Call>>,
    staged_metadata: Mutex<Option<serde_json::Value>>,
}

impl ScriptedSink {
    fn new(versions: Vec<SinkOutcome>, creates: Vec<SinkOutcome>) -> Self {
        Self {
            versions: Mutex::new(versions.into()),
            creates: Mutex::new(creates.into()),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn next(queue: &Mutex<VecDeque<SinkOutcome>>) -> SinkOutcome {
        queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| SinkOutcome::Fatal("script exhausted".to_string()))
    }
}

#[async_trait]
impl PublishSink for ScriptedSink {
    async fn create_version(&self, folder: &Path, notes: &str) -> SinkOutcome {
        if let Ok(metadata) = fs::read_to_string(folder.join(METADATA_FILE)) {
            *self.staged_metadata.lock().unwrap() = serde_json::from_str(&metadata).ok();
        }
        self.calls.lock().unwrap().push(Call::Version {
            notes: notes.to_string(),
        });
        Self::next(&self.versions)
    }

    async fn create_dataset(&self, _folder: &Path, public: bool) -> SinkOutcome {
        self.calls.lock().unwrap().push(Call::Create { public });
        Self::next(&self.creates)
    }
}

fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
}

/// Folder holding a minimal metadata document, as staging leaves it
fn staged_folder() -> TempDir {
    let folder = TempDir::new().unwrap();
    fs::write(
        folder.path().join(METADATA_FILE),
        r#"{"title": "brent", "id": "alice/brent"}"#,
    )
    .unwrap();
    folder
}

fn retryable() -> SinkOutcome {
    SinkOutcome::Retryable("503 Server Error".to_string())
}

fn not_found() -> SinkOutcome {
    SinkOutcome::NeedsCreation("404 - Not Found".to_string())
}

#[tokio::test]
async fn test_retry_then_success() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(
        vec![retryable(), retryable(), SinkOutcome::Published("v3".to_string())],
        vec![],
    );
    let result = Publisher::new(&sink, "brent", fast_policy(3))
        .publish(folder.path(), "notes")
        .await
        .unwrap();

    assert_eq!(result, PublishResult::VersionCreated("v3".to_string()));
    assert_eq!(sink.calls().len(), 3);
    let metadata = sink.staged_metadata.lock().unwrap().clone().unwrap();
    assert_eq!(metadata["id"], "alice/brent");
}

#[tokio::test]
async fn test_retries_exhausted() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(vec![retryable(), retryable(), retryable()], vec![]);
    let err = Publisher::new(&sink, "brent", fast_policy(2))
        .publish(folder.path(), "notes")
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::RetriesExhausted { attempts: 2, .. }));
    assert_eq!(sink.calls().len(), 2);
}

#[tokio::test]
async fn test_fatal_is_not_retried() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(
        vec![SinkOutcome::Fatal("401 - Unauthorized".to_string())],
        vec![],
    );
    let err = Publisher::new(&sink, "brent", fast_policy(3))
        .publish(folder.path(), "notes")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PublishError::Rejected(ref reason) if reason == "401 - Unauthorized"
    ));
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn test_not_found_without_create_if_missing() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(vec![not_found()], vec![]);
    let err = Publisher::new(&sink, "brent", fast_policy(3))
        .confirmed(true)
        .publish(folder.path(), "notes")
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::NotFound(_)));
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn test_creation_requires_confirmation() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(
        vec![not_found()],
        vec![SinkOutcome::Published("created".to_string())],
    );
    let err = Publisher::new(&sink, "brent", fast_policy(3))
        .create_if_missing(true)
        .publish(folder.path(), "notes")
        .await
        .unwrap_err();

    assert!(matches!(err, PublishError::CreationNotConfirmed));
    assert!(!sink.calls().iter().any(|c| matches!(c, Call::Create { .. })));
}

#[tokio::test]
async fn test_confirmed_creation() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(
        vec![not_found()],
        vec![SinkOutcome::Published("created".to_string())],
    );
    let result = Publisher::new(&sink, "brent", fast_policy(3))
        .create_if_missing(true)
        .confirmed(true)
        .public(false)
        .publish(folder.path(), "notes")
        .await
        .unwrap();

    assert_eq!(result, PublishResult::DatasetCreated("created".to_string()));
    assert_eq!(sink.calls()[1], Call::Create { public: false });
}

#[tokio::test]
async fn test_creation_failure_keeps_original_error() {
    let folder = staged_folder();
    let sink = ScriptedSink::new(
        vec![not_found()],
        vec![SinkOutcome::Fatal("400 - Bad Request".to_string())],
    );
    let err = Publisher::new(&sink, "brent", fast_policy(3))
        .create_if_missing(true)
        .confirmed(true)
        .publish(folder.path(), "notes")
        .await
        .unwrap_err();

    match err {
        PublishError::CreationFailed { reason, original } => {
            assert_eq!(reason, "400 - Bad Request");
            assert_eq!(original, "404 - Not Found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

fn project() -> (TempDir, PublishConfig) {
    let temp_dir = TempDir::new().unwrap();
    fs::create_dir_all(temp_dir.path().join("CrudeOil/json")).unwrap();
    fs::write(
        temp_dir.path().join("CrudeOil/crude_oil_brent.csv"),
        "date,price,year,month,day\n2024-01-02,80.1,2024,1,2\n",
    )
    .unwrap();
    fs::write(
        temp_dir.path().join("CrudeOil/json/crude_oil_brent.json"),
        "[{\"date\":\"2024-01-02\",\"price\":80.1,\"year\":2024,\"month\":1,\"day\":2}]\n",
    )
    .unwrap();

    let mut config = PublishConfig {
        retry: RetryConfig {
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 1,
        },
        ..Default::default()
    };
    config.datasets.insert(
        "crude_oil_brent".to_string(),
        PublishDatasetConfig {
            enabled: true,
            kaggle_dataset: Some("alice/crude-oil-brent-daily".to_string()),
            title: Some("Brent Crude Oil Daily Prices".to_string()),
            license: Some("MIT".to_string()),
            files: vec![
                "CrudeOil/crude_oil_brent.csv".to_string(),
                "CrudeOil/json/crude_oil_brent.json".to_string(),
                "CrudeOil/missing.parquet".to_string(),
            ],
            ..Default::default()
        },
    );
    (temp_dir, config)
}

#[tokio::test]
async fn test_uploader_stages_and_publishes() {
    let (temp_dir, config) = project();
    let dataset = config.datasets["crude_oil_brent"].clone();
    let sink = ScriptedSink::new(vec![SinkOutcome::Published("ok".to_string())], vec![]);
    let uploader = Uploader::new(config, temp_dir.path(), sink);

    let outcome = uploader.upload("crude_oil_brent", &dataset).await.unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Published {
            id: "alice/crude-oil-brent-daily".to_string(),
            result: PublishResult::VersionCreated("ok".to_string()),
        }
    );
}

#[tokio::test]
async fn test_uploaded_metadata_and_notes() {
    let (temp_dir, config) = project();
    let dataset = config.datasets["crude_oil_brent"].clone();
    let sink = ScriptedSink::new(vec![SinkOutcome::Published("ok".to_string())], vec![]);

    // Borrowing the sink keeps it inspectable after the upload
    struct Shared<'a>(&'a ScriptedSink);

    #[async_trait]
    impl PublishSink for Shared<'_> {
        async fn create_version(&self, folder: &Path, notes: &str) -> SinkOutcome {
            self.0.create_version(folder, notes).await
        }
        async fn create_dataset(&self, folder: &Path, public: bool) -> SinkOutcome {
            self.0.create_dataset(folder, public).await
        }
    }

    Uploader::new(config, temp_dir.path(), Shared(&sink))
        .upload("crude_oil_brent", &dataset)
        .await
        .unwrap();

    let calls = sink.calls();
    match &calls[0] {
        Call::Version { notes } => {
            assert!(notes.starts_with("Auto-update: "));
            assert!(notes.ends_with(" UTC"));
        }
        other => panic!("unexpected call: {other:?}"),
    }

    let metadata = sink.staged_metadata.lock().unwrap().clone().unwrap();
    assert_eq!(metadata["id"], "alice/crude-oil-brent-daily");
    assert_eq!(metadata["licenses"][0]["name"], "CC0-1.0");
    assert_eq!(metadata["resources"].as_array().unwrap().len(), 2);
    assert_eq!(
        metadata["resources"][1]["description"],
        "crude_oil_brent - crude_oil_brent.json"
    );
}

#[tokio::test]
async fn test_dry_run_makes_no_calls() {
    let (temp_dir, config) = project();
    let dataset = config.datasets["crude_oil_brent"].clone();
    let sink = ScriptedSink::new(vec![], vec![]);
    let uploader = Uploader::new(config, temp_dir.path(), sink).dry_run(true);

    let outcome = uploader.upload("crude_oil_brent", &dataset).await.unwrap();

    match outcome {
        UploadOutcome::DryRun { id, files, metadata, create_if_missing } => {
            assert_eq!(id, "alice/crude-oil-brent-daily");
            assert_eq!(files, vec!["crude_oil_brent.csv", "crude_oil_brent.json"]);
            assert_eq!(metadata.title, "Brent Crude Oil Daily Prices");
            assert!(!create_if_missing);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_no_files_is_an_error() {
    let (temp_dir, mut config) = project();
    let mut dataset = config.datasets["crude_oil_brent"].clone();
    dataset.files = vec!["CrudeOil/missing.parquet".to_string()];
    config.datasets.insert("crude_oil_brent".to_string(), dataset.clone());

    let uploader = Uploader::new(config, temp_dir.path(), ScriptedSink::default());
    let err = uploader.upload("crude_oil_brent", &dataset).await.unwrap_err();

    assert!(matches!(err, PublishError::NoFiles(_)));
}

#[tokio::test]
async fn test_unknown_owner_is_an_error() {
    let (temp_dir, config) = project();
    let dataset = PublishDatasetConfig {
        kaggle_slug: Some("crude-oil-brent-daily".to_string()),
        files: vec!["CrudeOil/crude_oil_brent.csv".to_string()],
        ..Default::default()
    };

    let uploader = Uploader::new(config, temp_dir.path(), ScriptedSink::default())
        .with_owner_sources(OwnerSources::default());
    let err = uploader.upload("crude_oil_brent", &dataset).await.unwrap_err();

    assert!(matches!(err, PublishError::OwnerUnknown(_)));
}
