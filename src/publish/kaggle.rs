//! Publish sink backed by the `kaggle` command-line client
//!
//! The client reports failures as free text, so its output is classified by
//! status codes and phrases into a [`SinkOutcome`].

use super::{PublishSink, SinkOutcome};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;

/// Harmless warning printed by some client versions
const BENIGN_STDERR: &[&str] =
    &["KaggleObject.from_dict() got an unexpected keyword argument 'token'"];

const NEEDS_CREATION: &[&str] = &["404", "not found", "403", "forbidden"];

const RETRYABLE: &[&str] = &[
    "429",
    "too many requests",
    "500",
    "502",
    "503",
    "504",
    "timed out",
    "timeout",
    "connection reset",
    "connection aborted",
    "temporarily unavailable",
];

pub struct KaggleCliSink {
    bin: String,
    quiet: bool,
}

impl KaggleCliSink {
    pub fn new(bin: impl Into<String>, quiet: bool) -> Self {
        Self {
            bin: bin.into(),
            quiet,
        }
    }

    async fn run(&self, args: Vec<OsString>) -> SinkOutcome {
        tracing::debug!(bin = %self.bin, ?args, "Running client");

        let output = match Command::new(&self.bin).args(&args).output().await {
            Ok(output) => output,
            Err(e) => return SinkOutcome::Fatal(format!("failed to run {}: {}", self.bin, e)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = filter_client_stderr(&stderr);
        for line in stderr.lines() {
            tracing::warn!(target: "kaggle_client", "{}", line);
        }

        let outcome = classify_client_output(output.status.success(), &stdout, &stderr);
        if !matches!(outcome, SinkOutcome::Published(_)) {
            tracing::debug!(
                status = ?output.status,
                outcome = outcome.label(),
                "Client call failed"
            );
        }
        outcome
    }
}

#[async_trait]
impl PublishSink for KaggleCliSink {
    async fn create_version(&self, folder: &Path, notes: &str) -> SinkOutcome {
        let mut args: Vec<OsString> = vec![
            "datasets".into(),
            "version".into(),
            "-p".into(),
            folder.as_os_str().to_owned(),
            "-m".into(),
            notes.into(),
            "-d".into(),
        ];
        if self.quiet {
            args.push("-q".into());
        }
        self.run(args).await
    }

    async fn create_dataset(&self, folder: &Path, public: bool) -> SinkOutcome {
        let mut args: Vec<OsString> = vec![
            "datasets".into(),
            "create".into(),
            "-p".into(),
            folder.as_os_str().to_owned(),
        ];
        if public {
            args.push("--public".into());
        }
        if self.quiet {
            args.push("-q".into());
        }
        self.run(args).await
    }
}

/// Drop known benign warning lines from client stderr
pub fn filter_client_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !BENIGN_STDERR.iter().any(|benign| line.contains(benign)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Classify one client invocation
///
/// The client sometimes exits zero after printing an error, so a success
/// status alone is not trusted.
pub fn classify_client_output(success: bool, stdout: &str, stderr: &str) -> SinkOutcome {
    let text = format!("{}\n{}", stdout, stderr).to_lowercase();

    if success && !text.contains("error") {
        let message = last_line(stdout).unwrap_or("ok").to_string();
        return SinkOutcome::Published(message);
    }

    let reason = first_line(stderr)
        .or_else(|| first_line(stdout))
        .unwrap_or("client exited with an error")
        .to_string();

    if NEEDS_CREATION.iter().any(|p| text.contains(p)) {
        SinkOutcome::NeedsCreation(reason)
    } else if RETRYABLE.iter().any(|p| text.contains(p)) {
        SinkOutcome::Retryable(reason)
    } else {
        SinkOutcome::Fatal(reason)
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

fn last_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}
