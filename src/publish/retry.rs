//! Retry loop around a publish sink

use super::{PublishError, PublishResult, PublishSink, SinkOutcome};
use crate::config::RetryConfig;
use crate::telemetry;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made
    pub fn new(max_attempts: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// Delays slept between attempts, in order
    pub fn schedule(&self) -> Vec<Duration> {
        let mut delays = Vec::new();
        let mut delay = self.initial_backoff;
        for _ in 1..self.max_attempts {
            delays.push(delay);
            delay = (delay * 2).min(self.max_backoff);
        }
        delays
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_backoff_ms),
            Duration::from_millis(config.max_backoff_ms),
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Operation<'a> {
    Version { notes: &'a str },
    Create,
}

/// Drives a sink through version creation and the creation fallback
pub struct Publisher<'a, S: PublishSink + ?Sized> {
    sink: &'a S,
    dataset: &'a str,
    policy: RetryPolicy,
    create_if_missing: bool,
    confirmed: bool,
    public: bool,
}

impl<'a, S: PublishSink + ?Sized> Publisher<'a, S> {
    pub fn new(sink: &'a S, dataset: &'a str, policy: RetryPolicy) -> Self {
        Self {
            sink,
            dataset,
            policy,
            create_if_missing: false,
            confirmed: false,
            public: true,
        }
    }

    /// Allow falling back to dataset creation
    pub fn create_if_missing(mut self, enabled: bool) -> Self {
        self.create_if_missing = enabled;
        self
    }

    /// Operator confirmed creation
    pub fn confirmed(mut self, confirmed: bool) -> Self {
        self.confirmed = confirmed;
        self
    }

    /// Visibility of a newly created dataset
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Publish `folder` as a new version, creating the dataset if allowed
    pub async fn publish(&self, folder: &Path, notes: &str) -> Result<PublishResult, PublishError> {
        let (outcome, attempts) = self.with_retry(folder, Operation::Version { notes }).await;

        match outcome {
            SinkOutcome::Published(version) => Ok(PublishResult::VersionCreated(version)),
            SinkOutcome::Retryable(reason) => {
                Err(PublishError::RetriesExhausted { attempts, reason })
            }
            SinkOutcome::Fatal(reason) => Err(PublishError::Rejected(reason)),
            SinkOutcome::NeedsCreation(reason) => self.create(folder, reason).await,
        }
    }

    async fn create(&self, folder: &Path, original: String) -> Result<PublishResult, PublishError> {
        if !self.create_if_missing {
            return Err(PublishError::NotFound(original));
        }
        if !self.confirmed {
            return Err(PublishError::CreationNotConfirmed);
        }

        tracing::warn!(
            dataset = %self.dataset,
            reason = %original,
            "Dataset version creation failed, attempting to create dataset"
        );

        let (outcome, attempts) = self.with_retry(folder, Operation::Create).await;
        match outcome {
            SinkOutcome::Published(message) => Ok(PublishResult::DatasetCreated(message)),
            SinkOutcome::Retryable(reason) => Err(PublishError::CreationFailed {
                reason: format!("{} (after {} attempts)", reason, attempts),
                original,
            }),
            SinkOutcome::NeedsCreation(reason) | SinkOutcome::Fatal(reason) => {
                Err(PublishError::CreationFailed { reason, original })
            }
        }
    }

    async fn call(&self, folder: &Path, operation: Operation<'_>) -> SinkOutcome {
        match operation {
            Operation::Version { notes } => self.sink.create_version(folder, notes).await,
            Operation::Create => self.sink.create_dataset(folder, self.public).await,
        }
    }

    /// Call the sink until it returns something other than `Retryable` or
    /// the backoff schedule runs out. Returns the last outcome and the
    /// attempts made.
    async fn with_retry(&self, folder: &Path, operation: Operation<'_>) -> (SinkOutcome, u32) {
        let mut delays = self.policy.schedule().into_iter();
        let mut attempt = 1;

        loop {
            let outcome = self.call(folder, operation).await;
            telemetry::record_publish_attempt(self.dataset, outcome.label());

            let delay = match outcome {
                SinkOutcome::Retryable(_) => delays.next(),
                _ => None,
            };
            let Some(delay) = delay else {
                return (outcome, attempt);
            };

            tracing::warn!(
                dataset = %self.dataset,
                attempt,
                delay_ms = delay.as_millis() as u64,
                outcome = ?outcome,
                "Transient upload failure, retrying"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
