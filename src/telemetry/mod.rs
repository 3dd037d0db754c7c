//! Telemetry module
//!
//! Logging and batch-job metrics

mod logging;
mod metrics;

pub use self::logging::{init_logging, LogFormat};
pub use self::metrics::{record_event, record_publish_attempt, MetricsTextfile};

use crate::config::TelemetryConfig;

/// Guard that flushes telemetry on drop
pub struct TelemetryGuard {
    metrics: Option<MetricsTextfile>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(metrics) = &self.metrics {
            match metrics.write() {
                Ok(()) => tracing::debug!(path = ?metrics.path(), "Wrote metrics textfile"),
                Err(e) => tracing::warn!(error = %e, "Failed to write metrics textfile"),
            }
        }
    }
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level, config.log_format)?;

    let metrics = match &config.metrics_textfile {
        Some(path) => Some(MetricsTextfile::install(path)?),
        None => None,
    };

    Ok(TelemetryGuard { metrics })
}
