//! Multi-format export
//!
//! Writes a finished dataset to CSV, JSON and Parquet siblings under
//! `<root>/<format>/<name>.<ext>`. Each format is an independent full
//! rewrite; a failure in one does not stop the others.

pub mod csv;
mod json;
mod parquet;

pub use self::parquet::{dataset_schema, ParquetReader, ParquetWriter};
pub use json::write_json;

use crate::dataset::Dataset;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ::parquet::errors::ParquetError),
    #[error("Invalid {column} value in row {row}")]
    InvalidValue { column: &'static str, row: usize },
}

impl ExportError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Output representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Csv,
    Json,
    Parquet,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] =
        [ExportFormat::Csv, ExportFormat::Json, ExportFormat::Parquet];

    /// Directory name and file extension
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file written by the exporter
#[derive(Debug, Clone, PartialEq)]
pub struct ExportedFile {
    pub format: ExportFormat,
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

/// A format that failed to export
#[derive(Debug)]
pub struct ExportFailure {
    pub format: ExportFormat,
    pub path: PathBuf,
    pub error: ExportError,
}

/// Per-format results of one export
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<ExportedFile>,
    pub failed: Vec<ExportFailure>,
}

impl ExportReport {
    /// True when every format was written
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Writes a dataset to every format under one root directory
#[derive(Debug, Clone)]
pub struct Exporter {
    root: PathBuf,
    name: String,
}

impl Exporter {
    /// `name` becomes the file stem in every format directory
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
        }
    }

    /// Destination path for a format
    pub fn path_for(&self, format: ExportFormat) -> PathBuf {
        self.root
            .join(format.as_str())
            .join(format!("{}.{}", self.name, format.as_str()))
    }

    /// Export to all formats
    pub fn export_all(&self, dataset: &Dataset) -> ExportReport {
        let mut report = ExportReport::default();

        for format in ExportFormat::ALL {
            let path = self.path_for(format);
            match self.export_one(format, &path, dataset) {
                Ok(bytes) => {
                    tracing::debug!(%format, path = ?path, rows = dataset.len(), bytes, "Exported");
                    report.written.push(ExportedFile {
                        format,
                        path,
                        rows: dataset.len(),
                        bytes,
                    });
                }
                Err(error) => {
                    tracing::error!(%format, path = ?path, error = %error, "Export failed");
                    report.failed.push(ExportFailure {
                        format,
                        path,
                        error,
                    });
                }
            }
        }

        report
    }

    fn export_one(
        &self,
        format: ExportFormat,
        path: &Path,
        dataset: &Dataset,
    ) -> Result<u64, ExportError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| ExportError::io(dir, e))?;
        }

        match format {
            ExportFormat::Csv => csv::write_csv(path, dataset)?,
            ExportFormat::Json => write_json(path, dataset)?,
            ExportFormat::Parquet => ParquetWriter::new().write_dataset(path, dataset)?,
        }

        let bytes = fs::metadata(path).map_err(|e| ExportError::io(path, e))?.len();
        Ok(bytes)
    }
}
