//! JSON export: an array of row objects with a trailing newline

use super::ExportError;
use crate::dataset::Dataset;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `dataset` as a JSON array of records
///
/// JSON has no date type, so `date` is an ISO-8601 string.
pub fn write_json(path: &Path, dataset: &Dataset) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer(&mut writer, dataset.records())?;
    // Formatting hooks expect a final newline
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| ExportError::io(path, e))?;

    Ok(())
}
