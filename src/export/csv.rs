//! CSV rendering shared by the history file and the CSV export

use super::ExportError;
use crate::dataset::{Dataset, TabularRecord};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Serialize records with a `date,price,year,month,day` header
///
/// Dates render as `YYYY-MM-DD`; numbers in their shortest round-tripping form.
pub fn write_records<W: Write>(writer: W, records: &[TabularRecord]) -> Result<(), ::csv::Error> {
    let mut wtr = ::csv::WriterBuilder::new()
        .has_headers(true)
        .from_writer(writer);

    if records.is_empty() {
        wtr.write_record(crate::dataset::COLUMNS)?;
    }
    for record in records {
        wtr.serialize(record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write `dataset` to a CSV file, replacing any previous content
pub fn write_csv(path: &Path, dataset: &Dataset) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_records(&mut writer, dataset.records())?;
    writer.flush().map_err(|e| ExportError::io(path, e))?;
    Ok(())
}
