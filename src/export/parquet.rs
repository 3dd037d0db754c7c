//! Parquet export, the lossless representation
//!
//! Column types follow the dataset exactly: `date` is Date32, `price`
//! Float64, `year` Int32, `month` and `day` Int8.

use super::ExportError;
use crate::dataset::{Dataset, TabularRecord};
use arrow::array::{ArrayRef, Date32Array, Float64Array, Int32Array, Int8Array};
use arrow::datatypes::{DataType, Date32Type, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Dataset schema fields
pub fn dataset_schema() -> Schema {
    Schema::new(vec![
        Field::new("date", DataType::Date32, false),
        Field::new("price", DataType::Float64, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Int8, false),
        Field::new("day", DataType::Int8, false),
    ])
}

/// Writes datasets to single Parquet files
#[derive(Debug, Clone)]
pub struct ParquetWriter {
    compression: Compression,
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ParquetWriter {
    /// Create a writer using Snappy compression
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
        }
    }

    /// Build the Arrow batch for a dataset
    pub fn to_record_batch(&self, dataset: &Dataset) -> Result<RecordBatch, ExportError> {
        let records = dataset.records();
        let schema: SchemaRef = Arc::new(dataset_schema());

        let dates: Vec<i32> = records
            .iter()
            .map(|r| Date32Type::from_naive_date(r.date()))
            .collect();
        let prices: Vec<f64> = records.iter().map(|r| r.price()).collect();
        let years: Vec<i32> = records.iter().map(|r| r.year()).collect();
        let months: Vec<i8> = records.iter().map(|r| r.month()).collect();
        let days: Vec<i8> = records.iter().map(|r| r.day()).collect();

        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Date32Array::from(dates)) as ArrayRef,
                Arc::new(Float64Array::from(prices)) as ArrayRef,
                Arc::new(Int32Array::from(years)) as ArrayRef,
                Arc::new(Int8Array::from(months)) as ArrayRef,
                Arc::new(Int8Array::from(days)) as ArrayRef,
            ],
        )?;

        Ok(batch)
    }

    /// Write a dataset to `path`, replacing any previous file
    pub fn write_dataset(&self, path: &Path, dataset: &Dataset) -> Result<(), ExportError> {
        let batch = self.to_record_batch(dataset)?;
        let file = File::create(path).map_err(|e| ExportError::io(path, e))?;

        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .build();

        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;

        tracing::debug!(path = ?path, count = dataset.len(), "Wrote dataset to Parquet");

        Ok(())
    }
}

/// Reader for exported Parquet files
pub struct ParquetReader {
    path: PathBuf,
}

impl ParquetReader {
    /// Create a new reader for a Parquet file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Arrow schema stored in the file
    pub fn schema(&self) -> Result<SchemaRef, ExportError> {
        let file = File::open(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        Ok(builder.schema().clone())
    }

    /// Read the dataset back, preserving row order
    pub fn read_dataset(&self) -> Result<Dataset, ExportError> {
        let file = File::open(&self.path).map_err(|e| ExportError::io(&self.path, e))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut records = Vec::new();

        for batch_result in reader {
            let batch = batch_result?;

            let dates = batch
                .column(0)
                .as_any()
                .downcast_ref::<Date32Array>()
                .ok_or(ExportError::InvalidValue {
                    column: "date",
                    row: records.len(),
                })?;

            let prices = batch
                .column(1)
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or(ExportError::InvalidValue {
                    column: "price",
                    row: records.len(),
                })?;

            for i in 0..batch.num_rows() {
                let row = records.len();
                let date = dates
                    .value_as_date(i)
                    .ok_or(ExportError::InvalidValue { column: "date", row })?;
                let record = TabularRecord::new(date, prices.value(i))
                    .ok_or(ExportError::InvalidValue { column: "price", row })?;
                records.push(record);
            }
        }

        // Rows come back in written order, which is already date-unique
        Ok(Dataset::from_batch(records))
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}
