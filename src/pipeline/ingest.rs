//! Raw CSV to date-partitioned Parquet.

use crate::config::PipelineConfig;
use crate::error::{Result, WarehouseError};
use crate::io::{read_csv_as_strings, write_parquet};
use chrono::NaiveDate;
use std::path::PathBuf;

/// Outcome of an ingestion run
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Copy `paths.raw_csv` into the raw layer for `run_date`, every column as a string.
///
/// # Errors
///
/// - [`WarehouseError::InvalidPath`] if the CSV does not exist
/// - a config error for an unusable delimiter or encoding
/// - a data processing error if the CSV cannot be decoded or the Parquet write fails
pub fn ingest(config: &PipelineConfig, run_date: NaiveDate) -> Result<IngestReport> {
    let source = config.paths.raw_csv.clone();
    let destination = config.paths.raw_file(run_date);
    let delimiter = config.parameters.delimiter_byte()?;
    let encoding = config.parameters.source_encoding()?;

    tracing::info!("Reading raw invoices from {}", source.display());
    let mut raw = read_csv_as_strings(&source, delimiter, encoding).map_err(|e| match e {
        WarehouseError::InvalidPath(_) => {
            tracing::error!("Cannot find file {}", source.display());
            e
        }
        WarehouseError::DataProcessing(msg) => WarehouseError::DataProcessing(format!(
            "{msg} (encoding '{}')",
            config.parameters.encoding
        )),
        other => other,
    })?;

    write_parquet(&mut raw, &destination)?;
    tracing::info!(
        "Raw data written to {} ({} rows, {} columns)",
        destination.display(),
        raw.height(),
        raw.width()
    );

    Ok(IngestReport {
        source,
        destination,
        rows: raw.height(),
        columns: raw.width(),
    })
}
