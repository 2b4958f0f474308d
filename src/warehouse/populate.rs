//! Load the star schema into a Model Store.

use super::columns::{DIM_CUSTOMER, DIM_DATE, DIM_PRODUCT, FACT_INVOICE};
use super::date::build_date_dim;
use super::dimension::{build_customer_dim, build_product_dim};
use super::fact::{FactBuild, build_fact, build_fact_from_store};
use super::schema::TableSchemas;
use super::store::ModelStore;
use super::Dimensions;
use crate::error::{Result, WarehouseError};
use polars::prelude::DataFrame;
use std::time::{Duration, Instant};

/// What a populate run wrote
#[derive(Debug, Clone, Default)]
pub struct PopulateReport {
    /// Cleaned records read
    pub records: usize,

    /// `(table, rows)` per table written, in write order
    pub tables: Vec<(String, usize)>,

    /// Fact rows that resolved to the unknown-date sentinel
    pub unknown_dates: usize,

    pub duration: Duration,
}

impl PopulateReport {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, rows)| *rows)
    }

    pub fn summary(&self) -> String {
        let tables = self
            .tables
            .iter()
            .map(|(name, rows)| format!("{name}={rows}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Populated model from {} records: {tables} ({} unknown dates), {:.2}s",
            self.records,
            self.unknown_dates,
            self.duration.as_secs_f64()
        )
    }
}

/// Build all three dimensions from the cleaned records.
///
/// # Errors
///
/// Fails if any dimension builder fails.
pub fn build_dimensions(records: &DataFrame) -> Result<Dimensions> {
    Ok(Dimensions {
        date: build_date_dim(records)?,
        customer: build_customer_dim(records)?,
        product: build_product_dim(records)?,
    })
}

/// Build, conform and write the dimensions, then the fact table.
///
/// Dimensions are handed to the fact builder in memory. Any existing
/// `Fact_Invoice` is removed before the new dimensions are written, since its
/// keys would no longer match them, and the new one is only written if its
/// build succeeds. A failed run therefore leaves no fact file behind
/// (dimension files already written are kept).
///
/// # Errors
///
/// - [`WarehouseError::EmptyInput`] if there are no records
/// - any dimension, conform, fact build or write failure
pub fn populate(
    records: &DataFrame,
    store: &ModelStore,
    schemas: &TableSchemas,
) -> Result<PopulateReport> {
    let start = Instant::now();
    if records.height() == 0 {
        return Err(WarehouseError::EmptyInput(
            "Cleaned record set has no rows".to_owned(),
        ));
    }

    let mut report = PopulateReport {
        records: records.height(),
        ..PopulateReport::default()
    };

    let built = build_dimensions(records)?;
    if store.remove_table(FACT_INVOICE)? {
        tracing::info!("Removed previous {FACT_INVOICE} before rewriting dimensions");
    }
    let dims = Dimensions {
        date: write_dimension(DIM_DATE, &built.date, store, schemas, &mut report)?,
        customer: write_dimension(DIM_CUSTOMER, &built.customer, store, schemas, &mut report)?,
        product: write_dimension(DIM_PRODUCT, &built.product, store, schemas, &mut report)?,
    };

    let fact = build_fact(records, &dims)?;
    write_fact(&fact, store, schemas, &mut report)?;

    report.duration = start.elapsed();
    tracing::info!("{}", report.summary());
    Ok(report)
}

/// Rebuild only `Fact_Invoice` against the dimensions already in the store.
///
/// # Errors
///
/// Fails if a dimension table is missing, or as [`populate`] for the fact step.
pub fn rebuild_fact(
    records: &DataFrame,
    store: &ModelStore,
    schemas: &TableSchemas,
) -> Result<PopulateReport> {
    let start = Instant::now();
    if records.height() == 0 {
        return Err(WarehouseError::EmptyInput(
            "Cleaned record set has no rows".to_owned(),
        ));
    }

    let mut report = PopulateReport {
        records: records.height(),
        ..PopulateReport::default()
    };
    let fact = build_fact_from_store(records, store)?;
    write_fact(&fact, store, schemas, &mut report)?;

    report.duration = start.elapsed();
    tracing::info!("{}", report.summary());
    Ok(report)
}

fn write_dimension(
    table: &str,
    dim: &DataFrame,
    store: &ModelStore,
    schemas: &TableSchemas,
    report: &mut PopulateReport,
) -> Result<DataFrame> {
    let mut conformed = schemas.conform(table, dim)?;
    let path = store.write_table(table, &mut conformed)?;
    tracing::info!(
        "Successfully wrote {table} ({} rows) to {}",
        conformed.height(),
        path.display()
    );
    report.tables.push((table.to_owned(), conformed.height()));
    Ok(conformed)
}

fn write_fact(
    fact: &FactBuild,
    store: &ModelStore,
    schemas: &TableSchemas,
    report: &mut PopulateReport,
) -> Result<()> {
    let mut table = schemas.conform(FACT_INVOICE, &fact.table)?;
    let path = store.write_table(FACT_INVOICE, &mut table)?;
    tracing::info!(
        "Successfully wrote {FACT_INVOICE} ({} rows) to {}",
        table.height(),
        path.display()
    );
    report.tables.push((FACT_INVOICE.to_owned(), table.height()));
    report.unknown_dates = fact.unknown_dates;
    Ok(())
}
