//! `Fact_Invoice` builder.
//!
//! ```text
//! Load Dimensions -> Join Date (sentinel fill) -> Join Customer -> Join Product -> Validate -> Emit
//! ```
//!
//! Every join is a left join against a dimension whose join key has been
//! checked to be unique, so the fact table has exactly one row per cleaned
//! record, in input order. Unmatched dates fall back to the sentinel row;
//! unmatched customers or products reject the whole batch.

use super::columns::{
    CUSTOMER_ID, CUSTOMER_KEY, CUSTOMER_NATURAL_KEY, DATE_KEY, DIM_CUSTOMER, DIM_DATE,
    DIM_PRODUCT, INVOICE_DATE, PRICE, PRODUCT_KEY, PRODUCT_NATURAL_KEY, QUANTITY, STOCK_CODE,
};
use super::date::sentinel_key;
use super::dimension::first_occurrences;
use super::integrity::{ensure_many_to_one, ensure_resolved, require_columns};
use super::store::ModelStore;
use super::Dimensions;
use crate::error::{Result, WarehouseError};
use polars::prelude::*;

/// Output columns, in order.
pub const FACT_COLUMNS: [&str; 5] = [DATE_KEY, CUSTOMER_KEY, PRODUCT_KEY, QUANTITY, PRICE];

const ROW_INDEX: &str = "__row";
const CALENDAR_DATE: &str = "__calendar_date";
const DATE_UNMATCHED: &str = "__date_unmatched";

/// A built fact table and what it took to build it
#[derive(Debug, Clone)]
pub struct FactBuild {
    pub table: DataFrame,

    /// Rows whose invoice date resolved to the sentinel
    pub unknown_dates: usize,

    /// Product rows dropped by the defensive de-duplication
    pub product_duplicates_dropped: usize,
}

/// Build `Fact_Invoice` from the cleaned records and in-memory dimensions.
///
/// # Errors
///
/// See [`build_fact`].
pub fn build_fact_invoice(records: &DataFrame, dims: &Dimensions) -> Result<DataFrame> {
    Ok(build_fact(records, dims)?.table)
}

/// Build `Fact_Invoice` against the dimensions currently in the Model Store.
///
/// # Errors
///
/// Fails if a dimension cannot be read, or as [`build_fact`].
pub fn build_fact_from_store(records: &DataFrame, store: &ModelStore) -> Result<FactBuild> {
    let dims = store.load_dimensions()?;
    build_fact(records, &dims)
}

/// Resolve surrogate keys for every cleaned record.
///
/// # Errors
///
/// - [`WarehouseError::MissingColumn`] if records or dimensions lack a join column
/// - [`WarehouseError::MissingSentinel`] if `Dim_Date` has no sentinel row
/// - [`WarehouseError::JoinCardinality`] if a dimension join key repeats or the
///   joined row count differs from the input
/// - [`WarehouseError::ReferentialIntegrity`] if a customer or product is unknown
pub fn build_fact(records: &DataFrame, dims: &Dimensions) -> Result<FactBuild> {
    require_columns(
        records,
        "cleaned records",
        &[INVOICE_DATE, CUSTOMER_ID, STOCK_CODE, QUANTITY, PRICE],
    )?;
    require_columns(&dims.date, DIM_DATE, &[DATE_KEY, INVOICE_DATE])?;
    require_columns(&dims.customer, DIM_CUSTOMER, &[CUSTOMER_KEY, CUSTOMER_NATURAL_KEY])?;
    require_columns(&dims.product, DIM_PRODUCT, &[PRODUCT_KEY, PRODUCT_NATURAL_KEY])?;

    let product = first_occurrences(&dims.product, PRODUCT_NATURAL_KEY)?;
    let product_duplicates_dropped = dims.product.height() - product.height();
    if product_duplicates_dropped > 0 {
        tracing::warn!(
            "Dropped {product_duplicates_dropped} duplicate {PRODUCT_NATURAL_KEY} rows from {DIM_PRODUCT} before joining"
        );
    }

    ensure_many_to_one(&dims.date, DIM_DATE, INVOICE_DATE)?;
    ensure_many_to_one(&dims.customer, DIM_CUSTOMER, CUSTOMER_NATURAL_KEY)?;
    ensure_many_to_one(&product, DIM_PRODUCT, PRODUCT_NATURAL_KEY)?;

    let unknown_date_key = sentinel_key(&dims.date)?;
    let joined = join_dimensions(records, dims, &product, unknown_date_key)?;

    if joined.height() != records.height() {
        return Err(WarehouseError::JoinCardinality {
            dimension: "Fact_Invoice".to_owned(),
            detail: format!(
                "{} cleaned records produced {} fact rows",
                records.height(),
                joined.height()
            ),
        });
    }

    // Unreachable once the sentinel fill ran, but the fact table must be total.
    ensure_resolved(&joined, DIM_DATE, DATE_KEY, INVOICE_DATE)?;
    ensure_resolved(&joined, DIM_CUSTOMER, CUSTOMER_KEY, CUSTOMER_ID)?;
    ensure_resolved(&joined, DIM_PRODUCT, PRODUCT_KEY, STOCK_CODE)?;

    let unknown_dates = joined
        .column(DATE_UNMATCHED)?
        .as_materialized_series()
        .bool()?
        .into_iter()
        .filter(|unmatched| *unmatched == Some(true))
        .count();
    if unknown_dates > 0 {
        tracing::info!(
            "{unknown_dates} records fell outside the calendar and use DateKey {unknown_date_key}"
        );
    }

    let table = joined.select(FACT_COLUMNS)?;
    Ok(FactBuild {
        table,
        unknown_dates,
        product_duplicates_dropped,
    })
}

fn join_dimensions(
    records: &DataFrame,
    dims: &Dimensions,
    product: &DataFrame,
    unknown_date_key: i32,
) -> Result<DataFrame> {
    let date_lookup = dims.date.clone().lazy().select([
        col(INVOICE_DATE).cast(DataType::Date).alias(CALENDAR_DATE),
        col(DATE_KEY).cast(DataType::Int32),
    ]);
    let customer_lookup = dims.customer.clone().lazy().select([
        col(CUSTOMER_NATURAL_KEY).cast(DataType::String),
        col(CUSTOMER_KEY).cast(DataType::Int32),
    ]);
    let product_lookup = product.clone().lazy().select([
        col(PRODUCT_NATURAL_KEY).cast(DataType::String),
        col(PRODUCT_KEY).cast(DataType::Int32),
    ]);

    let joined = records
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .with_columns([
            // Invoice timestamps match the calendar day they fall on.
            col(INVOICE_DATE).cast(DataType::Date).alias(CALENDAR_DATE),
            col(CUSTOMER_ID).cast(DataType::String),
            col(STOCK_CODE).cast(DataType::String),
        ])
        .join(
            date_lookup,
            [col(CALENDAR_DATE)],
            [col(CALENDAR_DATE)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            col(DATE_KEY).is_null().alias(DATE_UNMATCHED),
            col(DATE_KEY).fill_null(lit(unknown_date_key)),
        ])
        .join(
            customer_lookup,
            [col(CUSTOMER_ID)],
            [col(CUSTOMER_NATURAL_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .join(
            product_lookup,
            [col(STOCK_CODE)],
            [col(PRODUCT_NATURAL_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .collect()?;
    Ok(joined)
}
