//! Natural-key dimensions (customer, product).
//!
//! A dimension is the cleaned record set projected onto its natural key and
//! descriptive attributes, collapsed to one row per natural key (the first row
//! seen wins), with a dense Int32 surrogate key `1..=N` in that order.

use super::columns::{
    COUNTRY, CUSTOMER_ID, CUSTOMER_KEY, CUSTOMER_NATURAL_KEY, DESCRIPTION, DIM_CUSTOMER,
    DIM_PRODUCT, PRICE, PRODUCT_KEY, PRODUCT_NATURAL_KEY, STOCK_CODE,
};
use super::integrity::{ensure_no_nulls, ensure_unique, require_columns};
use crate::error::{Result, WarehouseError};
use polars::prelude::*;

/// How a dimension is derived from the cleaned record set
#[derive(Debug, Clone, Copy)]
pub struct DimensionSpec {
    /// Table name in the Model Store
    pub name: &'static str,

    /// Surrogate key column, placed first
    pub surrogate_key: &'static str,

    /// Natural key column in the cleaned records
    pub source_key: &'static str,

    /// Natural key column name in the dimension
    pub natural_key: &'static str,

    /// Descriptive attributes carried from the first row of each natural key
    pub attributes: &'static [&'static str],
}

pub const CUSTOMER: DimensionSpec = DimensionSpec {
    name: DIM_CUSTOMER,
    surrogate_key: CUSTOMER_KEY,
    source_key: CUSTOMER_ID,
    natural_key: CUSTOMER_NATURAL_KEY,
    attributes: &[COUNTRY],
};

pub const PRODUCT: DimensionSpec = DimensionSpec {
    name: DIM_PRODUCT,
    surrogate_key: PRODUCT_KEY,
    source_key: STOCK_CODE,
    natural_key: PRODUCT_NATURAL_KEY,
    attributes: &[DESCRIPTION, PRICE],
};

/// Build `Dim_Customer`: `CustomerKey, CustomerID, Country`.
///
/// # Errors
///
/// See [`build_dimension`].
pub fn build_customer_dim(records: &DataFrame) -> Result<DataFrame> {
    build_dimension(records, &CUSTOMER)
}

/// Build `Dim_Product`: `ProductKey, ProductID, Description, Price`.
///
/// # Errors
///
/// See [`build_dimension`].
pub fn build_product_dim(records: &DataFrame) -> Result<DataFrame> {
    build_dimension(records, &PRODUCT)
}

/// Derive a dimension table from the cleaned record set.
///
/// # Errors
///
/// - [`WarehouseError::MissingColumn`] if a source column is absent
/// - [`WarehouseError::NullNaturalKey`] if the natural key has nulls
/// - [`WarehouseError::DuplicateKey`] if the result is not unique on either key
pub fn build_dimension(records: &DataFrame, spec: &DimensionSpec) -> Result<DataFrame> {
    let mut source_columns = vec![spec.source_key];
    source_columns.extend_from_slice(spec.attributes);
    require_columns(records, "cleaned records", &source_columns)?;

    let mut projected = records.select(source_columns)?;
    if spec.source_key != spec.natural_key {
        projected.rename(spec.source_key, spec.natural_key.into())?;
    }
    ensure_no_nulls(&projected, spec.name, spec.natural_key)?;

    let distinct = first_occurrences(&projected, spec.natural_key)?;
    let dim = with_surrogate_key(&distinct, spec.surrogate_key)?;

    ensure_unique(&dim, spec.name, spec.surrogate_key)?;
    ensure_unique(&dim, spec.name, spec.natural_key)?;

    tracing::debug!(
        "Built {} with {} rows from {} records",
        spec.name,
        dim.height(),
        records.height()
    );
    Ok(dim)
}

/// Keep the first row for each value of `key`, in input order.
///
/// # Errors
///
/// Fails if `key` is missing.
pub fn first_occurrences(df: &DataFrame, key: &str) -> Result<DataFrame> {
    Ok(df
        .clone()
        .lazy()
        .unique_stable(Some(vec![key.into()]), UniqueKeepStrategy::First)
        .collect()?)
}

/// Prepend a dense Int32 surrogate key `1..=height`.
///
/// # Errors
///
/// Fails if the table has more rows than an Int32 key can number.
pub fn with_surrogate_key(df: &DataFrame, name: &str) -> Result<DataFrame> {
    let height = i32::try_from(df.height()).map_err(|_| {
        WarehouseError::DataProcessing(format!(
            "{} rows exceed the Int32 surrogate key range",
            df.height()
        ))
    })?;
    let keys: Vec<i32> = (1..=height).collect();

    let mut columns = Vec::with_capacity(df.width() + 1);
    columns.push(Column::new(name.into(), keys));
    columns.extend(df.get_columns().iter().cloned());
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn records() -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new("Customer ID".into(), ["C2", "C1", "C2", "C3", "C1"]),
            Column::new("Country".into(), ["FR", "UK", "DE", "US", "IE"]),
            Column::new("StockCode".into(), ["P1", "P1", "P2", "P1", "P3"]),
            Column::new("Description".into(), ["Mug", "Mug v2", "Cup", "Mug", "Jar"]),
            Column::new("Price".into(), [1.5f64, 1.75, 0.5, 1.5, 3.0]),
        ])
    }

    #[test]
    fn test_customer_dim_keeps_first_seen_attributes() -> anyhow::Result<()> {
        let dim = build_customer_dim(&records()?)?;

        assert_eq!(dim.height(), 3);
        assert_eq!(
            dim.get_column_names()
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
            vec!["CustomerKey", "CustomerID", "Country"]
        );

        let keys = dim.column("CustomerKey")?.as_materialized_series().i32()?;
        let ids = dim.column("CustomerID")?.as_materialized_series().str()?;
        let countries = dim.column("Country")?.as_materialized_series().str()?;
        assert_eq!(keys.into_no_null_iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(ids.get(0).unwrap(), "C2");
        assert_eq!(ids.get(1).unwrap(), "C1");
        assert_eq!(ids.get(2).unwrap(), "C3");
        // C2 first appeared with FR, C1 with UK
        assert_eq!(countries.get(0).unwrap(), "FR");
        assert_eq!(countries.get(1).unwrap(), "UK");
        Ok(())
    }

    #[test]
    fn test_product_dim_surrogate_keys_are_dense() -> anyhow::Result<()> {
        let dim = build_product_dim(&records()?)?;

        assert_eq!(dim.height(), 3);
        let mut keys: Vec<i32> = dim
            .column("ProductKey")?
            .as_materialized_series()
            .i32()?
            .into_no_null_iter()
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(dim.column("Description")?.as_materialized_series().str()?.get(0).unwrap(), "Mug");
        assert_eq!(dim.column("Price")?.as_materialized_series().f64()?.get(0).unwrap(), 1.5);
        Ok(())
    }

    #[test]
    fn test_first_occurrences_keeps_input_order() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![
            Column::new("k".into(), [3i32, 1, 3, 2, 1]),
            Column::new("v".into(), ["a", "b", "c", "d", "e"]),
        ])?;
        let out = first_occurrences(&df, "k")?;
        let values: Vec<&str> = out
            .column("v")?
            .as_materialized_series()
            .str()?
            .into_no_null_iter()
            .collect();
        assert_eq!(values, vec!["a", "b", "d"]);
        assert!(first_occurrences(&df, "missing").is_err());
        Ok(())
    }

    #[test]
    fn test_missing_natural_key_column() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![Column::new("Country".into(), ["FR"])])?;
        let err = build_customer_dim(&df).expect_err("Customer ID is missing");
        assert!(matches!(err, WarehouseError::MissingColumn { .. }));
        Ok(())
    }

    #[test]
    fn test_null_natural_key_is_rejected() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![
            Column::new("Customer ID".into(), [Some("C1"), None]),
            Column::new("Country".into(), ["FR", "UK"]),
        ])?;
        let err = build_customer_dim(&df).expect_err("null customer id");
        assert!(matches!(err, WarehouseError::NullNaturalKey { rows: 1, .. }));
        Ok(())
    }

    #[test]
    fn test_empty_records_give_empty_dimension() -> anyhow::Result<()> {
        let df = records()?.head(Some(0));
        let dim = build_customer_dim(&df)?;
        assert_eq!(dim.height(), 0);
        assert_eq!(dim.width(), 3);
        Ok(())
    }
}
