//! Key and join integrity checks.

use crate::error::{Result, WarehouseError};
use polars::prelude::*;

/// Number of unmatched natural keys quoted in a referential-integrity error.
pub const SAMPLE_SIZE: usize = 5;

/// Fail with [`WarehouseError::MissingColumn`] unless every column exists.
pub fn require_columns(df: &DataFrame, table: &str, columns: &[&str]) -> Result<()> {
    let schema = df.schema();
    for column in columns {
        if schema.get(column).is_none() {
            return Err(WarehouseError::MissingColumn {
                table: table.to_owned(),
                column: (*column).to_owned(),
            });
        }
    }
    Ok(())
}

/// Number of values in `column` that repeat an earlier value.
pub fn duplicate_count(df: &DataFrame, column: &str) -> Result<usize> {
    let distinct = df.column(column)?.as_materialized_series().n_unique()?;
    Ok(df.height().saturating_sub(distinct))
}

/// Fail with [`WarehouseError::DuplicateKey`] if `column` is not unique.
pub fn ensure_unique(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    let duplicates = duplicate_count(df, column)?;
    if duplicates > 0 {
        tracing::error!("Duplicate {column} detected in {table}");
        return Err(WarehouseError::DuplicateKey {
            table: table.to_owned(),
            column: column.to_owned(),
            duplicates,
        });
    }
    Ok(())
}

/// Fail with [`WarehouseError::NullNaturalKey`] if `column` has nulls.
pub fn ensure_no_nulls(df: &DataFrame, table: &str, column: &str) -> Result<()> {
    let rows = df.column(column)?.null_count();
    if rows > 0 {
        return Err(WarehouseError::NullNaturalKey {
            table: table.to_owned(),
            column: column.to_owned(),
            rows,
        });
    }
    Ok(())
}

/// A left join against `dimension` on `key` is many-to-one only if `key` is
/// unique there; anything else would duplicate fact rows.
pub fn ensure_many_to_one(dimension_df: &DataFrame, dimension: &str, key: &str) -> Result<()> {
    let duplicates = duplicate_count(dimension_df, key)?;
    if duplicates > 0 {
        return Err(WarehouseError::JoinCardinality {
            dimension: dimension.to_owned(),
            detail: format!("{duplicates} repeated values in join key '{key}'"),
        });
    }
    Ok(())
}

/// Fail with [`WarehouseError::ReferentialIntegrity`] if `foreign_key` has nulls,
/// quoting up to [`SAMPLE_SIZE`] distinct values of `natural_key` from those rows.
pub fn ensure_resolved(
    joined: &DataFrame,
    dimension: &str,
    foreign_key: &str,
    natural_key: &str,
) -> Result<()> {
    let keys = joined.column(foreign_key)?;
    let rows = keys.null_count();
    if rows == 0 {
        return Ok(());
    }

    let unmatched = joined.filter(&keys.as_materialized_series().is_null())?;
    let sample = sample_values(&unmatched, natural_key)?;
    tracing::error!("Missing {foreign_key} in Fact_Invoice; integrity violated ({rows} rows)");
    Err(WarehouseError::ReferentialIntegrity {
        dimension: dimension.to_owned(),
        column: foreign_key.to_owned(),
        rows,
        sample,
    })
}

fn sample_values(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let Ok(values) = df.column(column) else {
        return Ok(Vec::new());
    };
    let values = values.as_materialized_series().cast(&DataType::String)?;
    let mut sample: Vec<String> = Vec::new();
    for value in values.str()? {
        let value = value.map_or_else(|| "<null>".to_owned(), ToOwned::to_owned);
        if !sample.contains(&value) {
            sample.push(value);
        }
        if sample.len() == SAMPLE_SIZE {
            break;
        }
    }
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_count() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![Column::new("k".into(), ["a", "b", "a", "a"])])?;
        assert_eq!(duplicate_count(&df, "k")?, 2);
        assert!(ensure_unique(&df, "T", "k").is_err());
        Ok(())
    }

    #[test]
    fn test_many_to_one_rejects_repeated_keys() -> anyhow::Result<()> {
        let dim = DataFrame::new(vec![
            Column::new("CustomerID".into(), ["C1", "C1"]),
            Column::new("CustomerKey".into(), [1i32, 2]),
        ])?;
        let err = ensure_many_to_one(&dim, "Dim_Customer", "CustomerID")
            .expect_err("C1 appears twice");
        assert!(matches!(err, WarehouseError::JoinCardinality { .. }));
        Ok(())
    }

    #[test]
    fn test_unresolved_keys_are_sampled() -> anyhow::Result<()> {
        let joined = DataFrame::new(vec![
            Column::new("StockCode".into(), ["P1", "P9", "P9", "P8"]),
            Column::new("ProductKey".into(), [Some(1i32), None, None, None]),
        ])?;
        let err = ensure_resolved(&joined, "Dim_Product", "ProductKey", "StockCode")
            .expect_err("three rows are unresolved");
        match err {
            WarehouseError::ReferentialIntegrity { rows, sample, .. } => {
                assert_eq!(rows, 3);
                assert_eq!(sample, vec!["P9".to_owned(), "P8".to_owned()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_require_columns() -> anyhow::Result<()> {
        let df = DataFrame::new(vec![Column::new("a".into(), [1i32])])?;
        assert!(require_columns(&df, "T", &["a"]).is_ok());
        assert!(matches!(
            require_columns(&df, "T", &["a", "b"]),
            Err(WarehouseError::MissingColumn { .. })
        ));
        Ok(())
    }
}
