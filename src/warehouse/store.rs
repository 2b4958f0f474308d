//! Model Store: one directory per table, one Parquet file per table.
//!
//! ```text
//! <base>/Dim_Date/Dim_Date.parquet
//! <base>/Dim_Customer/Dim_Customer.parquet
//! <base>/Dim_Product/Dim_Product.parquet
//! <base>/Fact_Invoice/Fact_Invoice.parquet
//! ```
//!
//! Writes are full overwrites. Each file is written to a temporary sibling and
//! renamed into place, so a reader sees either the previous table or the new one.
//! There is no multi-table commit and no locking: one run per base path.

use super::columns::{DIM_CUSTOMER, DIM_DATE, DIM_PRODUCT};
use super::Dimensions;
use crate::error::{Result, WarehouseError};
use crate::io::{read_parquet, write_parquet};
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Table file extension
pub const TABLE_FORMAT: &str = "parquet";

#[derive(Debug, Clone)]
pub struct ModelStore {
    base_path: PathBuf,
}

impl ModelStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<base>/<table>`
    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.base_path.join(table)
    }

    /// `<base>/<table>/<table>.parquet`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.table_dir(table)
            .join(format!("{table}.{TABLE_FORMAT}"))
    }

    pub fn contains(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    /// Overwrite a table, creating its directory if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or the Parquet write fails.
    pub fn write_table(&self, table: &str, df: &mut DataFrame) -> Result<PathBuf> {
        let path = self.table_path(table);
        write_parquet(df, &path)?;
        tracing::debug!("Wrote {table} ({} rows) to {}", df.height(), path.display());
        Ok(path)
    }

    /// Delete a table's file. Returns whether there was one.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be removed.
    pub fn remove_table(&self, table: &str) -> Result<bool> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Ok(false);
        }
        std::fs::remove_file(&path)?;
        tracing::debug!("Removed {table} at {}", path.display());
        Ok(true)
    }

    /// Read a table back.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::InvalidPath`] if the table has never been written.
    pub fn read_table(&self, table: &str) -> Result<DataFrame> {
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(WarehouseError::InvalidPath(format!(
                "Table {table} not found at {}",
                path.display()
            )));
        }
        read_parquet(&path)
    }

    /// Read the three dimensions the fact builder joins against.
    ///
    /// # Errors
    ///
    /// Fails if any dimension is missing or unreadable.
    pub fn load_dimensions(&self) -> Result<Dimensions> {
        Ok(Dimensions {
            date: self.read_table(DIM_DATE)?,
            customer: self.read_table(DIM_CUSTOMER)?,
            product: self.read_table(DIM_PRODUCT)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::date::{CalendarRange, build_date_dimension};
    use tempfile::TempDir;

    #[test]
    fn test_table_paths() {
        let store = ModelStore::new(PathBuf::from("/dw"));
        assert_eq!(store.table_dir("Dim_Date"), PathBuf::from("/dw/Dim_Date"));
        assert_eq!(
            store.table_path("Fact_Invoice"),
            PathBuf::from("/dw/Fact_Invoice/Fact_Invoice.parquet")
        );
    }

    #[test]
    fn test_round_trip_preserves_values_and_types() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = ModelStore::new(temp.path().to_path_buf());

        let mut df = DataFrame::new(vec![
            Column::new("ProductKey".into(), [1i32, 2, 3]),
            Column::new("ProductID".into(), ["P100", "P200", "P300"]),
            Column::new("Price".into(), [2.0f64, 0.85, 12.5]),
            Column::new("Stamp".into(), [1_700_000_000_000i64, 0, 86_400_000])
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        ])?;
        store.write_table("Dim_Product", &mut df)?;

        let back = store.read_table("Dim_Product")?;
        assert!(back.equals_missing(&df));
        assert_eq!(back.schema(), df.schema());
        Ok(())
    }

    #[test]
    fn test_date_dimension_round_trip() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = ModelStore::new(temp.path().to_path_buf());

        let mut dim = build_date_dimension(&CalendarRange::default())?;
        store.write_table(DIM_DATE, &mut dim)?;
        let back = store.read_table(DIM_DATE)?;

        assert_eq!(back.column("InvoiceDate")?.dtype(), &DataType::Date);
        assert_eq!(back.column("DateKey")?.dtype(), &DataType::Int32);
        assert!(back.equals_missing(&dim));
        Ok(())
    }

    #[test]
    fn test_overwrite_replaces_table() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = ModelStore::new(temp.path().to_path_buf());

        let mut first = DataFrame::new(vec![Column::new("k".into(), [1i32, 2, 3])])?;
        let mut second = DataFrame::new(vec![Column::new("k".into(), [7i32])])?;
        store.write_table("T", &mut first)?;
        store.write_table("T", &mut second)?;

        assert_eq!(store.read_table("T")?.height(), 1);
        Ok(())
    }

    #[test]
    fn test_remove_table() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let store = ModelStore::new(temp.path().to_path_buf());
        let mut df = DataFrame::new(vec![Column::new("k".into(), [1i32])])?;
        store.write_table("T", &mut df)?;

        assert!(store.remove_table("T")?);
        assert!(!store.contains("T"));
        assert!(!store.remove_table("T")?);
        Ok(())
    }

    #[test]
    fn test_missing_table_is_invalid_path() {
        let store = ModelStore::new(PathBuf::from("/nonexistent/dw"));
        let err = store.read_table(DIM_CUSTOMER).expect_err("nothing was written");
        assert!(matches!(err, WarehouseError::InvalidPath(_)));
    }
}
