//! Declared table schemas.
//!
//! The configuration maps each table to an ordered column list with type names.
//! Those declarations serve two purposes: initialising empty Parquet files with
//! the right schema before the first load, and conforming every built table to
//! its declared dtypes and column order before it is written.

use super::columns::{
    COUNTRY, CUSTOMER_KEY, CUSTOMER_NATURAL_KEY, DATE_KEY, DAY, DESCRIPTION, DIM_CUSTOMER,
    DIM_DATE, DIM_PRODUCT, FACT_INVOICE, INVOICE_DATE, MONTH, PRICE, PRODUCT_KEY,
    PRODUCT_NATURAL_KEY, QUANTITY, QUARTER, WEEKDAY, YEAR,
};
use super::store::ModelStore;
use crate::error::{Result, WarehouseError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One declared column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,

    /// Type name, e.g. `int32`, `string`, `timestamp[s]`
    #[serde(rename = "type")]
    pub dtype: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, dtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: dtype.into(),
        }
    }

    /// Map the declared type name to a Polars `DataType`.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Config`] for an unknown type name.
    pub fn polars_type(&self) -> Result<DataType> {
        parse_type_string(&self.dtype).ok_or_else(|| {
            WarehouseError::Config(format!(
                "Unknown type '{}' for field '{}'",
                self.dtype, self.name
            ))
        })
    }
}

/// Table name → ordered column declarations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchemas(BTreeMap<String, Vec<ColumnDef>>);

impl TableSchemas {
    /// The warehouse's own four tables.
    pub fn star_schema() -> Self {
        let mut tables = BTreeMap::new();
        tables.insert(
            DIM_DATE.to_owned(),
            vec![
                ColumnDef::new(DATE_KEY, "int32"),
                ColumnDef::new(INVOICE_DATE, "date"),
                ColumnDef::new(YEAR, "int32"),
                ColumnDef::new(QUARTER, "int32"),
                ColumnDef::new(MONTH, "int32"),
                ColumnDef::new(DAY, "int32"),
                ColumnDef::new(WEEKDAY, "int32"),
            ],
        );
        tables.insert(
            DIM_CUSTOMER.to_owned(),
            vec![
                ColumnDef::new(CUSTOMER_KEY, "int32"),
                ColumnDef::new(CUSTOMER_NATURAL_KEY, "string"),
                ColumnDef::new(COUNTRY, "string"),
            ],
        );
        tables.insert(
            DIM_PRODUCT.to_owned(),
            vec![
                ColumnDef::new(PRODUCT_KEY, "int32"),
                ColumnDef::new(PRODUCT_NATURAL_KEY, "string"),
                ColumnDef::new(DESCRIPTION, "string"),
                ColumnDef::new(PRICE, "float64"),
            ],
        );
        tables.insert(
            FACT_INVOICE.to_owned(),
            vec![
                ColumnDef::new(DATE_KEY, "int32"),
                ColumnDef::new(CUSTOMER_KEY, "int32"),
                ColumnDef::new(PRODUCT_KEY, "int32"),
                ColumnDef::new(QUANTITY, "int64"),
                ColumnDef::new(PRICE, "float64"),
            ],
        );
        Self(tables)
    }

    pub fn get(&self, table: &str) -> Option<&[ColumnDef]> {
        self.0.get(table).map(Vec::as_slice)
    }

    pub fn insert(&mut self, table: impl Into<String>, columns: Vec<ColumnDef>) {
        self.0.insert(table.into(), columns);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<ColumnDef>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Polars schema for a declared table.
    ///
    /// # Errors
    ///
    /// Fails if the table is not declared or a type name is unknown.
    pub fn polars_schema(&self, table: &str) -> Result<Schema> {
        let columns = self.get(table).ok_or_else(|| {
            WarehouseError::Config(format!("No schema declared for table '{table}'"))
        })?;
        let fields = columns
            .iter()
            .map(|c| Ok(Field::new(c.name.as_str().into(), c.polars_type()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Schema::from_iter(fields))
    }

    /// Cast `df` to the declared schema of `table`, in declared column order.
    ///
    /// Undeclared tables are returned unchanged. Extra columns are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::MissingColumn`] if a declared column is absent, or a
    /// data processing error if a value cannot be cast losslessly.
    pub fn conform(&self, table: &str, df: &DataFrame) -> Result<DataFrame> {
        let Some(columns) = self.get(table) else {
            return Ok(df.clone());
        };

        let mut conformed = Vec::with_capacity(columns.len());
        for def in columns {
            let column = df
                .column(&def.name)
                .map_err(|_| WarehouseError::MissingColumn {
                    table: table.to_owned(),
                    column: def.name.clone(),
                })?;
            let target = def.polars_type()?;
            let series = column.as_materialized_series();
            let cast = if series.dtype() == &target {
                series.clone()
            } else {
                series.strict_cast(&target).map_err(|e| {
                    WarehouseError::DataProcessing(format!(
                        "Cannot cast {table}.{} from {} to {target}: {e}",
                        def.name,
                        series.dtype()
                    ))
                })?
            };
            conformed.push(Column::from(cast));
        }
        Ok(DataFrame::new(conformed)?)
    }
}

/// Create every declared table directory with an empty, typed Parquet file.
///
/// # Errors
///
/// Fails on an invalid type declaration or a filesystem error.
pub fn initialize_store(store: &ModelStore, schemas: &TableSchemas) -> Result<Vec<String>> {
    let mut created = Vec::with_capacity(schemas.len());
    for (table, _) in schemas.iter() {
        let schema = schemas.polars_schema(table)?;
        let mut empty = DataFrame::empty_with_schema(&schema);
        let path = store.write_table(table, &mut empty)?;
        tracing::info!("Initialized schema file: {}", path.display());
        created.push(table.clone());
    }
    Ok(created)
}

/// Parse a declared type name to a Polars `DataType`
fn parse_type_string(type_str: &str) -> Option<DataType> {
    match type_str {
        "int8" => Some(DataType::Int8),
        "int16" => Some(DataType::Int16),
        "int32" => Some(DataType::Int32),
        "int64" => Some(DataType::Int64),
        "float64" => Some(DataType::Float64),
        "string" => Some(DataType::String),
        "date" => Some(DataType::Date),
        // Polars has no second resolution; seconds are stored as milliseconds.
        "timestamp[s]" | "timestamp[ms]" => {
            Some(DataType::Datetime(TimeUnit::Milliseconds, None))
        }
        _ => None,
    }
}
