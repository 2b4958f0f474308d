//! Star-schema model over cleaned invoice records.
//!
//! ```text
//! cleaned records ─┬─> Dim_Date (fixed calendar + sentinel)
//!                  ├─> Dim_Customer (first row per Customer ID)
//!                  ├─> Dim_Product (first row per StockCode)
//!                  └─> Fact_Invoice (left joins onto the three dimensions)
//! ```
//!
//! Tables live in a [`ModelStore`], one Parquet file per table. Dimensions are
//! written before the fact table, and the fact table is only written once every
//! foreign key resolved.

pub mod columns;
pub mod date;
pub mod dimension;
pub mod fact;
pub mod integrity;
pub mod populate;
pub mod schema;
pub mod store;

pub use date::{CalendarRange, build_date_dim, build_date_dimension, sentinel_date};
pub use dimension::{build_customer_dim, build_product_dim};
pub use fact::{FactBuild, build_fact_from_store, build_fact_invoice};
pub use populate::{PopulateReport, build_dimensions, populate, rebuild_fact};
pub use schema::{ColumnDef, TableSchemas, initialize_store};
pub use store::ModelStore;

use polars::prelude::DataFrame;

/// The three dimension tables a fact build joins against
#[derive(Debug, Clone)]
pub struct Dimensions {
    pub date: DataFrame,
    pub customer: DataFrame,
    pub product: DataFrame,
}
