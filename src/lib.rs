//! # invoice-dw - Invoice Star-Schema ETL
//!
//! Batch pipeline that ingests a raw invoice export, cleans it, and loads it
//! into a dimensional model of one fact table and three dimensions, stored as
//! Parquet files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use invoice_dw::warehouse::{ModelStore, TableSchemas, populate};
//! use polars::prelude::*;
//! use std::path::PathBuf;
//!
//! # fn example(records: DataFrame) -> anyhow::Result<()> {
//! let store = ModelStore::new(PathBuf::from("data/model"));
//! let report = populate(&records, &store, &TableSchemas::star_schema())?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`warehouse`]: dimension, date dimension and fact builders plus the Model Store
//!   - [`warehouse::integrity`]: key uniqueness, join cardinality and foreign key checks
//! - [`pipeline`]: ingestion, cleaning and stage orchestration
//! - [`config`]: JSON configuration
//! - [`error`]: Error types and handling utilities
//! - [`logging`]: console and rolling-file tracing setup
//!
//! ## Key Concepts
//!
//! ### Surrogate Keys
//!
//! Every dimension row gets a dense Int32 key `1..=N` in first-appearance order.
//! The fact table stores only these keys plus its measures.
//!
//! ### Unknown Dates
//!
//! `Dim_Date` covers a fixed calendar and one sentinel row (1999-01-01, key 1).
//! Invoice dates outside the calendar resolve to the sentinel instead of failing.
//! Unknown customers or products fail the whole fact build.

pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod warehouse;
