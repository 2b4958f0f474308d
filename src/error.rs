//! Error handling for the warehouse loader.
//!
//! Every failure the dimensional model can raise is a variant of
//! [`WarehouseError`]. Variants are grouped into an [`ErrorKind`] so callers can
//! tell a bad input file from a builder defect or a referential-integrity gap:
//!
//! ```
//! use invoice_dw::error::{ErrorKind, WarehouseError};
//!
//! let err = WarehouseError::ReferentialIntegrity {
//!     dimension: "Dim_Product".to_owned(),
//!     column: "ProductKey".to_owned(),
//!     rows: 1,
//!     sample: vec!["P999".to_owned()],
//! };
//! assert_eq!(err.kind(), ErrorKind::ReferentialIntegrity);
//! ```
//!
//! ## Context Extension Trait
//!
//! [`ResultExt`] adds `.context()` to any `Result` whose error converts into
//! [`WarehouseError`]:
//!
//! ```no_run
//! use invoice_dw::error::ResultExt;
//! use std::fs;
//!
//! fn load_config() -> invoice_dw::error::Result<String> {
//!     fs::read_to_string("config/config.json").context("Failed to load config")
//! }
//! ```

use std::fmt;

/// Broad category of a [`WarehouseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, unreadable or empty input.
    Input,
    /// A builder produced something it never should (duplicate keys, fan-out).
    Structural,
    /// A fact row points at a natural key the dimension does not contain.
    ReferentialIntegrity,
    /// Configuration could not be loaded or is invalid.
    Config,
    /// Filesystem failure.
    Io,
    /// Polars or other data processing failure.
    DataProcessing,
}

/// Main error type for warehouse operations.
#[derive(Debug)]
pub enum WarehouseError {
    /// I/O errors (file operations)
    Io(std::io::Error),

    /// Data processing errors (Polars, parsing, etc.)
    DataProcessing(String),

    /// Configuration errors
    Config(String),

    /// Input file not found or invalid path
    InvalidPath(String),

    /// Input record set has no rows
    EmptyInput(String),

    /// A required column is absent from a table
    MissingColumn { table: String, column: String },

    /// A natural key column contains nulls
    NullNaturalKey {
        table: String,
        column: String,
        rows: usize,
    },

    /// A key column that must be unique is not
    DuplicateKey {
        table: String,
        column: String,
        duplicates: usize,
    },

    /// A join that must be many-to-one would fan out or drop rows
    JoinCardinality { dimension: String, detail: String },

    /// The date dimension has no row for the sentinel date
    MissingSentinel { dimension: String, date: String },

    /// Fact rows reference natural keys missing from a dimension
    ReferentialIntegrity {
        dimension: String,
        column: String,
        rows: usize,
        sample: Vec<String>,
    },

    /// Generic error with context
    Other(String),
}

impl WarehouseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::Io,
            Self::DataProcessing(_) | Self::Other(_) => ErrorKind::DataProcessing,
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidPath(_)
            | Self::EmptyInput(_)
            | Self::MissingColumn { .. }
            | Self::NullNaturalKey { .. } => ErrorKind::Input,
            Self::DuplicateKey { .. }
            | Self::JoinCardinality { .. }
            | Self::MissingSentinel { .. } => ErrorKind::Structural,
            Self::ReferentialIntegrity { .. } => ErrorKind::ReferentialIntegrity,
        }
    }
}

impl fmt::Display for WarehouseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::DataProcessing(msg) => write!(f, "Data processing error: {msg}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::EmptyInput(msg) => write!(f, "Empty input: {msg}"),
            Self::MissingColumn { table, column } => {
                write!(f, "Column '{column}' not found in {table}")
            }
            Self::NullNaturalKey {
                table,
                column,
                rows,
            } => write!(f, "{rows} rows with null natural key '{column}' in {table}"),
            Self::DuplicateKey {
                table,
                column,
                duplicates,
            } => write!(
                f,
                "Duplicate {column} detected in {table} ({duplicates} duplicate values)"
            ),
            Self::JoinCardinality { dimension, detail } => {
                write!(f, "Join against {dimension} is not many-to-one: {detail}")
            }
            Self::MissingSentinel { dimension, date } => {
                write!(f, "Sentinel row {date} missing from {dimension}")
            }
            Self::ReferentialIntegrity {
                dimension,
                column,
                rows,
                sample,
            } => write!(
                f,
                "Missing {column} in Fact_Invoice for {rows} rows; integrity violated against {dimension} (unmatched keys: {})",
                sample.join(", ")
            ),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for WarehouseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WarehouseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<anyhow::Error> for WarehouseError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for WarehouseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

impl From<polars::error::PolarsError> for WarehouseError {
    fn from(err: polars::error::PolarsError) -> Self {
        Self::DataProcessing(err.to_string())
    }
}

/// Result type alias for warehouse operations.
pub type Result<T> = std::result::Result<T, WarehouseError>;

/// Extension trait to add context to results.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<WarehouseError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let err: WarehouseError = e.into();
            WarehouseError::Other(format!("{}: {}", msg.into(), err))
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let err: WarehouseError = e.into();
            WarehouseError::Other(format!("{}: {}", f(), err))
        })
    }
}
