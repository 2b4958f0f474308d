//! Pipeline configuration.
//!
//! Loaded from a JSON file (default `config/config.json`). Every section has
//! defaults so a partial file is enough:
//!
//! ```json
//! {
//!   "paths": { "raw_csv": "data/online_retail.csv", "model_dest_base": "data/gold" },
//!   "parameters": { "encoding": "latin-1" }
//! }
//! ```

use crate::error::{Result, ResultExt as _, WarehouseError};
use crate::warehouse::schema::{ColumnDef, TableSchemas};
use chrono::{Datelike as _, NaiveDate};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub parameters: ParametersConfig,

    /// Declared table schemas; empty means the built-in star schema.
    #[serde(default)]
    pub schemas: TableSchemas,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WarehouseError::Config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parse a configuration from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`WarehouseError::Config`] on malformed JSON or an invalid setting.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to pretty JSON
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Declared schemas, falling back to the built-in star schema.
    pub fn table_schemas(&self) -> TableSchemas {
        if self.schemas.is_empty() {
            TableSchemas::star_schema()
        } else {
            self.schemas.clone()
        }
    }

    fn validate(&self) -> Result<()> {
        self.parameters.delimiter_byte()?;
        self.parameters.source_encoding()?;
        for (table, columns) in self.schemas.iter() {
            if columns.is_empty() {
                return Err(WarehouseError::Config(format!(
                    "Schema for '{table}' declares no columns"
                )));
            }
            columns
                .iter()
                .map(ColumnDef::polars_type)
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(())
    }
}

/// Filesystem layout of the pipeline layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw CSV export to ingest
    #[serde(default = "default_raw_csv")]
    pub raw_csv: PathBuf,

    /// Base directory of the raw (bronze) Parquet layer
    #[serde(default = "default_raw_dest")]
    pub raw_dest_base: PathBuf,

    /// Base directory of the cleaned (silver) layer
    #[serde(default = "default_trans_dest")]
    pub trans_dest_base: PathBuf,

    /// Base directory of the Model Store
    #[serde(default = "default_model_dest")]
    pub model_dest_base: PathBuf,

    /// Directory for rolling log files
    #[serde(default = "default_logs_path")]
    pub logs_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_csv: default_raw_csv(),
            raw_dest_base: default_raw_dest(),
            trans_dest_base: default_trans_dest(),
            model_dest_base: default_model_dest(),
            logs_path: default_logs_path(),
        }
    }
}

impl PathsConfig {
    /// `<raw_dest_base>/YYYY/MM/DD/invoices.parquet`
    pub fn raw_file(&self, run_date: NaiveDate) -> PathBuf {
        partitioned(&self.raw_dest_base, run_date).join("invoices.parquet")
    }

    /// `<trans_dest_base>/YYYY/MM/DD/invoices_clean.parquet`
    pub fn clean_file(&self, run_date: NaiveDate) -> PathBuf {
        partitioned(&self.trans_dest_base, run_date).join("invoices_clean.parquet")
    }
}

/// Reader parameters for the raw export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParametersConfig {
    /// Source file encoding
    #[serde(default = "default_encoding")]
    pub encoding: String,

    /// CSV delimiter character
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl Default for ParametersConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            delimiter: default_delimiter(),
        }
    }
}

impl ParametersConfig {
    /// The delimiter as the single byte the CSV reader expects.
    ///
    /// # Errors
    ///
    /// Fails unless the delimiter is exactly one ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8> {
        match self.delimiter.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(WarehouseError::Config(format!(
                "Delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            ))),
        }
    }

    /// The source encoding, looked up by its WHATWG label
    /// (`utf-8`, `latin-1`, `iso-8859-1`, `cp1252`, `windows-1252`, ...).
    ///
    /// # Errors
    ///
    /// Fails on a label `encoding_rs` does not know.
    pub fn source_encoding(&self) -> Result<&'static Encoding> {
        let label = match self.encoding.trim().to_lowercase().as_str() {
            // Python spelling; the WHATWG label is `latin1`.
            "latin-1" | "latin_1" => "latin1".to_owned(),
            other => other.to_owned(),
        };
        Encoding::for_label(label.as_bytes()).ok_or_else(|| {
            WarehouseError::Config(format!("Unsupported encoding '{}'", self.encoding))
        })
    }
}

/// `base/YYYY/MM/DD`
pub fn partitioned(base: &Path, run_date: NaiveDate) -> PathBuf {
    base.join(format!("{:04}", run_date.year()))
        .join(format!("{:02}", run_date.month()))
        .join(format!("{:02}", run_date.day()))
}

// Default value functions
fn default_raw_csv() -> PathBuf {
    PathBuf::from("data/online_retail_II.csv")
}

fn default_raw_dest() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_trans_dest() -> PathBuf {
    PathBuf::from("data/silver")
}

fn default_model_dest() -> PathBuf {
    PathBuf::from("data/model")
}

fn default_logs_path() -> PathBuf {
    PathBuf::from("data/logs")
}

fn default_encoding() -> String {
    "utf-8".to_owned()
}

fn default_delimiter() -> String {
    ",".to_owned()
}
