use anyhow::{Context as _, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use invoice_dw::config::{DEFAULT_CONFIG_PATH, PipelineConfig};
use invoice_dw::logging;
use invoice_dw::pipeline::{RunReport, Stage, run_stages};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "invoice-dw", about = "Invoice star-schema ETL pipeline")]
pub struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, global = true, env = "INVOICE_DW_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Run date selecting the YYYY/MM/DD partitions. Defaults to today.
    #[arg(long, global = true)]
    pub date: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Copy)]
pub enum Commands {
    /// Read the raw CSV into the raw Parquet layer
    Ingest,
    /// Clean the raw layer into the silver layer
    Transform,
    /// Create empty, typed tables in the Model Store
    InitSchema,
    /// Build and write the dimensions and the fact table
    Populate,
    /// Rebuild only the fact table from stored dimensions
    Fact,
    /// Ingest, transform, init-schema and populate in order
    Run,
}

impl Commands {
    fn stages(self) -> Vec<Stage> {
        match self {
            Self::Ingest => vec![Stage::Ingest],
            Self::Transform => vec![Stage::Transform],
            Self::InitSchema => vec![Stage::InitSchema],
            Self::Populate => vec![Stage::Populate],
            Self::Fact => vec![Stage::Fact],
            Self::Run => Stage::ALL.to_vec(),
        }
    }
}

pub fn run_command(cli: &Cli) -> Result<RunReport> {
    let config = load_config(&cli.config)?;
    logging::init(&config.paths.logs_path)?;

    let run_date = cli.date.unwrap_or_else(|| Local::now().date_naive());
    tracing::info!(
        "Using configuration {} for run date {run_date}",
        cli.config.display()
    );

    let report = run_stages(&config, run_date, &cli.command.stages()).inspect_err(|e| {
        tracing::error!("{e:#}");
    })?;
    tracing::debug!(
        "Log file: {}",
        logging::current_log_path(&config.paths.logs_path).display()
    );
    Ok(report)
}

/// A missing file at the default location means built-in defaults; an
/// explicitly named file must exist.
fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        return Ok(PipelineConfig::default());
    }
    PipelineConfig::from_file(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
