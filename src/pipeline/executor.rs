//! Stage execution engine.
//!
//! Runs pipeline stages in order against one configuration and run date,
//! stopping at the first failure, and reports what each stage did.

use super::clean::transform;
use super::ingest::ingest;
use crate::config::PipelineConfig;
use crate::error::WarehouseError;
use crate::io::read_parquet;
use crate::warehouse::populate::{populate, rebuild_fact};
use crate::warehouse::schema::initialize_store;
use crate::warehouse::store::ModelStore;
use anyhow::{Context as _, Result};
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use std::fmt;
use std::time::{Duration, Instant};

/// One step of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Raw CSV to raw Parquet
    Ingest,

    /// Raw Parquet to cleaned Parquet
    Transform,

    /// Empty typed tables in the Model Store
    InitSchema,

    /// Dimensions then fact from the cleaned file
    Populate,

    /// Fact only, against stored dimensions
    Fact,
}

impl Stage {
    /// The full batch, in order.
    pub const ALL: [Self; 4] = [Self::Ingest, Self::Transform, Self::InitSchema, Self::Populate];

    pub fn name(self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Transform => "transform",
            Self::InitSchema => "init-schema",
            Self::Populate => "populate",
            Self::Fact => "fact",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What one stage did
#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: Stage,
    pub rows: usize,
    pub detail: String,
    pub duration: Duration,
}

/// Report generated after running one or more stages
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_date: NaiveDate,
    pub stages: Vec<StageReport>,
    pub duration: Duration,
}

impl RunReport {
    /// Create a summary message
    pub fn summary(&self) -> String {
        let stages = self
            .stages
            .iter()
            .map(|s| s.stage.name())
            .collect::<Vec<_>>()
            .join(" -> ");
        format!(
            "Run {} completed: {} ({} stages), {:.2}s",
            self.run_date,
            stages,
            self.stages.len(),
            self.duration.as_secs_f64()
        )
    }
}

/// Run `stages` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns the first stage error, with the stage name as context.
pub fn run_stages(
    config: &PipelineConfig,
    run_date: NaiveDate,
    stages: &[Stage],
) -> Result<RunReport> {
    let start = Instant::now();
    let mut report = RunReport {
        run_date,
        ..RunReport::default()
    };

    for stage in stages {
        tracing::info!("=== Stage: {stage} ===");
        let stage_report = run_stage(config, run_date, *stage)
            .with_context(|| format!("Stage '{stage}' failed"))?;
        tracing::info!("{stage}: {}", stage_report.detail);
        report.stages.push(stage_report);
    }

    report.duration = start.elapsed();
    tracing::info!("{}", report.summary());
    Ok(report)
}

/// Run a single stage.
///
/// # Errors
///
/// Fails with the stage's own error.
pub fn run_stage(config: &PipelineConfig, run_date: NaiveDate, stage: Stage) -> Result<StageReport> {
    let start = Instant::now();
    let store = ModelStore::new(config.paths.model_dest_base.clone());
    let schemas = config.table_schemas();

    let (rows, detail) = match stage {
        Stage::Ingest => {
            let out = ingest(config, run_date)?;
            (
                out.rows,
                format!("{} -> {}", out.source.display(), out.destination.display()),
            )
        }
        Stage::Transform => {
            let out = transform(config, run_date)?;
            (out.report.rows_after, out.report.summary())
        }
        Stage::InitSchema => {
            let tables = initialize_store(&store, &schemas)?;
            (0, format!("initialized {}", tables.join(", ")))
        }
        Stage::Populate => {
            let records = load_clean_records(config, run_date)?;
            let out = populate(&records, &store, &schemas)?;
            (out.records, out.summary())
        }
        Stage::Fact => {
            let records = load_clean_records(config, run_date)?;
            let out = rebuild_fact(&records, &store, &schemas)?;
            (out.records, out.summary())
        }
    };

    Ok(StageReport {
        stage,
        rows,
        detail,
        duration: start.elapsed(),
    })
}

/// Read the cleaned record set for `run_date`.
///
/// # Errors
///
/// Fails if the cleaned file is missing or unreadable.
pub fn load_clean_records(config: &PipelineConfig, run_date: NaiveDate) -> Result<DataFrame> {
    let path = config.paths.clean_file(run_date);
    tracing::info!("Loading cleaned records from {}", path.display());
    let records = read_parquet(&path).map_err(|e| match e {
        WarehouseError::InvalidPath(_) => WarehouseError::InvalidPath(format!(
            "Cleaned data not found at {}; run the transform stage first",
            path.display()
        )),
        other => other,
    })?;
    tracing::info!("Loaded {} cleaned records", records.height());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warehouse::columns::{DIM_DATE, FACT_INVOICE};
    use tempfile::TempDir;

    fn config_in(temp: &TempDir) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.paths.raw_csv = temp.path().join("invoices.csv");
        config.paths.raw_dest_base = temp.path().join("raw");
        config.paths.trans_dest_base = temp.path().join("silver");
        config.paths.model_dest_base = temp.path().join("model");
        config
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::InitSchema.to_string(), "init-schema");
        assert_eq!(Stage::ALL.len(), 4);
        assert!(!Stage::ALL.contains(&Stage::Fact));
    }

    #[test]
    fn test_init_schema_stage_alone() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config = config_in(&temp);

        let report = run_stages(&config, NaiveDate::default(), &[Stage::InitSchema])?;

        assert_eq!(report.stages.len(), 1);
        let store = ModelStore::new(config.paths.model_dest_base.clone());
        assert!(store.contains(DIM_DATE));
        assert_eq!(store.read_table(FACT_INVOICE)?.height(), 0);
        Ok(())
    }

    #[test]
    fn test_run_stops_at_first_failure() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config = config_in(&temp);

        let err = run_stages(&config, NaiveDate::default(), &Stage::ALL)
            .expect_err("raw CSV does not exist");
        assert!(format!("{err:#}").contains("Stage 'ingest' failed"));
        assert!(!config.paths.model_dest_base.exists());
        Ok(())
    }

    #[test]
    fn test_populate_without_clean_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let config = config_in(&temp);
        let err = run_stage(&config, NaiveDate::default(), Stage::Populate)
            .expect_err("transform never ran");
        let err = err.downcast::<WarehouseError>()?;
        assert!(matches!(err, WarehouseError::InvalidPath(_)));
        Ok(())
    }
}
