//! Logging setup for the pipeline binary.
//!
//! Logs go to the console and to daily rolling files in the configured logs
//! directory:
//!
//! - `etl.<date>.log`: everything the filter lets through
//! - `error.<date>.log`: warnings and errors only
//!
//! The level defaults to `info` and can be overridden with `RUST_LOG`.
//!
//! ```no_run
//! use invoice_dw::logging;
//! use std::path::Path;
//!
//! logging::init(Path::new("data/logs"))?;
//! tracing::info!("Pipeline started");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const LOG_PREFIX: &str = "etl";
const ERROR_LOG_PREFIX: &str = "error";
const MAX_LOG_FILES: usize = 10;

/// Install the global subscriber.
///
/// Calling this again after a subscriber is installed is a no-op.
///
/// # Errors
///
/// Returns error if the log directory cannot be created or file appenders fail
pub fn init(log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let all_logs_appender = appender(log_dir, LOG_PREFIX)?;
    let error_logs_appender = appender(log_dir, ERROR_LOG_PREFIX)?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Failed to create env filter")?;

    let stdout_layer = fmt::layer().with_target(false).compact();

    let all_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(all_logs_appender);

    let error_logs_layer = fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false)
        .with_writer(error_logs_appender)
        .with_filter(EnvFilter::new("warn"));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(all_logs_layer)
        .with(error_logs_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Logging initialized, log directory: {}", log_dir.display());
    }
    Ok(())
}

/// Path of today's main log file in `log_dir`
pub fn current_log_path(log_dir: &Path) -> PathBuf {
    dated_log_path(log_dir, LOG_PREFIX)
}

/// Path of today's warn-and-above log file in `log_dir`
pub fn current_error_log_path(log_dir: &Path) -> PathBuf {
    dated_log_path(log_dir, ERROR_LOG_PREFIX)
}

fn appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} file appender"))
}

fn dated_log_path(log_dir: &Path, prefix: &str) -> PathBuf {
    // The appender names files by UTC date.
    let today = chrono::Utc::now().format("%Y-%m-%d");
    log_dir.join(format!("{prefix}.{today}.log"))
}
