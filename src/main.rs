//! # invoice-dw
//!
//! Command-line entry point for the invoice ETL pipeline.
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load configuration, initialise logging
//!   └─> Run the selected stages in order
//! ```
//!
//! ```bash
//! invoice-dw --config config/config.json run
//! invoice-dw --date 2025-07-28 populate
//! ```
//!
//! Any failure surfaces as an error return, so the process exits non-zero.

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli::run_command(&cli)?;
    Ok(())
}
