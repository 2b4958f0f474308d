//! Batch stages that feed the star-schema model.
//!
//! ```text
//! raw CSV ──ingest──> raw/YYYY/MM/DD/invoices.parquet
//!         ──transform──> silver/YYYY/MM/DD/invoices_clean.parquet
//!         ──init-schema──> model/<Table>/<Table>.parquet (empty, typed)
//!         ──populate──> model/Dim_*/ then model/Fact_Invoice/
//! ```
//!
//! Each stage reads only what earlier stages wrote, so any one of them can be
//! run alone with [`run_stage`].

pub mod clean;
pub mod executor;
pub mod ingest;

pub use clean::{CleaningReport, TransformOutput, clean_records, parse_invoice_date, transform};
pub use executor::{RunReport, Stage, StageReport, load_clean_records, run_stage, run_stages};
pub use ingest::{IngestReport, ingest};
