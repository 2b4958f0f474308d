//! Raw layer to cleaned (silver) layer.
//!
//! Rules run in a fixed order and each one records how many rows it dropped:
//!
//! 1. trim whitespace in every string column
//! 2. parse `InvoiceDate`, dropping rows that match no accepted format
//! 3. drop rows without an `Invoice`
//! 4. drop exact duplicate rows, keeping the first
//! 5. coerce `Price` and `Quantity`, dropping null or non-positive values and
//!    fractional quantities
//! 6. drop rows without a `Customer ID` or `StockCode`

use crate::config::PipelineConfig;
use crate::error::{Result, WarehouseError};
use crate::io::{read_parquet, write_parquet};
use crate::warehouse::columns::{CUSTOMER_ID, INVOICE, INVOICE_DATE, PRICE, QUANTITY, STOCK_CODE};
use crate::warehouse::integrity::{duplicate_count, require_columns};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Accepted `InvoiceDate` layouts with a time of day, tried in order.
pub const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%m/%d/%Y %H:%M:%S",
];

/// Accepted date-only layouts, read as midnight.
pub const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

/// Rows dropped by each cleaning rule
#[derive(Debug, Clone, Default)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub unparseable_dates: usize,
    pub missing_invoice: usize,

    /// Rows sharing an `Invoice` with an earlier row. Kept: one invoice has many lines.
    pub repeated_invoices: usize,

    pub duplicate_rows: usize,
    pub invalid_amounts: usize,
    pub fractional_quantities: usize,
    pub missing_natural_keys: usize,
    pub rows_after: usize,
    pub duration: Duration,
}

impl CleaningReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn summary(&self) -> String {
        format!(
            "Cleaning completed: {} -> {} rows ({} bad dates, {} missing invoice, {} duplicates, {} bad amounts, {} fractional quantities, {} missing keys), {:.2}s",
            self.rows_before,
            self.rows_after,
            self.unparseable_dates,
            self.missing_invoice,
            self.duplicate_rows,
            self.invalid_amounts,
            self.fractional_quantities,
            self.missing_natural_keys,
            self.duration.as_secs_f64()
        )
    }
}

/// A cleaning run written to the silver layer
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub report: CleaningReport,
}

/// Clean the raw file for `run_date` and write `invoices_clean.parquet`.
///
/// # Errors
///
/// - [`WarehouseError::InvalidPath`] if the raw file is missing
/// - [`WarehouseError::EmptyInput`] if it has no rows
/// - any cleaning or write failure
pub fn transform(config: &PipelineConfig, run_date: NaiveDate) -> Result<TransformOutput> {
    let source = config.paths.raw_file(run_date);
    let destination = config.paths.clean_file(run_date);

    tracing::info!("Reading raw data from {}", source.display());
    let raw = read_parquet(&source)?;
    if raw.height() == 0 {
        return Err(WarehouseError::EmptyInput(format!(
            "Raw dataset {} is empty",
            source.display()
        )));
    }

    let (mut cleaned, report) = clean_records(raw)?;
    write_parquet(&mut cleaned, &destination)?;
    tracing::info!("Transformed data written to {}", destination.display());

    Ok(TransformOutput {
        source,
        destination,
        report,
    })
}

/// Apply every cleaning rule to a raw record set.
///
/// # Errors
///
/// Fails if a required column is missing or a Polars operation fails.
pub fn clean_records(raw: DataFrame) -> Result<(DataFrame, CleaningReport)> {
    let start = Instant::now();
    require_columns(
        &raw,
        "raw records",
        &[INVOICE, INVOICE_DATE, CUSTOMER_ID, STOCK_CODE, PRICE, QUANTITY],
    )?;

    let mut report = CleaningReport {
        rows_before: raw.height(),
        ..CleaningReport::default()
    };

    let df = trim_strings(raw)?;

    let (df, dropped) = drop_rows(parse_invoice_dates(df)?, col(INVOICE_DATE).is_not_null())?;
    report.unparseable_dates = dropped;
    log_dropped(dropped, "with unparsable InvoiceDate");

    let (df, dropped) = drop_rows(df, present(INVOICE))?;
    report.missing_invoice = dropped;
    log_dropped(dropped, "with missing Invoice");

    report.repeated_invoices = duplicate_count(&df, INVOICE)?;
    if report.repeated_invoices > 0 {
        tracing::info!(
            "Found {} rows repeating an earlier Invoice",
            report.repeated_invoices
        );
    }

    let before = df.height();
    let df = df
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    report.duplicate_rows = before - df.height();
    log_dropped(report.duplicate_rows, "that were pure duplicates");

    // Quantity is parsed as a float so "12.0" survives; only whole numbers are kept.
    let df = df
        .lazy()
        .with_columns([
            col(PRICE).cast(DataType::Float64),
            col(QUANTITY).cast(DataType::Float64),
        ])
        .collect()?;
    let (df, dropped) = drop_rows(
        df,
        col(PRICE).gt(lit(0.0)).and(col(QUANTITY).gt(lit(0.0))),
    )?;
    report.invalid_amounts = dropped;
    log_dropped(dropped, "with zero/negative or non-numeric Price/Quantity");

    let (df, dropped) = drop_rows(df, (col(QUANTITY) % lit(1.0)).eq(lit(0.0)))?;
    report.fractional_quantities = dropped;
    log_dropped(dropped, "with a fractional Quantity");
    let df = df
        .lazy()
        .with_column(col(QUANTITY).cast(DataType::Int64))
        .collect()?;

    let (df, dropped) = drop_rows(df, present(CUSTOMER_ID).and(present(STOCK_CODE)))?;
    report.missing_natural_keys = dropped;
    log_dropped(dropped, "with missing Customer ID or StockCode");

    report.rows_after = df.height();
    report.duration = start.elapsed();
    tracing::info!("{}", report.summary());
    Ok((df, report))
}

/// Parse one `InvoiceDate` value against the accepted formats.
pub fn parse_invoice_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn trim_strings(df: DataFrame) -> Result<DataFrame> {
    let exprs: Vec<Expr> = df
        .schema()
        .iter()
        .map(|(name, dtype)| {
            if dtype == &DataType::String {
                col(name.as_str()).str().strip_chars(lit(NULL)).alias(name.as_str())
            } else {
                col(name.as_str())
            }
        })
        .collect();
    Ok(df.lazy().select(exprs).collect()?)
}

fn parse_invoice_dates(mut df: DataFrame) -> Result<DataFrame> {
    let target = DataType::Datetime(TimeUnit::Milliseconds, None);
    let column = df.column(INVOICE_DATE)?.as_materialized_series().clone();

    let parsed = if column.dtype() == &DataType::String {
        let millis: Vec<Option<i64>> = column
            .str()?
            .into_iter()
            .map(|value| {
                value
                    .and_then(parse_invoice_date)
                    .map(|dt| dt.and_utc().timestamp_millis())
            })
            .collect();
        Series::new(INVOICE_DATE.into(), millis).cast(&target)?
    } else {
        column.cast(&target)?
    };

    df.replace(INVOICE_DATE, parsed)?;
    Ok(df)
}

/// Not null and not empty.
fn present(column: &str) -> Expr {
    col(column)
        .is_not_null()
        .and(col(column).cast(DataType::String).neq(lit("")))
}

fn drop_rows(df: DataFrame, keep: Expr) -> Result<(DataFrame, usize)> {
    let before = df.height();
    let kept = df.lazy().filter(keep).collect()?;
    let dropped = before - kept.height();
    Ok((kept, dropped))
}

fn log_dropped(count: usize, reason: &str) {
    if count > 0 {
        tracing::warn!("Dropping {count} rows {reason}");
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw(rows: &[[&str; 8]]) -> PolarsResult<DataFrame> {
        let names = [
            "Invoice",
            "StockCode",
            "Description",
            "Quantity",
            "InvoiceDate",
            "Price",
            "Customer ID",
            "Country",
        ];
        let columns = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<Option<&str>> = rows
                    .iter()
                    .map(|row| row.get(i).copied().filter(|v| *v != "<null>"))
                    .collect();
                Column::new((*name).into(), values)
            })
            .collect();
        DataFrame::new(columns)
    }

    const GOOD: [&str; 8] = [
        "489434", "85048", "LIGHTS", "12", "2009-12-01 07:45:00", "6.95", "13085", "United Kingdom",
    ];

    #[test]
    fn test_parse_invoice_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2010, 12, 1)
            .unwrap()
            .and_hms_opt(8, 26, 0)
            .unwrap();
        assert_eq!(parse_invoice_date("2010-12-01 08:26:00"), Some(expected));
        assert_eq!(parse_invoice_date("2010-12-01T08:26"), Some(expected));
        assert_eq!(parse_invoice_date("12/1/2010 8:26"), Some(expected));
        assert_eq!(
            parse_invoice_date("2010-12-01"),
            NaiveDate::from_ymd_opt(2010, 12, 1).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_invoice_date("yesterday"), None);
        assert_eq!(parse_invoice_date(""), None);
    }

    #[test]
    fn test_clean_keeps_valid_rows_typed() -> anyhow::Result<()> {
        let (df, report) = clean_records(raw(&[GOOD])?)?;

        assert_eq!(report.rows_after, 1);
        assert_eq!(report.rows_dropped(), 0);
        assert_eq!(
            df.column("InvoiceDate")?.dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, None)
        );
        assert_eq!(df.column("Price")?.dtype(), &DataType::Float64);
        assert_eq!(df.column("Quantity")?.dtype(), &DataType::Int64);
        Ok(())
    }

    #[test]
    fn test_each_rule_counts_its_drops() -> anyhow::Result<()> {
        let mut bad_date = GOOD;
        bad_date[4] = "not a date";
        let mut no_invoice = GOOD;
        no_invoice[0] = "";
        let mut negative = GOOD;
        negative[3] = "-3";
        let mut free = GOOD;
        free[5] = "0";
        let mut text_price = GOOD;
        text_price[5] = "abc";
        let mut no_customer = GOOD;
        no_customer[6] = "<null>";
        let mut second_line = GOOD;
        second_line[1] = "79323P";

        let (df, report) = clean_records(raw(&[
            GOOD,
            GOOD,
            bad_date,
            no_invoice,
            negative,
            free,
            text_price,
            no_customer,
            second_line,
        ])?)?;

        assert_eq!(report.rows_before, 9);
        assert_eq!(report.unparseable_dates, 1);
        assert_eq!(report.missing_invoice, 1);
        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(report.invalid_amounts, 3);
        assert_eq!(report.missing_natural_keys, 1);
        assert_eq!(report.rows_after, 2);
        assert_eq!(df.height(), 2);
        Ok(())
    }

    #[test]
    fn test_decimal_quantity_strings() -> anyhow::Result<()> {
        let mut whole = GOOD;
        whole[3] = "12.0";
        let mut fractional = GOOD;
        fractional[1] = "79323P";
        fractional[3] = "1.5";

        let (df, report) = clean_records(raw(&[whole, fractional])?)?;

        assert_eq!(report.invalid_amounts, 0);
        assert_eq!(report.fractional_quantities, 1);
        assert_eq!(report.rows_after, 1);
        assert_eq!(
            df.column("Quantity")?.as_materialized_series().i64()?.get(0),
            Some(12)
        );
        Ok(())
    }

    #[test]
    fn test_whitespace_is_trimmed_before_dedup() -> anyhow::Result<()> {
        let mut padded = GOOD;
        padded[1] = "  85048 ";
        padded[6] = " 13085";
        let (df, report) = clean_records(raw(&[GOOD, padded])?)?;

        assert_eq!(report.duplicate_rows, 1);
        assert_eq!(
            df.column("StockCode")?.as_materialized_series().str()?.get(0),
            Some("85048")
        );
        Ok(())
    }

    #[test]
    fn test_whitespace_only_customer_is_missing() -> anyhow::Result<()> {
        let mut blank = GOOD;
        blank[6] = "   ";
        let (_, report) = clean_records(raw(&[blank])?)?;
        assert_eq!(report.missing_natural_keys, 1);
        assert_eq!(report.rows_after, 0);
        Ok(())
    }

    #[test]
    fn test_missing_column_is_input_error() -> anyhow::Result<()> {
        let df = raw(&[GOOD])?.drop("Invoice")?;
        let err = clean_records(df).expect_err("Invoice column removed");
        assert!(matches!(err, WarehouseError::MissingColumn { .. }));
        Ok(())
    }

    #[test]
    fn test_transform_reads_and_writes_partitions() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut config = PipelineConfig::default();
        config.paths.raw_dest_base = temp.path().join("raw");
        config.paths.trans_dest_base = temp.path().join("silver");
        let run_date = NaiveDate::from_ymd_opt(2025, 7, 28).unwrap();

        let mut input = raw(&[GOOD, GOOD])?;
        write_parquet(&mut input, &config.paths.raw_file(run_date))?;

        let output = transform(&config, run_date)?;
        assert_eq!(
            output.destination,
            temp.path().join("silver/2025/07/28/invoices_clean.parquet")
        );
        assert_eq!(read_parquet(&output.destination)?.height(), 1);
        Ok(())
    }

    #[test]
    fn test_transform_rejects_empty_raw_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let mut config = PipelineConfig::default();
        config.paths.raw_dest_base = temp.path().join("raw");
        config.paths.trans_dest_base = temp.path().join("silver");
        let run_date = NaiveDate::from_ymd_opt(2025, 7, 28).unwrap();

        let mut empty = raw(&[])?;
        write_parquet(&mut empty, &config.paths.raw_file(run_date))?;

        let err = transform(&config, run_date).expect_err("raw file is empty");
        assert!(matches!(err, WarehouseError::EmptyInput(_)));
        Ok(())
    }
}
