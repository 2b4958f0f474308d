//! Calendar dimension.
//!
//! `Dim_Date` does not depend on the records being loaded: it holds every day
//! of a fixed [`CalendarRange`] plus one sentinel row for dates that cannot be
//! matched. The sentinel precedes the range, so after sorting it always gets
//! `DateKey` 1 and every key is reproducible across runs.

use super::columns::{DATE_KEY, DAY, DIM_DATE, INVOICE_DATE, MONTH, QUARTER, WEEKDAY, YEAR};
use super::dimension::with_surrogate_key;
use super::integrity::{ensure_unique, require_columns};
use crate::error::{Result, WarehouseError};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

/// `NaiveDate::num_days_from_ce` of 1970-01-01, the Polars `Date` epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Natural key of the "unknown date" row.
pub const SENTINEL_DATE: NaiveDate = ymd(1999, 1, 1);

const DEFAULT_START: NaiveDate = ymd(2000, 1, 1);
const DEFAULT_END: NaiveDate = ymd(2025, 1, 1);

pub fn sentinel_date() -> NaiveDate {
    SENTINEL_DATE
}

/// Inclusive range of generated calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl Default for CalendarRange {
    /// 2000-01-01 through 2025-01-01
    fn default() -> Self {
        Self {
            start: DEFAULT_START,
            end: DEFAULT_END,
        }
    }
}

impl CalendarRange {
    /// # Errors
    ///
    /// Fails if `start > end` or the range does not start after the sentinel date.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(WarehouseError::Config(format!(
                "Calendar range start {start} is after end {end}"
            )));
        }
        if start <= sentinel_date() {
            return Err(WarehouseError::Config(format!(
                "Calendar range must start after the sentinel date {}",
                sentinel_date()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(|d| *d <= self.end)
    }

    pub fn len(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build `Dim_Date` for the default range.
///
/// `records` is accepted for symmetry with the other dimension builders; the
/// table's contents never depend on it.
///
/// # Errors
///
/// See [`build_date_dimension`].
pub fn build_date_dim(_records: &DataFrame) -> Result<DataFrame> {
    build_date_dimension(&CalendarRange::default())
}

/// Generate the calendar rows, prepend the sentinel, sort and key them.
///
/// # Errors
///
/// Returns [`WarehouseError::DuplicateKey`] if a date or key repeats, which
/// would mean the generator itself is broken.
pub fn build_date_dimension(range: &CalendarRange) -> Result<DataFrame> {
    let mut dates = Vec::with_capacity(range.len() + 1);
    dates.push(sentinel_date());
    dates.extend(range.days());
    dates.sort_unstable();

    let day_numbers: Vec<i32> = dates.iter().map(|d| epoch_days(*d)).collect();
    let calendar = DataFrame::new(vec![
        Column::new(INVOICE_DATE.into(), day_numbers).cast(&DataType::Date)?,
        Column::new(YEAR.into(), dates.iter().map(Datelike::year).collect::<Vec<i32>>()),
        Column::new(QUARTER.into(), dates.iter().map(quarter).collect::<Vec<i32>>()),
        Column::new(MONTH.into(), dates.iter().map(|d| d.month() as i32).collect::<Vec<_>>()),
        Column::new(DAY.into(), dates.iter().map(|d| d.day() as i32).collect::<Vec<_>>()),
        Column::new(
            WEEKDAY.into(),
            dates
                .iter()
                .map(|d| d.weekday().number_from_monday() as i32)
                .collect::<Vec<_>>(),
        ),
    ])?;

    let dim = with_surrogate_key(&calendar, DATE_KEY)?;
    ensure_unique(&dim, DIM_DATE, DATE_KEY)?;
    ensure_unique(&dim, DIM_DATE, INVOICE_DATE)?;

    tracing::debug!(
        "Built {DIM_DATE} with {} rows ({} .. {})",
        dim.height(),
        range.start(),
        range.end()
    );
    Ok(dim)
}

/// Look up the sentinel row's `DateKey` by its natural key.
///
/// # Errors
///
/// Returns [`WarehouseError::MissingSentinel`] if no row carries the sentinel date.
pub fn sentinel_key(dim: &DataFrame) -> Result<i32> {
    require_columns(dim, DIM_DATE, &[DATE_KEY, INVOICE_DATE])?;

    let dates = dim
        .column(INVOICE_DATE)?
        .as_materialized_series()
        .cast(&DataType::Date)?
        .cast(&DataType::Int32)?;
    let keys = dim
        .column(DATE_KEY)?
        .as_materialized_series()
        .cast(&DataType::Int32)?;

    let target = epoch_days(sentinel_date());
    dates
        .i32()?
        .into_iter()
        .zip(keys.i32()?)
        .find_map(|(date, key)| if date == Some(target) { key } else { None })
        .ok_or_else(|| WarehouseError::MissingSentinel {
            dimension: DIM_DATE.to_owned(),
            date: sentinel_date().to_string(),
        })
}

/// Days since 1970-01-01.
pub fn epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

fn quarter(date: &NaiveDate) -> i32 {
    (date.month0() / 3 + 1) as i32
}

/// Only for `const` items, so a bad literal fails the build.
const fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(date) => date,
        None => panic!("invalid calendar literal"),
    }
}
