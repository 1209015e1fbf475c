//! Sample date enumeration.
//!
//! Turns a `(start, end, cadence)` triple into the ordered list of as-of
//! dates at which the repository is inspected. Everything here is pure.

use chrono::{Datelike, Days, Months, NaiveDate};
use clap::ValueEnum;

use crate::error::{MetricsError, Result};

/// Sampling interval between two as-of dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

/// Enumerate sample dates between `start` and `end`, both inclusive.
///
/// - `Monthly`: first day of every month from `start`'s month to `end`'s month
/// - `Weekly`: every Monday from the Monday on or before `start` while `<= end`
/// - `Daily`: every day from `start` to `end`
///
/// An inverted range (`start > end`) yields no dates for any cadence.
pub fn enumerate(start: NaiveDate, end: NaiveDate, cadence: Cadence) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }

    match cadence {
        Cadence::Daily => step_days(start, end, 1),
        Cadence::Weekly => {
            let offset = u64::from(start.weekday().num_days_from_monday());
            match start.checked_sub_days(Days::new(offset)) {
                Some(monday) => step_days(monday, end, 7),
                None => Vec::new(),
            }
        }
        Cadence::Monthly => month_starts(start, end),
    }
}

fn step_days(first: NaiveDate, end: NaiveDate, step: u64) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = Some(first);

    while let Some(date) = current.filter(|d| *d <= end) {
        dates.push(date);
        current = date.checked_add_days(Days::new(step));
    }

    dates
}

fn month_starts(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = NaiveDate::from_ymd_opt(start.year(), start.month(), 1);

    // Comparing first-of-month against `end` is the (year, month) <= comparison
    while let Some(date) = current.filter(|d| *d <= end) {
        dates.push(date);
        current = date.checked_add_months(Months::new(1));
    }

    dates
}

/// Parse an explicit `YYYY-MM-DD` sample date
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| MetricsError::Validation(format!("Invalid date format: {} ({})", s, e)))
}
