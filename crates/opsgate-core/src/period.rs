// crates/opsgate-core/src/period.rs
// ============================================================================
// Module: Week-Aligned Periods
// Description: Week-window arithmetic for KPI calculation periods.
// Purpose: Turn a period start date into a half-open seven-day window.
// Dependencies: time
// ============================================================================

//! ## Overview
//! KPI periods are seven-day windows `[start, start + 7d)`. Dates travel as
//! ISO-8601 strings (`YYYY-MM-DD`), which order lexicographically, so window
//! containment is a plain string comparison once both bounds are rendered.
//! Timestamp values are truncated to their date prefix before comparison.

use thiserror::Error;
use time::Date;
use time::Duration;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// ISO-8601 calendar date format.
const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Length of an ISO-8601 calendar date string.
const DATE_PREFIX_LEN: usize = 10;

// ============================================================================
// SECTION: Types
// ============================================================================

/// A half-open seven-day window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    /// Inclusive start date, rendered ISO-8601.
    pub start: String,
    /// Exclusive end date, rendered ISO-8601.
    pub end: String,
}

impl Period {
    /// Builds the week window beginning at `period_start`.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError`] when the date cannot be parsed or the window
    /// end cannot be represented.
    pub fn week(period_start: &str) -> Result<Self, PeriodError> {
        let start = Date::parse(period_start, DATE_FORMAT)
            .map_err(|_| PeriodError::InvalidDate(period_start.to_string()))?;
        let end = start
            .checked_add(Duration::days(7))
            .ok_or_else(|| PeriodError::InvalidDate(period_start.to_string()))?;
        let start = start
            .format(DATE_FORMAT)
            .map_err(|_| PeriodError::InvalidDate(period_start.to_string()))?;
        let end = end
            .format(DATE_FORMAT)
            .map_err(|_| PeriodError::InvalidDate(period_start.to_string()))?;
        Ok(Self { start, end })
    }

    /// Returns true when an ISO date or timestamp string falls in the window.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        let date = date_prefix(value);
        date.len() == DATE_PREFIX_LEN
            && date >= self.start.as_str()
            && date < self.end.as_str()
    }
}

/// Returns the `YYYY-MM` month key for a period start date.
///
/// # Errors
///
/// Returns [`PeriodError`] when the date cannot be parsed.
pub fn month_key(period_start: &str) -> Result<String, PeriodError> {
    let date = Date::parse(period_start, DATE_FORMAT)
        .map_err(|_| PeriodError::InvalidDate(period_start.to_string()))?;
    Ok(format!("{:04}-{:02}", date.year(), u8::from(date.month())))
}

/// Truncates a timestamp to its calendar-date prefix.
fn date_prefix(value: &str) -> &str {
    value.get(..DATE_PREFIX_LEN).unwrap_or(value)
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Period construction errors.
#[derive(Debug, Error)]
pub enum PeriodError {
    /// The supplied date is not a valid `YYYY-MM-DD` value.
    #[error("invalid period date: {0}")]
    InvalidDate(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
