//! Calendar helpers shared by the resend fan-out and artifact naming.
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use thiserror::Error;

/// Returned when a resend range puts the start after the end. Raised before
/// any network request is issued.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid date range: start {start} is after end {end}")]
pub struct InvalidDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Expand the inclusive range [start, end] into ordered calendar days.
pub fn expand_range(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>, InvalidDateRange> {
    if start > end {
        return Err(InvalidDateRange { start, end });
    }
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        days.push(day);
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    Ok(days)
}

/// Timestamp fragment used in artifact file names. Second precision keeps
/// concurrent runs apart while batches of one run still sort by number.
pub fn file_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

/// Render an elapsed wall-clock duration the way run summaries report it.
pub fn duration_label(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
