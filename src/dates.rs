use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Result, TrendError};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Every calendar day from `start` to `end`, both included.
pub fn expand(start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
    if start > end {
        return Err(TrendError::InvalidRange { start, end });
    }

    Ok(start.iter_days().take_while(|day| *day <= end).collect())
}

/// Same as [`expand`], for date-bearing strings such as `2024-01-01 10:00:00`.
pub fn expand_str(start: &str, end: &str) -> Result<Vec<NaiveDate>> {
    expand(parse_date_key(start)?, parse_date_key(end)?)
}

/// Reads the calendar date from the first ten characters; time of day is ignored.
pub fn parse_date_key(value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed
        .get(..10)
        .ok_or_else(|| TrendError::InvalidDate(value.to_string()))?;
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|_| TrendError::InvalidDate(value.to_string()))
}

/// Parses the row timestamp formats the monitor viewer emits.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    for format in [DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }

    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| TrendError::InvalidDate(value.to_string()))
}
