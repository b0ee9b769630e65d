use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrendError {
    /// The end of a range precedes its start
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// A date or datetime string could not be parsed
    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    /// A record's date has no bucket in the chart range
    #[error("no bucket for {date} in chart range")]
    BucketNotFound { date: NaiveDate },

    /// The row source was unreachable, timed out, or returned a bad payload
    #[error("fetch from {endpoint} failed: {reason}")]
    Fetch { endpoint: String, reason: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TrendError {
    pub fn fetch(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        TrendError::Fetch {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrendError>;
