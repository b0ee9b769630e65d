use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::dates;
use crate::error::{Result, TrendError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorRow {
    pub direction: String,
    pub item: String,
    #[serde(default)]
    pub admin: Option<String>,
    #[serde(default)]
    pub startup: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub exec_frequency: Option<String>,
    #[serde(default)]
    pub alarm_frequency: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRow {
    pub direction: String,
    pub monitor_item: String,
    #[serde(with = "timestamp")]
    pub time: NaiveDateTime,
    #[serde(default)]
    pub receivers: Option<String>,
    #[serde(default)]
    pub send_alarm_result: Option<String>,
    #[serde(deserialize_with = "flattened")]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRow {
    pub direction: String,
    pub monitor_item: String,
    #[serde(with = "timestamp")]
    pub time: NaiveDateTime,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    pub direction: String,
    pub monitor_item: String,
    #[serde(with = "timestamp")]
    pub time: NaiveDateTime,
    pub message_level: String,
    #[serde(deserialize_with = "flattened")]
    pub message: String,
}

/// One timestamped, categorized event, as seen by the trend aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub timestamp: NaiveDateTime,
    pub category: String,
    pub subcategory: Option<String>,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, category: impl Into<String>) -> Self {
        Self {
            timestamp,
            category: category.into(),
            subcategory: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory: impl Into<String>) -> Self {
        self.subcategory = Some(subcategory.into());
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

impl From<&HeartbeatRow> for Record {
    fn from(row: &HeartbeatRow) -> Self {
        Record::new(row.time, row.direction.clone())
    }
}

impl From<&LogRow> for Record {
    fn from(row: &LogRow) -> Self {
        Record::new(row.time, row.direction.clone()).with_subcategory(row.message_level.clone())
    }
}

impl From<&AlarmRow> for Record {
    fn from(row: &AlarmRow) -> Self {
        Record::new(row.time, row.direction.clone())
    }
}

/// Identity of a chart series: a category, optionally refined by a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub category: String,
    pub subcategory: Option<String>,
}

impl SeriesKey {
    pub fn category(record: &Record) -> Self {
        Self {
            category: record.category.clone(),
            subcategory: None,
        }
    }

    pub fn composite(record: &Record) -> Self {
        Self {
            category: record.category.clone(),
            subcategory: record.subcategory.clone(),
        }
    }

    pub fn name(&self) -> String {
        match &self.subcategory {
            Some(sub) => format!("{}-{}", self.category, sub),
            None => self.category.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub data: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Day-bucketed chart payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TrendChart {
    pub categories: Vec<NaiveDate>,
    pub series: Vec<Series>,
}

impl TrendChart {
    pub fn total(&self) -> u64 {
        self.series.iter().flat_map(|s| s.data.iter()).sum()
    }
}

/// Bar chart payload keyed by label instead of date.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RankingChart {
    pub categories: Vec<String>,
    pub series: Vec<Series>,
}

/// Headline counts; `None` where the underlying table failed to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DashboardSummary {
    pub monitor_count: Option<usize>,
    pub alarm_count: Option<usize>,
    pub heartbeat_count: Option<usize>,
    pub error_log_count: Option<usize>,
}

/// The begin/end datetimes every windowed query is filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub begin: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if begin > end {
            return Err(TrendError::InvalidRange {
                start: begin.date(),
                end: end.date(),
            });
        }
        Ok(Self { begin, end })
    }

    pub fn last_days(days: i64, now: NaiveDateTime) -> Self {
        Self {
            begin: now - Duration::days(days.max(0)),
            end: now,
        }
    }

    pub fn parse(begin: &str, end: &str) -> Result<Self> {
        Self::new(dates::parse_timestamp(begin)?, dates::parse_timestamp(end)?)
    }

    pub fn contains(&self, at: NaiveDateTime) -> bool {
        self.begin <= at && at <= self.end
    }

    pub fn days(&self) -> Result<Vec<NaiveDate>> {
        dates::expand(self.begin.date(), self.end.date())
    }

    pub fn begin_param(&self) -> String {
        self.begin.format(dates::DATETIME_FORMAT).to_string()
    }

    pub fn end_param(&self) -> String {
        self.end.format(dates::DATETIME_FORMAT).to_string()
    }
}

pub(crate) fn flatten_message(message: &str) -> String {
    message.replace('\n', "; ")
}

fn flattened<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(flatten_message(&raw))
}

mod timestamp {
    use super::*;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(dates::DATETIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        dates::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
