use std::collections::HashMap;

use chrono::NaiveDate;

use crate::dates;
use crate::error::{Result, TrendError};
use crate::models::{
    AlarmRow, DashboardSummary, HeartbeatRow, LogRow, MonitorRow, RankingChart, Record, Series,
    SeriesKey, TimeWindow, TrendChart,
};

/// Buckets `records` per calendar day between the earliest and latest record,
/// with one series per distinct `(key_fn, stack_fn)` pair in first-seen order.
pub fn aggregate<K, S>(records: &[Record], key_fn: K, stack_fn: S) -> Result<TrendChart>
where
    K: Fn(&Record) -> SeriesKey,
    S: Fn(&Record) -> Option<String>,
{
    let sorted = sorted_by_time(records);
    let (first, last) = match (sorted.first(), sorted.last()) {
        (Some(first), Some(last)) => (first.date(), last.date()),
        _ => return Ok(TrendChart::default()),
    };

    let categories = dates::expand(first, last)?;
    bucket(categories, &sorted, key_fn, stack_fn)
}

/// Like [`aggregate`], but over a caller-supplied day range, which is sorted
/// and deduplicated first. Records dated outside the range are an error, not dropped.
pub fn aggregate_over<K, S>(
    mut categories: Vec<NaiveDate>,
    records: &[Record],
    key_fn: K,
    stack_fn: S,
) -> Result<TrendChart>
where
    K: Fn(&Record) -> SeriesKey,
    S: Fn(&Record) -> Option<String>,
{
    categories.sort_unstable();
    categories.dedup();

    let sorted = sorted_by_time(records);
    bucket(categories, &sorted, key_fn, stack_fn)
}

fn sorted_by_time(records: &[Record]) -> Vec<&Record> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by_key(|record| record.timestamp);
    sorted
}

fn bucket<K, S>(
    categories: Vec<NaiveDate>,
    sorted: &[&Record],
    key_fn: K,
    stack_fn: S,
) -> Result<TrendChart>
where
    K: Fn(&Record) -> SeriesKey,
    S: Fn(&Record) -> Option<String>,
{
    let mut index: HashMap<(SeriesKey, Option<String>), usize> = HashMap::new();
    let mut series: Vec<Series> = Vec::new();

    // All series exist before any count lands, so legend order only depends
    // on record order.
    for &record in sorted {
        let key = (key_fn(record), stack_fn(record));
        if !index.contains_key(&key) {
            series.push(Series {
                name: key.0.name(),
                data: vec![0; categories.len()],
                stack: key.1.clone(),
            });
            index.insert(key, series.len() - 1);
        }
    }

    for &record in sorted {
        let key = (key_fn(record), stack_fn(record));
        let date = record.date();
        let slot = categories
            .binary_search(&date)
            .map_err(|_| TrendError::BucketNotFound { date })?;
        if let Some(&position) = index.get(&key) {
            series[position].data[slot] += 1;
        }
    }

    Ok(TrendChart { categories, series })
}

/// Heartbeats per direction per day.
pub fn heartbeat_trend(rows: &[HeartbeatRow]) -> Result<TrendChart> {
    let records: Vec<Record> = rows.iter().map(Record::from).collect();
    aggregate(&records, SeriesKey::category, |_| None)
}

/// Logs per direction and level per day, stacked by direction.
pub fn log_trend(rows: &[LogRow]) -> Result<TrendChart> {
    let records: Vec<Record> = rows.iter().map(Record::from).collect();
    aggregate(&records, SeriesKey::composite, |record| {
        Some(record.category.clone())
    })
}

/// Alarms per direction for every day of the selected window.
pub fn alarm_trend(rows: &[AlarmRow], window: &TimeWindow) -> Result<TrendChart> {
    let records: Vec<Record> = rows.iter().map(Record::from).collect();
    aggregate_over(window.days()?, &records, SeriesKey::category, |_| None)
}

/// Monitor items ranked by alarm count, highest first, ties in first-seen order.
pub fn top_alarms(rows: &[AlarmRow], limit: usize) -> RankingChart {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, u64> = HashMap::new();

    for row in rows {
        let entry = counts.entry(row.monitor_item.as_str()).or_insert_with(|| {
            order.push(row.monitor_item.as_str());
            0
        });
        *entry += 1;
    }

    let mut ranked: Vec<(&str, u64)> = order
        .into_iter()
        .map(|item| (item, counts.get(item).copied().unwrap_or(0)))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);

    RankingChart {
        categories: ranked.iter().map(|(item, _)| item.to_string()).collect(),
        series: ranked
            .iter()
            .map(|(item, count)| Series {
                name: item.to_string(),
                data: vec![*count],
                stack: None,
            })
            .collect(),
    }
}

pub fn error_log_count(logs: &[LogRow]) -> usize {
    logs.iter().filter(|log| log.message_level == "Error").count()
}

/// Counts over the tables that loaded; a missing table leaves its count unset.
pub fn summarize(
    monitors: Option<&[MonitorRow]>,
    alarms: Option<&[AlarmRow]>,
    heartbeats: Option<&[HeartbeatRow]>,
    logs: Option<&[LogRow]>,
) -> DashboardSummary {
    DashboardSummary {
        monitor_count: monitors.map(<[MonitorRow]>::len),
        alarm_count: alarms.map(<[AlarmRow]>::len),
        heartbeat_count: heartbeats.map(<[HeartbeatRow]>::len),
        error_log_count: logs.map(error_log_count),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn at(value: &str) -> NaiveDateTime {
        dates::parse_timestamp(value).unwrap()
    }

    fn day(value: &str) -> NaiveDate {
        dates::parse_date_key(value).unwrap()
    }

    fn record(time: &str, category: &str) -> Record {
        Record::new(at(time), category)
    }

    fn single(records: &[Record]) -> TrendChart {
        aggregate(records, SeriesKey::category, |_| None).unwrap()
    }

    fn alarm(time: &str, direction: &str, item: &str) -> AlarmRow {
        AlarmRow {
            direction: direction.to_string(),
            monitor_item: item.to_string(),
            time: at(time),
            receivers: None,
            send_alarm_result: None,
            message: "threshold exceeded".to_string(),
        }
    }

    fn log(time: &str, direction: &str, level: &str) -> LogRow {
        LogRow {
            direction: direction.to_string(),
            monitor_item: "nightly_export".to_string(),
            time: at(time),
            message_level: level.to_string(),
            message: "done".to_string(),
        }
    }

    #[test]
    fn empty_input_gives_empty_chart() {
        let chart = single(&[]);
        assert!(chart.categories.is_empty());
        assert!(chart.series.is_empty());
    }

    #[test]
    fn single_record() {
        let chart = single(&[record("2024-01-01T10:00:00", "A")]);
        assert_eq!(chart.categories, vec![day("2024-01-01")]);
        assert_eq!(
            chart.series,
            vec![Series {
                name: "A".to_string(),
                data: vec![1],
                stack: None,
            }]
        );
    }

    #[test]
    fn same_day_different_categories() {
        let chart = single(&[
            record("2024-01-01 09:00:00", "A"),
            record("2024-01-01 11:00:00", "B"),
        ]);
        assert_eq!(chart.categories, vec![day("2024-01-01")]);
        let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(chart.series.iter().all(|s| s.data == vec![1]));
    }

    #[test]
    fn gap_days_are_zero_filled() {
        let chart = single(&[
            record("2024-01-03 08:00:00", "B"),
            record("2024-01-01 08:00:00", "A"),
        ]);
        assert_eq!(
            chart.categories,
            vec![day("2024-01-01"), day("2024-01-02"), day("2024-01-03")]
        );
        assert_eq!(chart.series[0].name, "A");
        assert_eq!(chart.series[0].data, vec![1, 0, 0]);
        assert_eq!(chart.series[1].data, vec![0, 0, 1]);
    }

    #[test]
    fn composite_keys_stack_by_category() {
        let chart = log_trend(&[
            log("2024-01-01 10:00:00", "A", "info"),
            log("2024-01-01 10:05:00", "A", "error"),
        ])
        .unwrap();

        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].name, "A-info");
        assert_eq!(chart.series[1].name, "A-error");
        assert!(chart
            .series
            .iter()
            .all(|s| s.stack.as_deref() == Some("A") && s.data == vec![1]));
    }

    #[test]
    fn counts_sum_to_record_count_and_span_matches() {
        let directions = ["billing", "search", "payments"];
        let records: Vec<Record> = (0..60)
            .map(|i| {
                let timestamp = at("2024-02-20 00:00:00")
                    + chrono::Duration::hours((i * 7) as i64);
                Record::new(timestamp, directions[i % directions.len()])
            })
            .collect();

        let chart = single(&records);
        let first = records.iter().map(Record::date).min().unwrap();
        let last = records.iter().map(Record::date).max().unwrap();

        assert_eq!(chart.total(), records.len() as u64);
        assert_eq!(
            chart.categories.len() as i64,
            (last - first).num_days() + 1
        );
        assert!(chart
            .series
            .iter()
            .all(|s| s.data.len() == chart.categories.len()));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let records = vec![
            record("2024-01-02 08:00:00", "B"),
            record("2024-01-01 08:00:00", "A"),
            record("2024-01-02 09:00:00", "A"),
        ];
        let mut presorted = records.clone();
        presorted.sort_by_key(|r| r.timestamp);

        assert_eq!(single(&records), single(&records));
        assert_eq!(single(&records), single(&presorted));
    }

    #[test]
    fn heartbeat_trend_uses_direction_only() {
        let rows = vec![
            HeartbeatRow {
                direction: "search".to_string(),
                monitor_item: "index_lag".to_string(),
                time: at("2024-01-01 00:00:00"),
                user: None,
                host: None,
                script: None,
            },
            HeartbeatRow {
                direction: "search".to_string(),
                monitor_item: "query_latency".to_string(),
                time: at("2024-01-02 00:00:00"),
                user: None,
                host: None,
                script: None,
            },
        ];
        let chart = heartbeat_trend(&rows).unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].data, vec![1, 1]);
        assert_eq!(chart.series[0].stack, None);
    }

    #[test]
    fn alarm_trend_covers_whole_window() {
        let window = TimeWindow::parse("2024-01-01 00:00:00", "2024-01-04 23:59:59").unwrap();
        let chart = alarm_trend(&[alarm("2024-01-02 10:00:00", "billing", "x")], &window).unwrap();
        assert_eq!(chart.categories.len(), 4);
        assert_eq!(chart.series[0].data, vec![0, 1, 0, 0]);
    }

    #[test]
    fn record_outside_supplied_range_is_reported() {
        let range = vec![day("2024-01-01"), day("2024-01-02")];
        let err = aggregate_over(
            range,
            &[record("2024-01-05 00:00:00", "A")],
            SeriesKey::category,
            |_| None,
        )
        .unwrap_err();
        assert!(matches!(err, TrendError::BucketNotFound { date } if date == day("2024-01-05")));
    }

    #[test]
    fn unordered_range_is_normalized() {
        let range = vec![day("2024-01-03"), day("2024-01-01"), day("2024-01-02"), day("2024-01-01")];
        let chart = aggregate_over(
            range,
            &[
                record("2024-01-01 08:00:00", "A"),
                record("2024-01-03 08:00:00", "A"),
            ],
            SeriesKey::category,
            |_| None,
        )
        .unwrap();

        assert_eq!(
            chart.categories,
            vec![day("2024-01-01"), day("2024-01-02"), day("2024-01-03")]
        );
        assert_eq!(chart.series[0].data, vec![1, 0, 1]);
    }

    #[test]
    fn top_alarms_rank_and_truncate() {
        let rows = vec![
            alarm("2024-01-01 00:00:00", "billing", "disk"),
            alarm("2024-01-01 00:00:00", "billing", "cpu"),
            alarm("2024-01-01 00:00:00", "billing", "cpu"),
            alarm("2024-01-01 00:00:00", "search", "mem"),
            alarm("2024-01-01 00:00:00", "search", "cpu"),
        ];
        let chart = top_alarms(&rows, 2);
        assert_eq!(chart.categories, vec!["cpu".to_string(), "disk".to_string()]);
        assert_eq!(chart.series[0].data, vec![3]);
        assert_eq!(chart.series[1].name, "disk");
        assert_eq!(chart.series[1].data, vec![1]);
    }

    #[test]
    fn summary_counts_error_logs_only() {
        let logs = vec![
            log("2024-01-01 00:00:00", "A", "Error"),
            log("2024-01-01 00:00:00", "A", "Info"),
            log("2024-01-01 00:00:00", "B", "Error"),
        ];
        let summary = summarize(Some(&[][..]), Some(&[][..]), Some(&[][..]), Some(logs.as_slice()));
        assert_eq!(summary.error_log_count, Some(2));
        assert_eq!(summary.alarm_count, Some(0));
    }

    #[test]
    fn missing_tables_leave_counts_unset() {
        let summary = summarize(None, Some(&[][..]), None, None);
        assert_eq!(summary.monitor_count, None);
        assert_eq!(summary.alarm_count, Some(0));
        assert_eq!(summary.error_log_count, None);
    }
}
