use std::fmt::Write;

use serde::Serialize;

use crate::dashboard::{DashboardSnapshot, Panel};
use crate::models::{DashboardSummary, RankingChart, TrendChart};

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum PanelView<'a, T> {
    Chart(&'a T),
    Error(&'a str),
}

impl<'a, T> From<&'a Panel<T>> for PanelView<'a, T> {
    fn from(panel: &'a Panel<T>) -> Self {
        match panel {
            Panel::Loaded(value) => PanelView::Chart(value),
            Panel::Failed(reason) => PanelView::Error(reason),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum TableView<'a> {
    Rows(usize),
    Error(&'a str),
}

impl<'a, T> From<&'a Panel<Vec<T>>> for TableView<'a> {
    fn from(panel: &'a Panel<Vec<T>>) -> Self {
        match panel {
            Panel::Loaded(rows) => TableView::Rows(rows.len()),
            Panel::Failed(reason) => TableView::Error(reason),
        }
    }
}

#[derive(Serialize)]
struct TableStates<'a> {
    monitors: TableView<'a>,
    alarms: TableView<'a>,
    heartbeats: TableView<'a>,
    logs: TableView<'a>,
}

#[derive(Serialize)]
struct ChartBundle<'a> {
    begin_datetime: String,
    end_datetime: String,
    summary: DashboardSummary,
    tables: TableStates<'a>,
    alarm_trend: PanelView<'a, TrendChart>,
    top_alarms: PanelView<'a, RankingChart>,
    heartbeat_trend: PanelView<'a, TrendChart>,
    log_trend: PanelView<'a, TrendChart>,
}

/// Every dashboard chart in one JSON document; failed panels and tables carry `{"error": ...}`.
pub fn chart_bundle_json(snapshot: &DashboardSnapshot) -> serde_json::Result<String> {
    let bundle = ChartBundle {
        begin_datetime: snapshot.window.begin_param(),
        end_datetime: snapshot.window.end_param(),
        summary: snapshot.summary(),
        tables: TableStates {
            monitors: (&snapshot.monitors).into(),
            alarms: (&snapshot.alarms).into(),
            heartbeats: (&snapshot.heartbeats).into(),
            logs: (&snapshot.logs).into(),
        },
        alarm_trend: (&snapshot.alarm_trend).into(),
        top_alarms: (&snapshot.top_alarms).into(),
        heartbeat_trend: (&snapshot.heartbeat_trend).into(),
        log_trend: (&snapshot.log_trend).into(),
    };
    serde_json::to_string_pretty(&bundle)
}

fn write_trend_table(output: &mut String, chart: &TrendChart) {
    if chart.series.is_empty() {
        let _ = writeln!(output, "No data for this window.");
        return;
    }

    let names: Vec<&str> = chart.series.iter().map(|s| s.name.as_str()).collect();
    let _ = writeln!(output, "| Date | {} |", names.join(" | "));
    let _ = writeln!(output, "|---|{}", "---|".repeat(names.len()));

    for (slot, date) in chart.categories.iter().enumerate() {
        let counts: Vec<String> = chart
            .series
            .iter()
            .map(|s| s.data[slot].to_string())
            .collect();
        let _ = writeln!(output, "| {} | {} |", date, counts.join(" | "));
    }
}

fn write_count<T>(output: &mut String, label: &str, table: &Panel<T>, count: Option<usize>) {
    match table {
        Panel::Loaded(_) => {
            let _ = writeln!(output, "- {label}: {}", count.unwrap_or_default());
        }
        Panel::Failed(reason) => {
            let _ = writeln!(output, "- {label}: _Unavailable: {reason}_");
        }
    }
}

fn write_panel<T>(output: &mut String, panel: &Panel<T>, render: impl FnOnce(&mut String, &T)) {
    match panel {
        Panel::Loaded(value) => render(output, value),
        Panel::Failed(reason) => {
            let _ = writeln!(output, "_Unavailable: {reason}_");
        }
    }
}

pub fn build_report(snapshot: &DashboardSnapshot) -> String {
    let summary = snapshot.summary();
    let mut output = String::new();

    let _ = writeln!(output, "# Monitor Dashboard Report");
    let _ = writeln!(
        output,
        "Window {} to {}",
        snapshot.window.begin_param(),
        snapshot.window.end_param()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    write_count(&mut output, "Monitors", &snapshot.monitors, summary.monitor_count);
    write_count(&mut output, "Alarms", &snapshot.alarms, summary.alarm_count);
    write_count(&mut output, "Heartbeats", &snapshot.heartbeats, summary.heartbeat_count);
    write_count(&mut output, "Error logs", &snapshot.logs, summary.error_log_count);

    let failed = snapshot.failed_panels();
    if failed > 0 {
        let _ = writeln!(output, "- Panels unavailable: {failed}");
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Alarm Trend by Direction");
    write_panel(&mut output, &snapshot.alarm_trend, write_trend_table);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Alarms by Monitor Item");
    write_panel(&mut output, &snapshot.top_alarms, |output, chart| {
        if chart.series.is_empty() {
            let _ = writeln!(output, "No alarms recorded for this window.");
        }
        for series in &chart.series {
            let count = series.data.first().copied().unwrap_or(0);
            let _ = writeln!(output, "- {}: {} alarms", series.name, count);
        }
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Heartbeat Trend by Direction");
    write_panel(&mut output, &snapshot.heartbeat_trend, write_trend_table);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Log Trend by Direction and Level");
    write_panel(&mut output, &snapshot.log_trend, write_trend_table);

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Alarms");
    write_panel(&mut output, &snapshot.alarms, |output, alarms| {
        let mut recent = alarms.clone();
        recent.sort_by(|a, b| b.time.cmp(&a.time));

        if recent.is_empty() {
            let _ = writeln!(output, "No alarms recorded for this window.");
        }
        for alarm in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} {}/{}: {}",
                alarm.time, alarm.direction, alarm.monitor_item, alarm.message
            );
        }
    });

    output
}
