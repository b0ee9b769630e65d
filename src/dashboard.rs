use std::future::Future;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{Result, TrendError};
use crate::models::{
    AlarmRow, DashboardSummary, HeartbeatRow, LogRow, MonitorRow, RankingChart, TimeWindow,
    TrendChart,
};
use crate::progress::LoadProgress;
use crate::source::{self, RowSource};
use crate::trend;

/// One independently loaded table or chart.
#[derive(Debug, Clone, PartialEq)]
pub enum Panel<T> {
    Loaded(T),
    Failed(String),
}

impl<T> Panel<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Panel::Loaded(value) => Some(value),
            Panel::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Panel::Failed(_))
    }
}

impl<T> Panel<Vec<T>> {
    pub fn rows(&self) -> Option<&[T]> {
        self.loaded().map(Vec::as_slice)
    }
}

#[derive(Debug, Clone)]
pub struct DashboardSnapshot {
    pub window: TimeWindow,
    pub monitors: Panel<Vec<MonitorRow>>,
    pub alarms: Panel<Vec<AlarmRow>>,
    pub heartbeats: Panel<Vec<HeartbeatRow>>,
    pub logs: Panel<Vec<LogRow>>,
    pub alarm_trend: Panel<TrendChart>,
    pub top_alarms: Panel<RankingChart>,
    pub heartbeat_trend: Panel<TrendChart>,
    pub log_trend: Panel<TrendChart>,
}

impl DashboardSnapshot {
    /// Counts over whatever loaded; a failed table has no count.
    pub fn summary(&self) -> DashboardSummary {
        trend::summarize(
            self.monitors.rows(),
            self.alarms.rows(),
            self.heartbeats.rows(),
            self.logs.rows(),
        )
    }

    pub fn failed_panels(&self) -> usize {
        [
            self.monitors.is_failed(),
            self.alarms.is_failed(),
            self.heartbeats.is_failed(),
            self.logs.is_failed(),
            self.alarm_trend.is_failed(),
            self.top_alarms.is_failed(),
            self.heartbeat_trend.is_failed(),
            self.log_trend.is_failed(),
        ]
        .iter()
        .filter(|failed| **failed)
        .count()
    }
}

/// Loads every panel of the dashboard concurrently from one row source.
pub struct Dashboard {
    source: Arc<dyn RowSource>,
    config: DashboardConfig,
    progress: Arc<LoadProgress>,
}

impl Dashboard {
    pub fn new(
        source: Arc<dyn RowSource>,
        config: DashboardConfig,
        progress: Arc<LoadProgress>,
    ) -> Self {
        Self {
            source,
            config,
            progress,
        }
    }

    pub fn progress(&self) -> Arc<LoadProgress> {
        Arc::clone(&self.progress)
    }

    pub async fn load(&self, window: TimeWindow) -> DashboardSnapshot {
        self.progress.reset();
        info!(
            begin = %window.begin_param(),
            end = %window.end_param(),
            "loading dashboard"
        );

        let (
            monitors,
            (alarms, alarm_trend, top_alarms),
            (heartbeats, heartbeat_trend),
            (logs, log_trend),
        ) = tokio::join!(
            self.load_monitors(),
            self.load_alarms(&window),
            self.load_heartbeats(&window),
            self.load_logs(&window),
        );

        let snapshot = DashboardSnapshot {
            window,
            monitors,
            alarms,
            heartbeats,
            logs,
            alarm_trend,
            top_alarms,
            heartbeat_trend,
            log_trend,
        };
        info!(
            failed = snapshot.failed_panels(),
            progress = self.progress.percent(),
            "dashboard loaded"
        );
        snapshot
    }

    async fn load_monitors(&self) -> Panel<Vec<MonitorRow>> {
        let result = self.fetch("monitor table", self.source.monitors()).await;
        self.settle("monitor table", result)
    }

    async fn load_alarms(
        &self,
        window: &TimeWindow,
    ) -> (Panel<Vec<AlarmRow>>, Panel<TrendChart>, Panel<RankingChart>) {
        let result = self.fetch("alarm table", self.source.alarms(window)).await;
        let table = self.settle("alarm table", result);

        let chart = self.derive("alarm trend", &table, |rows| trend::alarm_trend(rows, window));
        let ranking = self.derive("top alarms", &table, |rows| {
            Ok(trend::top_alarms(rows, self.config.top_alarm_limit))
        });
        (table, chart, ranking)
    }

    async fn load_heartbeats(
        &self,
        window: &TimeWindow,
    ) -> (Panel<Vec<HeartbeatRow>>, Panel<TrendChart>) {
        let result = self.fetch("heartbeat table", self.source.heartbeats(window)).await;
        let table = self.settle("heartbeat table", result);
        let chart = self.derive("heartbeat trend", &table, |rows| trend::heartbeat_trend(rows));
        (table, chart)
    }

    async fn load_logs(&self, window: &TimeWindow) -> (Panel<Vec<LogRow>>, Panel<TrendChart>) {
        let result = self.fetch("log table", self.source.logs(window)).await;
        let table = self.settle("log table", result);
        let chart = self.derive("log trend", &table, |rows| trend::log_trend(rows));
        (table, chart)
    }

    async fn fetch<T, F>(&self, panel: &str, request: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        source::fetch_within(self.config.fetch_timeout, panel, request).await
    }

    fn derive<R, C, F>(&self, panel: &str, table: &Panel<Vec<R>>, build: F) -> Panel<C>
    where
        F: FnOnce(&[R]) -> Result<C>,
    {
        let result = match table {
            Panel::Loaded(rows) => build(rows.as_slice()),
            Panel::Failed(reason) => Err(TrendError::fetch(
                panel,
                format!("source table unavailable: {reason}"),
            )),
        };
        self.settle(panel, result)
    }

    fn settle<T>(&self, panel: &str, result: Result<T>) -> Panel<T> {
        let settled = match result {
            Ok(value) => Panel::Loaded(value),
            Err(err) => {
                warn!(panel, error = %err, "panel failed to load");
                Panel::Failed(err.to_string())
            }
        };
        let loaded = self.progress.mark_loaded();
        info!(panel, loaded, total = self.progress.total(), "panel settled");
        settled
    }
}
