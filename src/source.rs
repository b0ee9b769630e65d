use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Result, TrendError};
use crate::models::{AlarmRow, HeartbeatRow, LogRow, MonitorRow, TimeWindow};

pub const MONITOR_ENDPOINT: &str = "/monitor_table_data";
pub const ALARM_ENDPOINT: &str = "/alarm_table_data";
pub const HEARTBEAT_ENDPOINT: &str = "/heartbeat_table_data";
pub const LOG_ENDPOINT: &str = "/log_table_data";

/// Where dashboard rows come from.
#[async_trait]
pub trait RowSource: Send + Sync {
    async fn monitors(&self) -> Result<Vec<MonitorRow>>;
    async fn alarms(&self, window: &TimeWindow) -> Result<Vec<AlarmRow>>;
    async fn heartbeats(&self, window: &TimeWindow) -> Result<Vec<HeartbeatRow>>;
    async fn logs(&self, window: &TimeWindow) -> Result<Vec<LogRow>>;
}

/// Runs one source request under `limit`; running out of time is a fetch error for `panel`.
pub async fn fetch_within<T, F>(limit: Duration, panel: &str, request: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(TrendError::fetch(
            panel,
            format!("timed out after {}", humantime::format_duration(limit)),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Paging, search and ordering parameters sent with every table request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    pub draw: u32,
    pub start: u32,
    pub length: u32,
    pub search: String,
    pub order_column: u32,
    pub order_dir: SortDirection,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            draw: 1,
            start: 0,
            length: 10,
            search: String::new(),
            order_column: 0,
            order_dir: SortDirection::Asc,
        }
    }
}

impl TableQuery {
    pub fn params(&self, window: Option<&TimeWindow>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("draw", self.draw.to_string()),
            ("start", self.start.to_string()),
            ("length", self.length.to_string()),
            ("search[value]", self.search.clone()),
            ("order[0][column]", self.order_column.to_string()),
            ("order[0][dir]", self.order_dir.as_str().to_string()),
        ];
        if let Some(window) = window {
            params.push(("begin_datetime", window.begin_param()));
            params.push(("end_datetime", window.end_param()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TablePage<T> {
    #[serde(default)]
    records_total: Option<u64>,
    #[serde(default)]
    records_filtered: Option<u64>,
    data: Vec<T>,
}

/// Reads rows from the monitor viewer's table endpoints.
pub struct HttpRowSource {
    client: Client,
    base_url: String,
    query: TableQuery,
}

impl HttpRowSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrendError::fetch(base_url, e))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Uses a prebuilt client; its timeout is the caller's responsibility.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            query: TableQuery::default(),
        }
    }

    pub fn with_query(mut self, query: TableQuery) -> Self {
        self.query = query;
        self
    }

    async fn fetch_table<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        window: Option<&TimeWindow>,
    ) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%url, "fetching table");

        let response = self
            .client
            .get(&url)
            .query(&self.query.params(window))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| TrendError::fetch(endpoint, e))?;

        let page: TablePage<T> = response
            .json()
            .await
            .map_err(|e| TrendError::fetch(endpoint, format!("malformed payload: {e}")))?;

        debug!(
            endpoint,
            rows = page.data.len(),
            total = ?page.records_total,
            filtered = ?page.records_filtered,
            "table fetched"
        );
        Ok(page.data)
    }
}

#[async_trait]
impl RowSource for HttpRowSource {
    async fn monitors(&self) -> Result<Vec<MonitorRow>> {
        self.fetch_table(MONITOR_ENDPOINT, None).await
    }

    async fn alarms(&self, window: &TimeWindow) -> Result<Vec<AlarmRow>> {
        self.fetch_table(ALARM_ENDPOINT, Some(window)).await
    }

    async fn heartbeats(&self, window: &TimeWindow) -> Result<Vec<HeartbeatRow>> {
        self.fetch_table(HEARTBEAT_ENDPOINT, Some(window)).await
    }

    async fn logs(&self, window: &TimeWindow) -> Result<Vec<LogRow>> {
        self.fetch_table(LOG_ENDPOINT, Some(window)).await
    }
}
