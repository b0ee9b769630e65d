use std::time::Duration;

/// Tables plus the alarm, top-alarm, heartbeat and log charts.
pub const PANEL_COUNT: usize = 8;

/// Default selected window, in days back from now.
pub const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Upper bound on each dataset fetch
    pub fetch_timeout: Duration,
    /// How often the readiness check looks at the progress counter
    pub poll_interval: Duration,
    /// How long the readiness check waits before giving up
    pub ready_deadline: Duration,
    /// Page size sent with table queries
    pub page_length: u32,
    pub top_alarm_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
            ready_deadline: Duration::from_secs(30),
            page_length: 10,
            top_alarm_limit: 10,
        }
    }
}

impl DashboardConfig {
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        // Readiness must outlast the slowest fetch.
        self.ready_deadline = self.ready_deadline.max(timeout.saturating_mul(2));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_fetch_timeout_stretches_ready_deadline() {
        let config = DashboardConfig::default().with_fetch_timeout(Duration::from_secs(60));
        assert_eq!(config.fetch_timeout, Duration::from_secs(60));
        assert_eq!(config.ready_deadline, Duration::from_secs(120));

        let short = DashboardConfig::default().with_fetch_timeout(Duration::from_secs(1));
        assert_eq!(short.ready_deadline, Duration::from_secs(30));
    }

    #[test]
    fn huge_fetch_timeout_saturates() {
        let timeout = humantime::parse_duration("18446744073709551615s").unwrap();
        let config = DashboardConfig::default().with_fetch_timeout(timeout);
        assert_eq!(config.fetch_timeout, timeout);
        assert_eq!(config.ready_deadline, Duration::MAX);
    }
}
