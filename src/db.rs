use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{Duration, Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{flatten_message, AlarmRow, HeartbeatRow, LogRow, MonitorRow, TimeWindow};
use crate::source::RowSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportKind {
    Alarm,
    Heartbeat,
    Log,
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Reads the dashboard datasets from the `monitor_trends` schema.
pub struct PgRowSource {
    pool: PgPool,
}

impl PgRowSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowSource for PgRowSource {
    async fn monitors(&self) -> Result<Vec<MonitorRow>> {
        let rows = sqlx::query(
            "SELECT direction, item, admin, startup, host, exec_frequency, alarm_frequency, script \
             FROM monitor_trends.monitors ORDER BY direction, item",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut monitors = Vec::with_capacity(rows.len());
        for row in rows {
            monitors.push(MonitorRow {
                direction: row.try_get("direction")?,
                item: row.try_get("item")?,
                admin: row.try_get("admin")?,
                startup: row.try_get("startup")?,
                host: row.try_get("host")?,
                exec_frequency: row.try_get("exec_frequency")?,
                alarm_frequency: row.try_get("alarm_frequency")?,
                script: row.try_get("script")?,
            });
        }
        Ok(monitors)
    }

    async fn alarms(&self, window: &TimeWindow) -> Result<Vec<AlarmRow>> {
        let rows = fetch_windowed(
            &self.pool,
            "SELECT direction, monitor_item, occurred_at, receivers, send_alarm_result, message \
             FROM monitor_trends.alarms \
             WHERE occurred_at BETWEEN $1 AND $2 ORDER BY occurred_at",
            window,
        )
        .await?;

        let mut alarms = Vec::with_capacity(rows.len());
        for row in rows {
            let message: String = row.try_get("message")?;
            alarms.push(AlarmRow {
                direction: row.try_get("direction")?,
                monitor_item: row.try_get("monitor_item")?,
                time: row.try_get("occurred_at")?,
                receivers: row.try_get("receivers")?,
                send_alarm_result: row.try_get("send_alarm_result")?,
                message: flatten_message(&message),
            });
        }
        Ok(alarms)
    }

    async fn heartbeats(&self, window: &TimeWindow) -> Result<Vec<HeartbeatRow>> {
        let rows = fetch_windowed(
            &self.pool,
            "SELECT direction, monitor_item, occurred_at, user_name, host, script \
             FROM monitor_trends.heartbeats \
             WHERE occurred_at BETWEEN $1 AND $2 ORDER BY occurred_at",
            window,
        )
        .await?;

        let mut heartbeats = Vec::with_capacity(rows.len());
        for row in rows {
            heartbeats.push(HeartbeatRow {
                direction: row.try_get("direction")?,
                monitor_item: row.try_get("monitor_item")?,
                time: row.try_get("occurred_at")?,
                user: row.try_get("user_name")?,
                host: row.try_get("host")?,
                script: row.try_get("script")?,
            });
        }
        Ok(heartbeats)
    }

    async fn logs(&self, window: &TimeWindow) -> Result<Vec<LogRow>> {
        let rows = fetch_windowed(
            &self.pool,
            "SELECT direction, monitor_item, occurred_at, message_level, message \
             FROM monitor_trends.logs \
             WHERE occurred_at BETWEEN $1 AND $2 ORDER BY occurred_at",
            window,
        )
        .await?;

        let mut logs = Vec::with_capacity(rows.len());
        for row in rows {
            let message: String = row.try_get("message")?;
            logs.push(LogRow {
                direction: row.try_get("direction")?,
                monitor_item: row.try_get("monitor_item")?,
                time: row.try_get("occurred_at")?,
                message_level: row.try_get("message_level")?,
                message: flatten_message(&message),
            });
        }
        Ok(logs)
    }
}

async fn fetch_windowed(
    pool: &PgPool,
    query: &str,
    window: &TimeWindow,
) -> std::result::Result<Vec<PgRow>, sqlx::Error> {
    sqlx::query(query)
        .bind(window.begin)
        .bind(window.end)
        .fetch_all(pool)
        .await
}

async fn upsert_monitor(pool: &PgPool, monitor: &MonitorRow) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO monitor_trends.monitors
        (id, direction, item, admin, startup, host, exec_frequency, alarm_frequency, script)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (direction, item) DO UPDATE
        SET admin = EXCLUDED.admin, startup = EXCLUDED.startup, host = EXCLUDED.host,
            exec_frequency = EXCLUDED.exec_frequency, alarm_frequency = EXCLUDED.alarm_frequency,
            script = EXCLUDED.script
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&monitor.direction)
    .bind(&monitor.item)
    .bind(&monitor.admin)
    .bind(&monitor.startup)
    .bind(&monitor.host)
    .bind(&monitor.exec_frequency)
    .bind(&monitor.alarm_frequency)
    .bind(&monitor.script)
    .execute(pool)
    .await?;
    Ok(())
}

async fn insert_alarm(pool: &PgPool, alarm: &AlarmRow, source_key: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO monitor_trends.alarms
        (id, direction, monitor_item, occurred_at, receivers, send_alarm_result, message, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&alarm.direction)
    .bind(&alarm.monitor_item)
    .bind(alarm.time)
    .bind(&alarm.receivers)
    .bind(&alarm.send_alarm_result)
    .bind(&alarm.message)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_heartbeat(
    pool: &PgPool,
    heartbeat: &HeartbeatRow,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO monitor_trends.heartbeats
        (id, direction, monitor_item, occurred_at, user_name, host, script, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&heartbeat.direction)
    .bind(&heartbeat.monitor_item)
    .bind(heartbeat.time)
    .bind(&heartbeat.user)
    .bind(&heartbeat.host)
    .bind(&heartbeat.script)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn insert_log(pool: &PgPool, log: &LogRow, source_key: &str) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO monitor_trends.logs
        (id, direction, monitor_item, occurred_at, message_level, message, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&log.direction)
    .bind(&log.monitor_item)
    .bind(log.time)
    .bind(&log.message_level)
    .bind(&log.message)
    .bind(source_key)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Inserts a small monitor fleet with a few days of recent activity.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let now = Local::now().naive_local();
    let hours_ago = |hours: i64| -> NaiveDateTime { now - Duration::hours(hours) };

    let monitors = [
        ("billing", "nightly_export", "Avery Lee", "crontab", "etl-01", "0 2 * * *", "1h"),
        ("search", "index_lag", "Jules Moreno", "systemd", "idx-01", "*/5 * * * *", "15m"),
        ("payments", "settlement_check", "Kiara Patel", "crontab", "pay-02", "0 * * * *", "30m"),
    ];
    for (direction, item, admin, startup, host, exec_frequency, alarm_frequency) in monitors {
        upsert_monitor(
            pool,
            &MonitorRow {
                direction: direction.to_string(),
                item: item.to_string(),
                admin: Some(admin.to_string()),
                startup: Some(startup.to_string()),
                host: Some(host.to_string()),
                exec_frequency: Some(exec_frequency.to_string()),
                alarm_frequency: Some(alarm_frequency.to_string()),
                script: Some(format!("/opt/monitors/{direction}/{item}.py")),
            },
        )
        .await?;
    }

    let heartbeats = [
        ("seed-hb-001", "billing", "nightly_export", 70, "etl-01"),
        ("seed-hb-002", "billing", "nightly_export", 46, "etl-01"),
        ("seed-hb-003", "billing", "nightly_export", 22, "etl-01"),
        ("seed-hb-004", "search", "index_lag", 50, "idx-01"),
        ("seed-hb-005", "search", "index_lag", 3, "idx-01"),
        ("seed-hb-006", "payments", "settlement_check", 26, "pay-02"),
    ];
    for (key, direction, item, hours, host) in heartbeats {
        insert_heartbeat(
            pool,
            &HeartbeatRow {
                direction: direction.to_string(),
                monitor_item: item.to_string(),
                time: hours_ago(hours),
                user: Some("monitor".to_string()),
                host: Some(host.to_string()),
                script: Some(format!("/opt/monitors/{direction}/{item}.py")),
            },
            key,
        )
        .await?;
    }

    let logs = [
        ("seed-log-001", "billing", "nightly_export", 70, "Info", "export finished in 412s"),
        ("seed-log-002", "billing", "nightly_export", 46, "Error", "upload to warehouse failed\nretry scheduled"),
        ("seed-log-003", "search", "index_lag", 50, "Warning", "lag above 120s"),
        ("seed-log-004", "search", "index_lag", 3, "Info", "lag back to 4s"),
        ("seed-log-005", "payments", "settlement_check", 26, "Error", "3 settlements unmatched"),
    ];
    for (key, direction, item, hours, level, message) in logs {
        insert_log(
            pool,
            &LogRow {
                direction: direction.to_string(),
                monitor_item: item.to_string(),
                time: hours_ago(hours),
                message_level: level.to_string(),
                message: message.to_string(),
            },
            key,
        )
        .await?;
    }

    let alarms = [
        ("seed-alarm-001", "billing", "nightly_export", 46, "upload to warehouse failed"),
        ("seed-alarm-002", "search", "index_lag", 50, "lag above 120s"),
        ("seed-alarm-003", "payments", "settlement_check", 26, "3 settlements unmatched"),
    ];
    for (key, direction, item, hours, message) in alarms {
        insert_alarm(
            pool,
            &AlarmRow {
                direction: direction.to_string(),
                monitor_item: item.to_string(),
                time: hours_ago(hours),
                receivers: Some("oncall@example.com".to_string()),
                send_alarm_result: Some("sent".to_string()),
                message: message.to_string(),
            },
            key,
        )
        .await?;
    }

    info!("seed rows written");
    Ok(())
}

/// Parses a CSV of rows, pairing each with its optional `source_key` column.
pub fn read_csv<T: DeserializeOwned>(csv_path: &Path) -> anyhow::Result<Vec<(Option<String>, T)>> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let headers = reader.headers()?.clone();
    let key_column = headers.iter().position(|header| header == "source_key");

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let row: T = record
            .deserialize(Some(&headers))
            .with_context(|| format!("bad row {} in {}", line + 1, csv_path.display()))?;
        let source_key = key_column
            .and_then(|column| record.get(column))
            .filter(|key| !key.is_empty())
            .map(str::to_string);
        rows.push((source_key, row));
    }

    Ok(rows)
}

fn import_key(source_key: Option<String>) -> String {
    source_key.unwrap_or_else(|| format!("import-{}", Uuid::new_v4()))
}

pub async fn import_csv(pool: &PgPool, kind: ImportKind, csv_path: &Path) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    match kind {
        ImportKind::Alarm => {
            for (key, row) in read_csv::<AlarmRow>(csv_path)? {
                if insert_alarm(pool, &row, &import_key(key)).await? {
                    inserted += 1;
                }
            }
        }
        ImportKind::Heartbeat => {
            for (key, row) in read_csv::<HeartbeatRow>(csv_path)? {
                if insert_heartbeat(pool, &row, &import_key(key)).await? {
                    inserted += 1;
                }
            }
        }
        ImportKind::Log => {
            for (key, row) in read_csv::<LogRow>(csv_path)? {
                if insert_log(pool, &row, &import_key(key)).await? {
                    inserted += 1;
                }
            }
        }
    }

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_log_rows_with_and_without_keys() {
        let file = write_csv(
            "direction,monitor_item,time,message_level,message,source_key\n\
             billing,nightly_export,2024-01-02 03:00:00,Error,upload failed,ext-17\n\
             billing,nightly_export,2024-01-02 04:00:00,Info,done,\n",
        );

        let rows = read_csv::<LogRow>(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.as_deref(), Some("ext-17"));
        assert_eq!(rows[0].1.message_level, "Error");
        assert_eq!(rows[1].0, None);
    }

    #[test]
    fn empty_optional_cells_become_none() {
        let file = write_csv(
            "direction,monitor_item,time,user,host,script\n\
             search,index_lag,2024-01-02 03:00:00,,idx-01,\n",
        );

        let rows = read_csv::<HeartbeatRow>(file.path()).unwrap();
        assert_eq!(rows[0].1.user, None);
        assert_eq!(rows[0].1.host.as_deref(), Some("idx-01"));
    }

    #[test]
    fn bad_timestamp_names_the_row() {
        let file = write_csv(
            "direction,monitor_item,time,receivers,send_alarm_result,message\n\
             search,index_lag,2024-01-02 03:00:00,ops,sent,lag\n\
             search,index_lag,soon,ops,sent,lag\n",
        );

        let err = read_csv::<AlarmRow>(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("bad row 2"));
    }

    #[test]
    fn missing_key_gets_generated_one() {
        assert_eq!(import_key(Some("ext-1".to_string())), "ext-1");
        assert!(import_key(None).starts_with("import-"));
    }
}
