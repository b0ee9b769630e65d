use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use monitor_trends::config::{DashboardConfig, DEFAULT_WINDOW_DAYS, PANEL_COUNT};
use monitor_trends::dashboard::Dashboard;
use monitor_trends::db::{self, ImportKind, PgRowSource};
use monitor_trends::models::TimeWindow;
use monitor_trends::progress::LoadProgress;
use monitor_trends::source::{fetch_within, HttpRowSource, RowSource, TableQuery};
use monitor_trends::{report, trend};

#[derive(Parser)]
#[command(name = "monitor-trends")]
#[command(about = "Trend charts and dashboard reports for the monitor viewer", long_about = None)]
struct Cli {
    /// Where rows are read from
    #[arg(long, value_enum, default_value_t = SourceKind::Http, global = true)]
    source: SourceKind,
    #[arg(long, env = "MONITOR_VIEWER_URL", default_value = "http://127.0.0.1:5000", global = true)]
    base_url: String,
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,
    /// Per-fetch timeout, e.g. `10s` or `1m`
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration, global = true)]
    fetch_timeout: Duration,
    /// Window start, `YYYY-MM-DD HH:MM:SS` (default: seven days ago)
    #[arg(long, global = true)]
    begin: Option<String>,
    /// Window end, `YYYY-MM-DD HH:MM:SS` (default: now)
    #[arg(long, global = true)]
    end: Option<String>,
    /// Keyword filter passed to the table endpoints
    #[arg(long, default_value = "", global = true)]
    search: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Http,
    Postgres,
}

#[derive(Clone, Copy, ValueEnum)]
enum ChartKind {
    Heartbeat,
    Log,
    Alarm,
    TopAlarms,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import rows from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: ImportKind,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print one chart as JSON
    Trend {
        #[arg(value_enum)]
        chart: ChartKind,
    },
    /// Load every panel and write a markdown report
    Dashboard {
        #[arg(long, default_value = "dashboard.md")]
        out: PathBuf,
        /// Also write every chart as one JSON document
        #[arg(long)]
        charts: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("monitor_trends=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = DashboardConfig::default().with_fetch_timeout(cli.fetch_timeout);

    match &cli.command {
        Commands::InitDb => {
            let pool = connect(&cli).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&cli).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { kind, csv } => {
            let pool = connect(&cli).await?;
            let inserted = db::import_csv(&pool, *kind, csv).await?;
            println!("Inserted {inserted} rows from {}.", csv.display());
        }
        Commands::Trend { chart } => {
            let source = row_source(&cli, &config).await?;
            let window = resolve_window(&cli)?;

            let limit = config.fetch_timeout;

            let json = match chart {
                ChartKind::Heartbeat => {
                    let rows =
                        fetch_within(limit, "heartbeat table", source.heartbeats(&window)).await?;
                    serde_json::to_string_pretty(&trend::heartbeat_trend(&rows)?)?
                }
                ChartKind::Log => {
                    let rows = fetch_within(limit, "log table", source.logs(&window)).await?;
                    serde_json::to_string_pretty(&trend::log_trend(&rows)?)?
                }
                ChartKind::Alarm => {
                    let rows = fetch_within(limit, "alarm table", source.alarms(&window)).await?;
                    serde_json::to_string_pretty(&trend::alarm_trend(&rows, &window)?)?
                }
                ChartKind::TopAlarms => {
                    let rows = fetch_within(limit, "alarm table", source.alarms(&window)).await?;
                    serde_json::to_string_pretty(&trend::top_alarms(&rows, config.top_alarm_limit))?
                }
            };
            println!("{json}");
        }
        Commands::Dashboard { out, charts } => {
            let source = row_source(&cli, &config).await?;
            let window = resolve_window(&cli)?;
            let progress = Arc::new(LoadProgress::new(PANEL_COUNT));
            let dashboard = Dashboard::new(source, config.clone(), Arc::clone(&progress));

            let (snapshot, ready) = tokio::join!(
                dashboard.load(window),
                progress.wait_until_ready(config.poll_interval, config.ready_deadline),
            );
            if !ready {
                warn!(
                    loaded = progress.loaded(),
                    total = progress.total(),
                    "dashboard was not ready before the deadline"
                );
            }

            std::fs::write(out, report::build_report(&snapshot))
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = charts {
                std::fs::write(path, report::chart_bundle_json(&snapshot)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Charts written to {}.", path.display());
            }

            let failed = snapshot.failed_panels();
            if failed > 0 {
                println!("{failed} of {PANEL_COUNT} panels could not be loaded.");
            }
        }
    }

    Ok(())
}

async fn connect(cli: &Cli) -> anyhow::Result<PgPool> {
    let database_url = cli
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to a Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn row_source(cli: &Cli, config: &DashboardConfig) -> anyhow::Result<Arc<dyn RowSource>> {
    match cli.source {
        SourceKind::Http => {
            info!(base_url = %cli.base_url, "reading rows over HTTP");
            let query = TableQuery {
                length: config.page_length,
                search: cli.search.clone(),
                ..TableQuery::default()
            };
            let source = HttpRowSource::new(&cli.base_url, config.fetch_timeout)?.with_query(query);
            Ok(Arc::new(source))
        }
        SourceKind::Postgres => {
            info!("reading rows from Postgres");
            Ok(Arc::new(PgRowSource::new(connect(cli).await?)))
        }
    }
}

fn resolve_window(cli: &Cli) -> anyhow::Result<TimeWindow> {
    let now = Local::now().naive_local();
    let fallback = TimeWindow::last_days(DEFAULT_WINDOW_DAYS, now);

    let begin = cli.begin.clone().unwrap_or_else(|| fallback.begin_param());
    let end = cli.end.clone().unwrap_or_else(|| fallback.end_param());

    TimeWindow::parse(&begin, &end)
        .with_context(|| format!("invalid window {begin:?} to {end:?}"))
}
