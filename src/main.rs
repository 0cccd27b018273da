use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod ad_cycle;
mod compare;
mod db;
mod eligibility;
mod error;
mod ingest;
mod models;
mod rollup;
mod summary;

use ad_cycle::{AdCycleTable, AdType, TierCatalog};
use eligibility::AdEligibilityTracker;
use ingest::TimeUnit;
use models::{AdStatus, DataShapeWarning, RevenueSummary, Thresholds, PERIODS};

#[derive(Parser)]
#[command(name = "counselor-analytics")]
#[command(about = "Period analytics and ad eligibility for counselor snapshots", long_about = None)]
struct Cli {
    /// trace, debug, info, warn or error; RUST_LOG wins when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SnapshotArgs {
    /// This period's snapshot CSV
    #[arg(long)]
    current: PathBuf,
    /// The previous period's snapshot CSV
    #[arg(long)]
    previous: Option<PathBuf>,
    /// Unit of plain numeric cur_time cells
    #[arg(long, value_enum, default_value_t = TimeUnit::Minutes)]
    time_unit: TimeUnit,
}

#[derive(Args)]
struct ThresholdArgs {
    #[arg(long, default_value_t = Thresholds::default().missed)]
    missed: i64,
    #[arg(long, default_value_t = Thresholds::default().unanswered)]
    unanswered: i64,
    #[arg(long, default_value_t = Thresholds::default().min_time_hours)]
    min_time_hours: i64,
    #[arg(long, default_value_t = Thresholds::default().rev_drop_percent)]
    rev_drop_percent: i64,
}

impl From<&ThresholdArgs> for Thresholds {
    fn from(args: &ThresholdArgs) -> Self {
        Thresholds {
            missed: args.missed,
            unanswered: args.unanswered,
            min_time_hours: args.min_time_hours,
            rev_drop_percent: args.rev_drop_percent,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Compare two periods and summarize revenue
    Analyze {
        #[command(flatten)]
        snapshots: SnapshotArgs,
        #[command(flatten)]
        thresholds: ThresholdArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Revenue totals and new/blind counselor lists only
    Summary {
        #[command(flatten)]
        snapshots: SnapshotArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Six-month revenue rollup; omit a month flag when no data exists
    Rollup {
        #[arg(long)]
        m1: Option<PathBuf>,
        #[arg(long)]
        m2: Option<PathBuf>,
        #[arg(long)]
        m3: Option<PathBuf>,
        #[arg(long)]
        m4: Option<PathBuf>,
        #[arg(long)]
        m5: Option<PathBuf>,
        #[arg(long)]
        m6: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TimeUnit::Minutes)]
        time_unit: TimeUnit,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Ad cooldown status for every eligible counselor and ad type
    AdStatus {
        #[command(flatten)]
        snapshots: SnapshotArgs,
        /// Reference date, defaults to today
        #[arg(long)]
        today: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Record an ad application (overwrites an earlier date)
    AdApply {
        #[arg(long)]
        nick: String,
        #[arg(long)]
        level_cat: String,
        #[arg(long)]
        ad_type: String,
        /// Application date, defaults to today
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Remove a recorded ad application
    AdRevoke {
        #[arg(long)]
        nick: String,
        #[arg(long)]
        ad_type: String,
    },
    /// Show or replace a counselor's memo
    Memo {
        #[arg(long)]
        nick: String,
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Serialize)]
struct AnalysisReport {
    rejected_rows: Vec<DataShapeWarning>,
    comparison: compare::Comparison,
    summary: RevenueSummary,
}

#[derive(Serialize)]
struct SummaryReport {
    rejected_rows: Vec<DataShapeWarning>,
    summary: RevenueSummary,
}

#[derive(Debug, Serialize)]
struct MonthRejection {
    /// 1-based month slot.
    month: usize,
    #[serde(flatten)]
    row: DataShapeWarning,
}

#[derive(Serialize)]
struct RollupReport {
    rejected_rows: Vec<MonthRejection>,
    entries: Vec<models::SixPeriodEntry>,
}

/// Splits loaded monthly snapshots into rollup input and the rows ingestion
/// dropped, tagged with their month.
fn split_months(
    months: [Option<ingest::Snapshot>; PERIODS],
) -> (
    [Option<Vec<models::RawCounselorRecord>>; PERIODS],
    Vec<MonthRejection>,
) {
    let mut rejected = Vec::new();
    let mut records: [Option<Vec<models::RawCounselorRecord>>; PERIODS] = Default::default();

    for (slot, month) in months.into_iter().enumerate() {
        if let Some(snapshot) = month {
            rejected.extend(snapshot.rejected.into_iter().map(|row| MonthRejection {
                month: slot + 1,
                row,
            }));
            records[slot] = Some(snapshot.records);
        }
    }

    (records, rejected)
}

#[derive(Serialize)]
struct AdStatusRow {
    nick: String,
    level_cat: String,
    ad_type: String,
    #[serde(flatten)]
    status: AdStatus,
}

struct LoadedSnapshots {
    current: ingest::Snapshot,
    previous: ingest::Snapshot,
}

impl LoadedSnapshots {
    fn rejected(&self) -> Vec<DataShapeWarning> {
        self.current
            .rejected
            .iter()
            .chain(self.previous.rejected.iter())
            .cloned()
            .collect()
    }
}

fn load_pair(args: &SnapshotArgs) -> anyhow::Result<LoadedSnapshots> {
    let current = ingest::load_snapshot(&args.current, args.time_unit)?;
    let previous = match &args.previous {
        Some(path) => ingest::load_snapshot(path, args.time_unit)?,
        None => {
            info!("no previous snapshot, every counselor is treated as new");
            ingest::Snapshot::default()
        }
    };
    Ok(LoadedSnapshots { current, previous })
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Output written to {}.", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("counselor_period_analytics={}", log_level.to_lowercase()))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let table = AdCycleTable::standard();
    let catalog = TierCatalog::new(table);

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Analyze {
            snapshots,
            thresholds,
            out,
        } => {
            let loaded = load_pair(&snapshots)?;
            let comparison = compare::compare_periods(
                &loaded.current.records,
                &loaded.previous.records,
                &Thresholds::from(&thresholds),
                &catalog,
            )?;
            let summary = summary::summarize_revenue(
                &loaded.current.records,
                &loaded.previous.records,
                summary::default_label,
            );

            let flagged = comparison
                .records
                .iter()
                .filter(|record| !record.issues.is_empty())
                .count();
            info!(
                counselors = comparison.records.len(),
                flagged,
                growth = summary.growth,
                "analysis complete"
            );

            let report = AnalysisReport {
                rejected_rows: loaded.rejected(),
                comparison,
                summary,
            };
            emit(&report, out.as_deref())?;
        }
        Commands::Summary { snapshots, out } => {
            let loaded = load_pair(&snapshots)?;
            if loaded.current.records.is_empty() {
                return Err(error::EngineError::NoCurrentSnapshot.into());
            }
            let summary = summary::summarize_revenue(
                &loaded.current.records,
                &loaded.previous.records,
                summary::default_label,
            );
            let report = SummaryReport {
                rejected_rows: loaded.rejected(),
                summary,
            };
            emit(&report, out.as_deref())?;
        }
        Commands::Rollup {
            m1,
            m2,
            m3,
            m4,
            m5,
            m6,
            time_unit,
            out,
        } => {
            let paths: [Option<PathBuf>; PERIODS] = [m1, m2, m3, m4, m5, m6];
            let mut months: [Option<ingest::Snapshot>; PERIODS] = Default::default();
            for (slot, path) in paths.iter().enumerate() {
                if let Some(path) = path {
                    months[slot] = Some(ingest::load_snapshot(path, time_unit)?);
                }
            }
            let (records, rejected_rows) = split_months(months);
            let entries = rollup::roll_up(&records)?;
            emit(
                &RollupReport {
                    rejected_rows,
                    entries,
                },
                out.as_deref(),
            )?;
        }
        Commands::AdStatus {
            snapshots,
            today: reference,
            out,
        } => {
            let loaded = load_pair(&snapshots)?;
            let comparison = compare::compare_periods(
                &loaded.current.records,
                &loaded.previous.records,
                &Thresholds::default(),
                &catalog,
            )?;
            let pool = connect().await?;
            let history = db::fetch_history(&pool).await?;
            if history.is_empty() {
                info!("no ad applications recorded yet");
            } else {
                info!(entries = history.len(), "loaded ad application history");
            }
            let tracker = AdEligibilityTracker::new(table);
            let now = reference.unwrap_or_else(today);

            let mut rows = Vec::new();
            for record in &comparison.records {
                let counselor = &record.current;
                for ad_type in &record.ad_eligible_types {
                    match tracker.status(&history, &counselor.nick, &counselor.level_cat, ad_type, now)
                    {
                        Ok(status) => rows.push(AdStatusRow {
                            nick: counselor.nick.clone(),
                            level_cat: counselor.level_cat.clone(),
                            ad_type: ad_type.clone(),
                            status,
                        }),
                        Err(err) => warn!(nick = %counselor.nick, %ad_type, "{err}"),
                    }
                }
            }
            emit(&rows, out.as_deref())?;
        }
        Commands::AdApply {
            nick,
            level_cat,
            ad_type,
            on,
        } => {
            let pool = connect().await?;
            let mut history = db::fetch_history(&pool).await?;
            let mut tracker = AdEligibilityTracker::new(table);
            let applied_on = on.unwrap_or_else(today);

            let before = tracker.status(&history, &nick, &level_cat, &ad_type, applied_on)?;
            if before.cool {
                warn!(
                    %nick,
                    %ad_type,
                    weeks_remaining = before.weeks_remaining,
                    "applying inside the cooldown window"
                );
            }

            tracker.apply(&mut history, &nick, &level_cat, &ad_type, applied_on)?;
            info!(queued = tracker.pending().len(), "application queued");
            for request in tracker.take_pending() {
                db::save_application(&pool, &request.nick, &request.level_cat, &request.ad_type, applied_on)
                    .await?;
                println!(
                    "Recorded {} {} for {} on {}.",
                    request.level_cat, request.ad_type, request.nick, applied_on
                );
            }
        }
        Commands::AdRevoke { nick, ad_type } => {
            let pool = connect().await?;
            let mut history = db::fetch_history(&pool).await?;
            let tracker = AdEligibilityTracker::new(table);
            let ad_type = ad_type.parse::<AdType>()?.to_string();
            if tracker.revoke(&mut history, &nick, &ad_type)? {
                db::delete_application(&pool, &nick, &ad_type).await?;
                println!("Removed {ad_type} application for {nick}.");
            } else {
                println!("No {ad_type} application recorded for {nick}.");
            }
        }
        Commands::Memo { nick, set } => {
            let pool = connect().await?;
            match set {
                Some(memo) => {
                    db::save_memo(&pool, &nick, &memo).await?;
                    println!("Memo saved for {nick}.");
                }
                None => match db::fetch_memo(&pool, &nick).await? {
                    Some(memo) => println!("{memo}"),
                    None => println!("No memo for {nick}."),
                },
            }
        }
    }

    Ok(())
}
