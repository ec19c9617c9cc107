//! repopulse-record - append one metrics snapshot to the history file
//!
//! Parses the tool outputs captured by a CI run (or takes a ready-made
//! snapshot as JSON), optionally scans a source tree for duplicated lines,
//! appends the snapshot to the history, prunes entries
//! older than the retention window and atomically rewrites the file.
//!
//! Uses XDG Base Directory specification for file locations:
//! - History: $XDG_DATA_HOME/repopulse/history.json (~/.local/share/repopulse/history.json)
//! - Logs: $XDG_STATE_HOME/repopulse/repopulse.log (~/.local/state/repopulse/repopulse.log)
//! - Config: $XDG_CONFIG_HOME/repopulse/config.toml (~/.config/repopulse/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Parser};
use process_lock::acquire_writer_lock;
use repopulse_core::collect::{derive_metrics, summarize, SnapshotCollector};
use repopulse_core::types::{DATE_KEY, TIMESTAMP_KEY};
use repopulse_core::{
    Config, DegradationAlert, DegradationDetector, DuplicationAnalyzer, Error, MetricRegistry,
    MetricSnapshot, MetricsHistory, MetricsHistoryStore, ToolResult,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "repopulse-record")]
#[command(about = "Record a metrics snapshot into the history file")]
#[command(version)]
#[command(group(ArgGroup::new("source").required(true).args(["outputs", "snapshot"])))]
struct Args {
    /// Directory holding captured tool outputs (pylint.txt, bandit.json, ...)
    #[arg(long)]
    outputs: Option<PathBuf>,

    /// Snapshot JSON object to record, or "-" to read it from stdin
    #[arg(long)]
    snapshot: Option<String>,

    /// Source tree to scan for code duplication
    #[arg(long)]
    sources: Option<PathBuf>,

    /// History file (overrides config)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Snapshot date (YYYY-MM-DD), defaults to today (UTC)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Replace any snapshot already recorded for the same date
    #[arg(long)]
    replace_today: bool,

    /// Keep snapshots older than the retention window
    #[arg(long)]
    no_prune: bool,

    /// Retention window in days (overrides config)
    #[arg(long)]
    retention_days: Option<u32>,

    /// Config file (defaults to $XDG_CONFIG_HOME/repopulse/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Build and print the snapshot without touching the history
    #[arg(long)]
    dry_run: bool,

    /// Output format: text (default) or json
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    format: String,
}

/// Machine-readable run summary for `--format json`.
#[derive(Serialize)]
struct RecordSummary<'a> {
    snapshot: &'a MetricSnapshot,
    tools: &'a [ToolResult],
    history: Option<HistorySummary>,
    alerts: &'a [DegradationAlert],
}

#[derive(Serialize)]
struct HistorySummary {
    path: PathBuf,
    snapshots: usize,
    pruned: usize,
    sha256: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    let config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let _log_guard =
        repopulse_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("repopulse-record starting");

    let today = Utc::now().date_naive();
    let date = args.date.unwrap_or(today);
    let retention_days = args.retention_days.unwrap_or(config.history.retention_days);
    if retention_days == 0 {
        anyhow::bail!("--retention-days must be at least 1");
    }
    let history_path = args
        .history
        .clone()
        .unwrap_or_else(|| config.history.resolved_path());

    // Build the snapshot
    let (mut snapshot, tools) = match (args.outputs.as_ref(), args.snapshot.as_deref()) {
        (Some(dir), _) => {
            let collector =
                SnapshotCollector::new(&config.tools).context("invalid [tools] configuration")?;
            let report = collector
                .collect_dir(dir, date)
                .with_context(|| format!("failed to collect tool outputs from {}", dir.display()))?;
            (report.snapshot, report.results)
        }
        (None, Some(source)) => (read_snapshot(source, args.date, today)?, Vec::new()),
        (None, None) => anyhow::bail!("either --outputs or --snapshot is required"),
    };

    if let Some(sources) = &args.sources {
        DuplicationAnalyzer::new(&config.duplication)
            .record(&mut snapshot, sources)
            .context("failed to record duplication metrics")?;
    }

    if args.dry_run {
        print_summary(&args.format, &snapshot, &tools, None, &[])?;
        tracing::info!("Dry run complete");
        return Ok(());
    }

    let _writer_lock =
        acquire_writer_lock(&history_path).context("failed to acquire history writer lock")?;

    let store = MetricsHistoryStore::new(
        &history_path,
        Duration::from_millis(config.history.io_timeout_ms),
    );
    let history = match store.load() {
        Ok(history) => history,
        Err(e @ Error::CorruptHistory { .. }) => {
            tracing::warn!(
                path = %history_path.display(),
                error = %e,
                "Unreadable history; starting from an empty history"
            );
            MetricsHistory::default()
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("failed to load history from {}", history_path.display())
            })
        }
    };

    let history = if args.replace_today {
        history.replace_day(snapshot.clone())
    } else {
        history.append(snapshot.clone())
    };

    let before_prune = history.len();
    let history = if args.no_prune {
        history
    } else {
        history.prune(retention_days, today)
    };
    let pruned = before_prune - history.len();

    let detector = DegradationDetector::new(
        &config.degradation,
        MetricRegistry::new(config.trends.polarity.clone()),
    );
    let alerts = detector.detect_latest(&history);

    let persisted = store
        .persist(&history)
        .with_context(|| format!("failed to persist history to {}", history_path.display()))?;

    tracing::info!(
        date = %date,
        snapshots = persisted.snapshots,
        pruned,
        alerts = alerts.len(),
        "Snapshot recorded"
    );

    let history_summary = HistorySummary {
        path: persisted.path,
        snapshots: persisted.snapshots,
        pruned,
        sha256: persisted.sha256,
    };
    print_summary(&args.format, &snapshot, &tools, Some(history_summary), &alerts)
}

/// Read a snapshot object from a file or stdin.
///
/// `--date` wins over any date in the object; an object without a date gets
/// today's.
fn read_snapshot(source: &str, date: Option<NaiveDate>, today: NaiveDate) -> Result<MetricSnapshot> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read snapshot from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read snapshot file {source}"))?
    };

    let mut value: serde_json::Value =
        serde_json::from_str(&content).context("snapshot is not valid JSON")?;
    let object = value
        .as_object_mut()
        .context("snapshot must be a JSON object")?;

    let has_date = object.contains_key(DATE_KEY) || object.contains_key(TIMESTAMP_KEY);
    if date.is_some() || !has_date {
        let day = date.unwrap_or(today);
        object.remove(TIMESTAMP_KEY);
        object.insert(
            DATE_KEY.to_string(),
            serde_json::Value::String(day.format("%Y-%m-%d").to_string()),
        );
    }

    let mut snapshot: MetricSnapshot =
        serde_json::from_value(value).context("invalid snapshot")?;
    derive_metrics(&mut snapshot)?;
    Ok(snapshot)
}

fn print_summary(
    format: &str,
    snapshot: &MetricSnapshot,
    tools: &[ToolResult],
    history: Option<HistorySummary>,
    alerts: &[DegradationAlert],
) -> Result<()> {
    if format == "json" {
        let summary = RecordSummary {
            snapshot,
            tools,
            history,
            alerts,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let missing = snapshot.fields().values().filter(|v| v.is_none()).count();
    println!(
        "Snapshot {}: {} metric(s), {} missing",
        snapshot.date(),
        snapshot.fields().len() - missing,
        missing
    );

    if !tools.is_empty() {
        println!("\nTools:");
        for (tool, status) in summarize(tools) {
            println!("  {:<10} {}", tool, status);
        }
    }

    match history {
        Some(h) => {
            println!("\nHistory: {}", h.path.display());
            println!("  Snapshots: {} ({} pruned)", h.snapshots, h.pruned);
            println!("  SHA-256:   {}", h.sha256);
        }
        None => {
            println!("\nDry run - history not modified");
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
    }

    if !alerts.is_empty() {
        println!("\nDegradation alerts:");
        for alert in alerts {
            println!("  [{}] {}", alert.severity.as_str(), alert.message);
        }
    }
    Ok(())
}
