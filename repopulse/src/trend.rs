//! repopulse-trend - report metric trends from the history file
//!
//! Loads the history, computes delta, slope and direction for each metric
//! over a trailing window and renders the result as text, markdown or JSON.
//! Alerts for the latest run's degradations and its technical debt index
//! are appended.

use anyhow::{Context, Result};
use clap::Parser;
use repopulse_core::metrics::list_metrics;
use repopulse_core::{
    Config, DegradationDetector, MetricRegistry, MetricsHistoryStore, TechnicalDebtIndex,
    TrendComputer, TrendReport,
};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "repopulse-trend")]
#[command(about = "Report metric trends from the history file")]
#[command(version)]
struct Args {
    /// History file (overrides config)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Metric to report (repeatable); all metrics in the window by default
    #[arg(short, long = "metric")]
    metrics: Vec<String>,

    /// Trailing window in days (overrides config)
    #[arg(short, long)]
    window_days: Option<u32>,

    /// Config file (defaults to $XDG_CONFIG_HOME/repopulse/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leave degradation alerts out of the report
    #[arg(long)]
    no_alerts: bool,

    /// Leave the technical debt index out of the report
    #[arg(long)]
    no_debt: bool,

    /// Print the registered metrics with their polarity and exit
    #[arg(long)]
    list_metrics: bool,

    /// Output format: text (default), markdown or json
    #[arg(long, default_value = "text", value_parser = ["text", "markdown", "json"])]
    format: String,
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

    let computer = TrendComputer::new(&config.trends);

    if args.list_metrics {
        print_metrics(&computer);
        return Ok(());
    }

    let window_days = args.window_days.unwrap_or_else(|| computer.window_days());
    if window_days == 0 {
        anyhow::bail!("--window-days must be at least 1");
    }

    let history_path = args
        .history
        .clone()
        .unwrap_or_else(|| config.history.resolved_path());
    let store = MetricsHistoryStore::new(
        &history_path,
        Duration::from_millis(config.history.io_timeout_ms),
    );
    let history = store.load_or_empty();

    tracing::info!(
        path = %history_path.display(),
        snapshots = history.len(),
        window_days,
        "Computing trends"
    );

    for metric in &args.metrics {
        if !computer.registry().is_known(metric) {
            tracing::warn!(metric = %metric, "Unregistered metric; treating higher values as better");
        }
    }

    let mut report = TrendReport::build(&history, &computer, &args.metrics, window_days);

    if !args.no_alerts {
        let detector = DegradationDetector::new(
            &config.degradation,
            MetricRegistry::new(config.trends.polarity.clone()),
        );
        report = report.with_alerts(detector.detect_latest(&history));
    }

    if !args.no_debt {
        report = report.with_debt(TechnicalDebtIndex::new(&config.debt).assess_latest(&history));
    }

    match args.format.as_str() {
        "json" => println!("{}", report.to_json()?),
        "markdown" => print!("{}", report.to_markdown()),
        _ => print!("{}", report.to_text()),
    }

    Ok(())
}

fn print_metrics(computer: &TrendComputer) {
    println!("{:<28} {:<10} {:<17} {:<9} SUMMARY", "METRIC", "SOURCE", "POLARITY", "UNIT");
    for metric in list_metrics() {
        println!(
            "{:<28} {:<10} {:<17} {:<9} {}",
            metric.name,
            metric.source,
            computer.registry().polarity(metric.name).as_str(),
            metric.unit,
            metric.summary
        );
    }
}
