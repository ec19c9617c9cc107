//! # repopulse-core
//!
//! Core library for repopulse - a repository health history and trend tracker.
//!
//! This library provides:
//! - Parsers for captured analysis-tool output (pylint, radon, bandit, ...)
//! - Snapshot collection and derived metrics
//! - Line-based code duplication over a source tree
//! - An append-only, retention-bounded history file with atomic persistence
//! - Trend computation (delta, least-squares slope, direction)
//! - Degradation alerts between consecutive runs
//! - A weighted technical debt index for the latest run
//! - Configuration management and logging infrastructure
//!
//! ## Data flow
//!
//! - **Tool outputs:** files captured by CI (immutable input)
//! - **Snapshot:** one dated set of metric values per run, appended to the history
//! - **Derived:** trends and alerts, recomputed from the history on demand
//!
//! ## Example
//!
//! ```rust,no_run
//! use repopulse_core::{Config, MetricsHistoryStore, TrendComputer};
//!
//! let config = Config::load().expect("failed to load config");
//! let store = MetricsHistoryStore::from_config(&config.history);
//! let history = store.load_or_empty();
//!
//! let trends = TrendComputer::new(&config.trends);
//! if let Ok(trend) = trends.compute(&history, "quality_score", config.trends.window_days) {
//!     println!("{} is {}", trend.metric_name, trend.direction);
//! }
//! ```

// Re-export commonly used items at the crate root
pub use collect::{CollectionReport, SnapshotCollector};
pub use config::Config;
pub use debt::{DebtReport, DebtSeverity, TechnicalDebtIndex};
pub use degradation::{DegradationAlert, DegradationDetector, Severity};
pub use duplication::DuplicationAnalyzer;
pub use error::{Error, Result};
pub use history::{MetricsHistoryStore, PersistReport};
pub use metrics::{MetricRegistry, Polarity};
pub use report::TrendReport;
pub use tools::{ToolKind, ToolParser, ToolResult, ToolStatus};
pub use trend::{Direction, TrendComputer, TrendResult};
pub use types::*;

// Public modules
pub mod collect;
pub mod config;
pub mod debt;
pub mod degradation;
pub mod duplication;
pub mod error;
pub mod history;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod tools;
pub mod trend;
pub mod types;
