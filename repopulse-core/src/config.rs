//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/repopulse/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/repopulse/` (~/.config/repopulse/)
//! - Data: `$XDG_DATA_HOME/repopulse/` (~/.local/share/repopulse/)
//! - State/Logs: `$XDG_STATE_HOME/repopulse/` (~/.local/state/repopulse/)
//!
//! Every threshold used by the store, the trend computer and the degradation
//! detector lives here. Components receive the section they need at
//! construction time.

use crate::debt::DebtComponent;
use crate::error::{Error, Result};
use crate::metrics::Polarity;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// History file location and retention
    #[serde(default)]
    pub history: HistoryConfig,

    /// Trend computation settings
    #[serde(default)]
    pub trends: TrendConfig,

    /// Degradation alert thresholds
    #[serde(default)]
    pub degradation: DegradationConfig,

    /// Technical debt index weights
    #[serde(default)]
    pub debt: DebtConfig,

    /// Tool output discovery
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Source scanning for code duplication
    #[serde(default)]
    pub duplication: DuplicationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// History store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// History file path (defaults to `$XDG_DATA_HOME/repopulse/history.json`)
    pub path: Option<PathBuf>,

    /// Snapshots older than this many days are pruned
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Ceiling for a single load or persist, in milliseconds
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            retention_days: default_retention_days(),
            io_timeout_ms: default_io_timeout_ms(),
        }
    }
}

impl HistoryConfig {
    /// Resolved history file path.
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(Config::default_history_path)
    }
}

fn default_retention_days() -> u32 {
    90
}

fn default_io_timeout_ms() -> u64 {
    10_000
}

/// Trend computation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TrendConfig {
    /// Trailing window, in days, used for delta and slope
    #[serde(default = "default_window_days")]
    pub window_days: u32,

    /// Stability threshold as a fraction of the metric's mean magnitude
    #[serde(default = "default_epsilon_fraction")]
    pub epsilon_fraction: f64,

    /// Absolute per-metric stability thresholds (slope units per day)
    #[serde(default)]
    pub epsilon: HashMap<String, f64>,

    /// Polarity overrides for metrics outside the built-in registry
    #[serde(default)]
    pub polarity: HashMap<String, Polarity>,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: default_window_days(),
            epsilon_fraction: default_epsilon_fraction(),
            epsilon: HashMap::new(),
            polarity: HashMap::new(),
        }
    }
}

fn default_window_days() -> u32 {
    30
}

fn default_epsilon_fraction() -> f64 {
    0.01
}

/// Degradation alert configuration
///
/// A threshold is the largest change in the "worse" direction that is still
/// tolerated between two consecutive snapshots.
#[derive(Debug, Deserialize, Clone)]
pub struct DegradationConfig {
    /// Per-metric thresholds
    #[serde(default = "default_degradation_thresholds")]
    pub thresholds: HashMap<String, f64>,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            thresholds: default_degradation_thresholds(),
        }
    }
}

fn default_degradation_thresholds() -> HashMap<String, f64> {
    HashMap::from([
        ("quality_score".to_string(), 0.5),
        ("avg_complexity".to_string(), 1.0),
        ("test_coverage".to_string(), 2.0),
        ("dependency_vulnerabilities".to_string(), 0.0),
    ])
}

/// Technical debt index configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DebtConfig {
    /// Component weights; a zero weight leaves the component out
    #[serde(default)]
    pub weights: DebtWeights,

    /// Components scoring above this (0-100) produce a recommendation
    #[serde(default = "default_recommend_above")]
    pub recommend_above: f64,
}

impl Default for DebtConfig {
    fn default() -> Self {
        Self {
            weights: DebtWeights::default(),
            recommend_above: default_recommend_above(),
        }
    }
}

fn default_recommend_above() -> f64 {
    60.0
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default, deny_unknown_fields)]
pub struct DebtWeights {
    pub code_quality: f64,
    pub complexity: f64,
    pub test_coverage: f64,
    pub dependencies: f64,
    pub duplication: f64,
}

impl Default for DebtWeights {
    fn default() -> Self {
        Self {
            code_quality: 0.30,
            complexity: 0.25,
            test_coverage: 0.20,
            dependencies: 0.15,
            duplication: 0.10,
        }
    }
}

impl DebtWeights {
    pub fn get(&self, component: DebtComponent) -> f64 {
        match component {
            DebtComponent::CodeQuality => self.code_quality,
            DebtComponent::Complexity => self.complexity,
            DebtComponent::TestCoverage => self.test_coverage,
            DebtComponent::Dependencies => self.dependencies,
            DebtComponent::Duplication => self.duplication,
        }
    }
}

/// Tool output discovery configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ToolsConfig {
    /// Glob pattern overrides keyed by tool name (e.g. `pylint = "lint/pylint.log"`)
    #[serde(default)]
    pub patterns: HashMap<String, String>,

    /// Tools whose output is never read; their fields are recorded as missing
    #[serde(default)]
    pub disabled: Vec<String>,
}

/// Duplication analysis configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DuplicationConfig {
    /// Glob, relative to the sources directory, selecting files to scan
    #[serde(default = "default_source_pattern")]
    pub source_pattern: String,
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            source_pattern: default_source_pattern(),
        }
    }
}

fn default_source_pattern() -> String {
    "**/*.py".to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.history.retention_days == 0 {
            return Err(Error::Config(
                "history.retention_days must be at least 1".to_string(),
            ));
        }
        if self.history.io_timeout_ms == 0 {
            return Err(Error::Config(
                "history.io_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.trends.window_days == 0 {
            return Err(Error::Config(
                "trends.window_days must be at least 1".to_string(),
            ));
        }
        if !self.trends.epsilon_fraction.is_finite() || self.trends.epsilon_fraction < 0.0 {
            return Err(Error::Config(
                "trends.epsilon_fraction must be a non-negative number".to_string(),
            ));
        }
        for (metric, eps) in &self.trends.epsilon {
            if !eps.is_finite() || *eps < 0.0 {
                return Err(Error::Config(format!(
                    "trends.epsilon.{metric} must be a non-negative number"
                )));
            }
        }
        for (metric, threshold) in &self.degradation.thresholds {
            if !threshold.is_finite() || *threshold < 0.0 {
                return Err(Error::Config(format!(
                    "degradation.thresholds.{metric} must be a non-negative number"
                )));
            }
        }
        for component in DebtComponent::ALL {
            let weight = self.debt.weights.get(component);
            if !weight.is_finite() || weight < 0.0 {
                return Err(Error::Config(format!(
                    "debt.weights.{component} must be a non-negative number"
                )));
            }
        }
        if !self.debt.recommend_above.is_finite() {
            return Err(Error::Config(
                "debt.recommend_above must be a number".to_string(),
            ));
        }
        if let Err(e) = glob::Pattern::new(&self.duplication.source_pattern) {
            return Err(Error::Config(format!(
                "duplication.source_pattern is not a valid glob: {e}"
            )));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/repopulse/config.toml` (~/.config/repopulse/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("repopulse").join("config.toml")
    }

    /// Returns the data directory path (for the history file)
    ///
    /// `$XDG_DATA_HOME/repopulse/` (~/.local/share/repopulse/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("repopulse")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/repopulse/` (~/.local/state/repopulse/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("repopulse")
    }

    /// Returns the default history file path
    ///
    /// `$XDG_DATA_HOME/repopulse/history.json`
    pub fn default_history_path() -> PathBuf {
        Self::data_dir().join("history.json")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
