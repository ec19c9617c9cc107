//! Parsing of captured analysis-tool output
//!
//! The CI workflow runs each external tool and captures its output to a file.
//! Every tool has a [`ToolParser`] that turns that output into a
//! [`ToolResult`]. A tool that could not be read degrades to
//! [`ToolStatus::Failed`] and only its own fields become missing.
//!
//! ## Supported Tools
//!
//! | Tool | Output | Default pattern |
//! |------|--------|-----------------|
//! | pylint | text report | `pylint*.txt` |
//! | flake8 | text report | `flake8*.txt` |
//! | radon cc | `-j` JSON | `radon_cc*.json` |
//! | radon mi | `-j` JSON | `radon_mi*.json` |
//! | bandit | `-f json` | `bandit*.json` |
//! | pip-audit | `--format json` | `pip_audit*.json` |
//! | safety | `--json` | `safety*.json` |
//! | pytest-cov | `coverage.json` | `coverage.json` |
//! | cloc | `--json` | `cloc*.json` |

pub mod parsers;

pub use parsers::{create_all_parsers, parser_for};

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// External tools whose output can be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Pylint,
    Flake8,
    RadonCc,
    RadonMi,
    Bandit,
    PipAudit,
    Safety,
    Coverage,
    Cloc,
}

impl ToolKind {
    pub const ALL: [ToolKind; 9] = [
        ToolKind::Pylint,
        ToolKind::Flake8,
        ToolKind::RadonCc,
        ToolKind::RadonMi,
        ToolKind::Bandit,
        ToolKind::PipAudit,
        ToolKind::Safety,
        ToolKind::Coverage,
        ToolKind::Cloc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Pylint => "pylint",
            ToolKind::Flake8 => "flake8",
            ToolKind::RadonCc => "radon_cc",
            ToolKind::RadonMi => "radon_mi",
            ToolKind::Bandit => "bandit",
            ToolKind::PipAudit => "pip_audit",
            ToolKind::Safety => "safety",
            ToolKind::Coverage => "coverage",
            ToolKind::Cloc => "cloc",
        }
    }

    /// Glob used to find this tool's output inside the outputs directory.
    pub fn default_pattern(&self) -> &'static str {
        match self {
            ToolKind::Pylint => "pylint*.txt",
            ToolKind::Flake8 => "flake8*.txt",
            ToolKind::RadonCc => "radon_cc*.json",
            ToolKind::RadonMi => "radon_mi*.json",
            ToolKind::Bandit => "bandit*.json",
            ToolKind::PipAudit => "pip_audit*.json",
            ToolKind::Safety => "safety*.json",
            ToolKind::Coverage => "coverage.json",
            ToolKind::Cloc => "cloc*.json",
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ToolKind::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| Error::Config(format!("unknown tool: {s}")))
    }
}

/// Outcome of reading one tool's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    /// Output was present but unusable
    Failed { reason: String },
    /// Tool was disabled or produced no output
    Skipped { reason: String },
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Ok => "ok",
            ToolStatus::Failed { .. } => "failed",
            ToolStatus::Skipped { .. } => "skipped",
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ToolStatus::Ok => None,
            ToolStatus::Failed { reason } | ToolStatus::Skipped { reason } => Some(reason.as_str()),
        }
    }
}

/// Metrics produced by one tool in one run.
///
/// `fields` is empty unless `status` is [`ToolStatus::Ok`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub tool: ToolKind,
    pub status: ToolStatus,
    pub fields: BTreeMap<String, f64>,
}

impl ToolResult {
    pub fn ok(tool: ToolKind, fields: BTreeMap<String, f64>) -> Self {
        Self {
            tool,
            status: ToolStatus::Ok,
            fields,
        }
    }

    pub fn failed(tool: ToolKind, reason: impl Into<String>) -> Self {
        Self {
            tool,
            status: ToolStatus::Failed {
                reason: reason.into(),
            },
            fields: BTreeMap::new(),
        }
    }

    pub fn skipped(tool: ToolKind, reason: impl Into<String>) -> Self {
        Self {
            tool,
            status: ToolStatus::Skipped {
                reason: reason.into(),
            },
            fields: BTreeMap::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ToolStatus::Ok
    }
}

/// Trait implemented by every tool output parser.
pub trait ToolParser: Send + Sync {
    /// Which tool this parser reads
    fn tool(&self) -> ToolKind;

    /// Metric names this tool always produces.
    ///
    /// These are recorded as missing when the tool fails. Parsers may emit
    /// additional dynamic fields (such as per-language line counts).
    fn fields(&self) -> &'static [&'static str];

    /// Parse captured output into metric values.
    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>>;

    /// Read and parse one output file.
    ///
    /// Never fails: unreadable output becomes a failed [`ToolResult`].
    fn parse_file(&self, path: &Path) -> ToolResult {
        let tool = self.tool();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(tool = %tool, path = %path.display(), error = %e, "Failed to read tool output");
                return ToolResult::failed(tool, format!("failed to read {}: {e}", path.display()));
            }
        };

        match self.parse(&content) {
            Ok(fields) => {
                tracing::debug!(tool = %tool, path = %path.display(), fields = fields.len(), "Parsed tool output");
                ToolResult::ok(tool, fields)
            }
            Err(e) => {
                tracing::warn!(tool = %tool, path = %path.display(), error = %e, "Failed to parse tool output");
                ToolResult::failed(tool, e.to_string())
            }
        }
    }
}
