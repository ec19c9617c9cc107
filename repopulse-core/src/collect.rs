//! Snapshot collection from captured tool outputs
//!
//! The collector finds each tool's output inside an outputs directory, parses
//! it into a [`ToolResult`], then merges all results into one
//! [`MetricSnapshot`]. Fields of tools that failed or were skipped are
//! recorded as missing, so a broken tool never reads as a zero.

use crate::config::ToolsConfig;
use crate::error::{Error, Result};
use crate::tools::{create_all_parsers, parser_for, ToolKind, ToolParser, ToolResult};
use crate::types::MetricSnapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Weight of the pylint score in the blended lint score.
const PYLINT_WEIGHT: f64 = 0.7;
/// Weight of the flake8 component in the blended lint score.
const FLAKE8_WEIGHT: f64 = 0.3;
/// Points deducted per flake8 issue, capped at 10.
const FLAKE8_PENALTY_PER_ISSUE: f64 = 0.1;

/// Result of one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub snapshot: MetricSnapshot,
    /// One entry per supported tool
    pub results: Vec<ToolResult>,
}

impl CollectionReport {
    pub fn failed_tools(&self) -> impl Iterator<Item = &ToolResult> {
        self.results.iter().filter(|r| !r.is_ok())
    }
}

/// Builds snapshots from a directory of captured tool outputs.
pub struct SnapshotCollector {
    parsers: Vec<Box<dyn ToolParser>>,
    patterns: HashMap<ToolKind, String>,
    disabled: HashSet<ToolKind>,
}

impl SnapshotCollector {
    /// Create a collector, resolving tool names used in the config.
    pub fn new(config: &ToolsConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|(name, pattern)| Ok((name.parse::<ToolKind>()?, pattern.clone())))
            .collect::<Result<HashMap<_, _>>>()?;
        let disabled = config
            .disabled
            .iter()
            .map(|name| name.parse::<ToolKind>())
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self {
            parsers: create_all_parsers(),
            patterns,
            disabled,
        })
    }

    /// Glob pattern for `tool`, honoring config overrides.
    pub fn pattern_for(&self, tool: ToolKind) -> &str {
        self.patterns
            .get(&tool)
            .map(String::as_str)
            .unwrap_or_else(|| tool.default_pattern())
    }

    /// Locate the output file for `tool` inside `dir`.
    ///
    /// With several matches, the last in lexical order wins.
    pub fn discover(&self, dir: &Path, tool: ToolKind) -> Result<Option<PathBuf>> {
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&dir.to_string_lossy()),
            self.pattern_for(tool)
        );
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid pattern for {tool}: {e}")))?;

        let mut matches: Vec<PathBuf> = paths
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect();
        matches.sort();
        if matches.len() > 1 {
            tracing::debug!(tool = %tool, matches = matches.len(), "Multiple outputs found; using the last");
        }
        Ok(matches.pop())
    }

    /// Parse every tool's output from `dir` into a snapshot dated `date`.
    pub fn collect_dir(&self, dir: &Path, date: NaiveDate) -> Result<CollectionReport> {
        if !dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("outputs directory not found: {}", dir.display()),
            )));
        }

        let mut results = Vec::with_capacity(self.parsers.len());
        for parser in &self.parsers {
            let tool = parser.tool();
            let result = if self.disabled.contains(&tool) {
                ToolResult::skipped(tool, "disabled in config")
            } else {
                match self.discover(dir, tool)? {
                    Some(path) => parser.parse_file(&path),
                    None => ToolResult::skipped(
                        tool,
                        format!("no output matching {}", self.pattern_for(tool)),
                    ),
                }
            };
            results.push(result);
        }

        let snapshot = merge(date, &results)?;

        let failed = results.iter().filter(|r| !r.is_ok()).count();
        tracing::info!(
            dir = %dir.display(),
            date = %date,
            tools = results.len(),
            failed,
            fields = snapshot.fields().len(),
            "Collected snapshot"
        );

        Ok(CollectionReport { snapshot, results })
    }
}

/// Merge tool results into one snapshot and add derived metrics.
pub fn merge(date: NaiveDate, results: &[ToolResult]) -> Result<MetricSnapshot> {
    let mut snapshot = MetricSnapshot::new(date);
    for result in results {
        if result.is_ok() {
            for (name, value) in &result.fields {
                snapshot.set(name.as_str(), *value)?;
            }
        } else {
            for name in parser_for(result.tool).fields() {
                snapshot.set_missing(*name)?;
            }
        }
    }
    derive_metrics(&mut snapshot)?;
    Ok(snapshot)
}

/// Add derived metrics not already present in `snapshot`.
///
/// A derived metric is recorded as missing when one of its inputs is
/// tracked but unavailable, and left out when none of its inputs are tracked.
pub fn derive_metrics(snapshot: &mut MetricSnapshot) -> Result<()> {
    if !snapshot.fields().contains_key("lint_score") {
        match (snapshot.get("quality_score"), snapshot.get("flake8_issues")) {
            (Some(pylint), Some(flake8)) => {
                snapshot.set("lint_score", lint_score(pylint, flake8))?;
            }
            _ if tracks_any(snapshot, &["quality_score", "flake8_issues"]) => {
                snapshot.set_missing("lint_score")?;
            }
            _ => {}
        }
    }

    if !snapshot.fields().contains_key("dependency_vulnerabilities") {
        let inputs = ["pip_audit_vulnerabilities", "safety_vulnerabilities"];
        let measured = inputs
            .iter()
            .filter_map(|name| snapshot.get(name))
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))));
        match measured {
            Some(v) => snapshot.set("dependency_vulnerabilities", v)?,
            None if tracks_any(snapshot, &inputs) => {
                snapshot.set_missing("dependency_vulnerabilities")?
            }
            None => {}
        }
    }

    Ok(())
}

/// Blend of the pylint score and a capped flake8 penalty, on a 0-10 scale.
pub fn lint_score(pylint_score: f64, flake8_issues: f64) -> f64 {
    let penalty = (flake8_issues * FLAKE8_PENALTY_PER_ISSUE).min(10.0);
    let score = pylint_score * PYLINT_WEIGHT + (10.0 - penalty) * FLAKE8_WEIGHT;
    (score * 100.0).round() / 100.0
}

fn tracks_any(snapshot: &MetricSnapshot, names: &[&str]) -> bool {
    names.iter().any(|n| snapshot.fields().contains_key(*n))
}

/// Per-tool status lines, keyed by tool name.
pub fn summarize(results: &[ToolResult]) -> BTreeMap<String, String> {
    results
        .iter()
        .map(|r| {
            let line = match r.status.reason() {
                Some(reason) => format!("{}: {}", r.status.as_str(), reason),
                None => format!("ok ({} fields)", r.fields.len()),
            };
            (r.tool.to_string(), line)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_lint_score_formula() {
        assert_eq!(lint_score(8.0, 20.0), 8.0);
        assert_eq!(lint_score(6.5, 0.0), 7.55);
        // Penalty caps at 10 points.
        assert_eq!(lint_score(10.0, 500.0), 7.0);
    }

    #[test]
    fn test_failed_tool_fields_are_missing() {
        let results = vec![
            ToolResult::ok(
                ToolKind::Pylint,
                BTreeMap::from([
                    ("quality_score".to_string(), 7.5),
                    ("pylint_messages".to_string(), 3.0),
                ]),
            ),
            ToolResult::failed(ToolKind::Coverage, "no totals"),
        ];

        let snapshot = merge(day(), &results).unwrap();
        assert_eq!(snapshot.get("quality_score"), Some(7.5));
        assert!(snapshot.is_missing("test_coverage"));
        assert!(snapshot.is_missing("covered_lines"));
        // flake8 untracked, so the blend cannot be computed.
        assert!(snapshot.is_missing("lint_score"));
        assert!(!snapshot.fields().contains_key("dependency_vulnerabilities"));
    }

    #[test]
    fn test_dependency_vulnerabilities_takes_max() {
        let mut snapshot = MetricSnapshot::new(day());
        snapshot.set("pip_audit_vulnerabilities", 2.0).unwrap();
        snapshot.set("safety_vulnerabilities", 3.0).unwrap();
        derive_metrics(&mut snapshot).unwrap();
        assert_eq!(snapshot.get("dependency_vulnerabilities"), Some(3.0));

        let mut partial = MetricSnapshot::new(day());
        partial.set("pip_audit_vulnerabilities", 1.0).unwrap();
        partial.set_missing("safety_vulnerabilities").unwrap();
        derive_metrics(&mut partial).unwrap();
        assert_eq!(partial.get("dependency_vulnerabilities"), Some(1.0));
    }

    #[test]
    fn test_derive_keeps_supplied_values() {
        let mut snapshot = MetricSnapshot::new(day());
        snapshot.set("quality_score", 9.0).unwrap();
        snapshot.set("flake8_issues", 0.0).unwrap();
        snapshot.set("lint_score", 1.0).unwrap();
        derive_metrics(&mut snapshot).unwrap();
        assert_eq!(snapshot.get("lint_score"), Some(1.0));
    }

    #[test]
    fn test_collector_rejects_unknown_tool_in_config() {
        let config = ToolsConfig {
            disabled: vec!["eslint".to_string()],
            ..Default::default()
        };
        assert!(SnapshotCollector::new(&config).is_err());
    }

    #[test]
    fn test_collect_dir_skips_absent_and_disabled_tools() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("flake8.txt"),
            "a.py:1:1: F401 'os' imported but unused\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("bandit.json"), r#"{"results": []}"#).unwrap();

        let config = ToolsConfig {
            disabled: vec!["bandit".to_string()],
            ..Default::default()
        };
        let report = SnapshotCollector::new(&config)
            .unwrap()
            .collect_dir(dir.path(), day())
            .unwrap();

        assert_eq!(report.results.len(), ToolKind::ALL.len());
        assert_eq!(report.snapshot.get("flake8_issues"), Some(1.0));
        assert!(report.snapshot.is_missing("security_issues"));
        assert!(report.snapshot.is_missing("quality_score"));

        let summary = summarize(&report.results);
        assert_eq!(summary["bandit"], "skipped: disabled in config");
        assert_eq!(summary["flake8"], "ok (1 fields)");
    }

    #[test]
    fn test_pattern_override() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("lint-report.log"), "Your code has been rated at 9.00/10").unwrap();

        let config = ToolsConfig {
            patterns: HashMap::from([("pylint".to_string(), "lint-*.log".to_string())]),
            ..Default::default()
        };
        let collector = SnapshotCollector::new(&config).unwrap();
        assert_eq!(collector.pattern_for(ToolKind::Pylint), "lint-*.log");
        assert!(collector.discover(dir.path(), ToolKind::Pylint).unwrap().is_some());
    }
}
