//! Line-based code duplication over a source tree
//!
//! Each file's lines are normalized (trimmed, blank and `#` comment lines
//! dropped) and every normalized line that occurs more than once in the same
//! file counts as duplicated. The tree-wide percentage is duplicated lines
//! over raw lines across all files.

use crate::config::DuplicationConfig;
use crate::error::{Error, Result};
use crate::types::MetricSnapshot;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DUPLICATION_PERCENT: &str = "code_duplication_percent";
pub const DUPLICATED_LINES: &str = "duplicated_lines";

/// Duplication found in one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDuplication {
    pub path: PathBuf,
    pub total_lines: usize,
    pub duplicated_lines: usize,
}

/// Duplication aggregated across a source tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicationSummary {
    pub files: Vec<FileDuplication>,
    pub total_lines: usize,
    pub duplicated_lines: usize,
    /// Rounded to two decimals
    pub percent: f64,
}

/// Count normalized lines of `content` that appear more than once.
pub fn count_duplicate_lines(content: &str) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        *counts.entry(line).or_default() += 1;
    }
    counts.values().filter(|n| **n > 1).sum()
}

pub struct DuplicationAnalyzer {
    pattern: String,
}

impl DuplicationAnalyzer {
    pub fn new(config: &DuplicationConfig) -> Self {
        Self {
            pattern: config.source_pattern.clone(),
        }
    }

    /// Scan every file under `root` matching the source pattern.
    ///
    /// Unreadable or non-UTF-8 files are skipped. Finding no readable
    /// sources is an error so the caller can record the metric as missing.
    pub fn analyze_dir(&self, root: &Path) -> Result<DuplicationSummary> {
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("sources directory not found: {}", root.display()),
            )));
        }

        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            self.pattern
        );
        let mut paths: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("invalid duplication.source_pattern: {e}")))?
            .filter_map(|p| p.ok())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read_to_string(&path) {
                Ok(content) => files.push(FileDuplication {
                    total_lines: content.lines().count(),
                    duplicated_lines: count_duplicate_lines(&content),
                    path,
                }),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable source file");
                }
            }
        }

        if files.is_empty() {
            return Err(Error::tool_output(
                "duplication",
                format!("no readable sources matching {}", self.pattern),
            ));
        }

        let total_lines: usize = files.iter().map(|f| f.total_lines).sum();
        let duplicated_lines: usize = files.iter().map(|f| f.duplicated_lines).sum();
        let percent = if total_lines == 0 {
            0.0
        } else {
            let raw = duplicated_lines as f64 / total_lines as f64 * 100.0;
            (raw * 100.0).round() / 100.0
        };

        tracing::debug!(
            root = %root.display(),
            files = files.len(),
            total_lines,
            duplicated_lines,
            percent,
            "Analyzed duplication"
        );

        Ok(DuplicationSummary {
            files,
            total_lines,
            duplicated_lines,
            percent,
        })
    }

    /// Add duplication metrics for `root` to `snapshot`.
    ///
    /// A failed analysis is logged and both metrics are recorded as missing.
    pub fn record(&self, snapshot: &mut MetricSnapshot, root: &Path) -> Result<()> {
        match self.analyze_dir(root) {
            Ok(summary) => {
                snapshot.set(DUPLICATION_PERCENT, summary.percent)?;
                snapshot.set(DUPLICATED_LINES, summary.duplicated_lines as f64)?;
            }
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "Duplication analysis failed");
                snapshot.set_missing(DUPLICATION_PERCENT)?;
                snapshot.set_missing(DUPLICATED_LINES)?;
            }
        }
        Ok(())
    }
}

impl Default for DuplicationAnalyzer {
    fn default() -> Self {
        Self::new(&DuplicationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const REPEATED: &str = "import os\n\ndef add(a, b):\n    # sum\n    return a + b\n\ndef plus(a, b):\n    return a + b\n";

    #[test]
    fn test_count_ignores_blank_and_comment_lines() {
        assert_eq!(count_duplicate_lines(REPEATED), 2);
        assert_eq!(count_duplicate_lines("# same\n# same\n\n\n"), 0);
        assert_eq!(count_duplicate_lines("x = 1\n  x = 1\nx = 1\n"), 3);
    }

    #[test]
    fn test_analyze_dir_aggregates_matching_files() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("pkg")).unwrap();
        std::fs::write(dir.path().join("pkg/a.py"), REPEATED).unwrap();
        std::fs::write(dir.path().join("b.py"), "x = 1\ny = 2\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "same\nsame\n").unwrap();

        let summary = DuplicationAnalyzer::default()
            .analyze_dir(dir.path())
            .unwrap();

        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.total_lines, 10);
        assert_eq!(summary.duplicated_lines, 2);
        assert_eq!(summary.percent, 20.0);
    }

    #[test]
    fn test_record_marks_missing_without_sources() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "docs").unwrap();
        let mut snapshot = MetricSnapshot::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        DuplicationAnalyzer::default()
            .record(&mut snapshot, dir.path())
            .unwrap();

        assert!(snapshot.is_missing(DUPLICATION_PERCENT));
        assert!(snapshot.is_missing(DUPLICATED_LINES));
    }

    #[test]
    fn test_record_sets_metrics() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.py"), REPEATED).unwrap();
        let mut snapshot = MetricSnapshot::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        DuplicationAnalyzer::default()
            .record(&mut snapshot, dir.path())
            .unwrap();

        assert_eq!(snapshot.get(DUPLICATION_PERCENT), Some(25.0));
        assert_eq!(snapshot.get(DUPLICATED_LINES), Some(2.0));
    }
}
