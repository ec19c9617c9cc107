//! pytest-cov `coverage.json` parser

use super::from_json;
use crate::error::Result;
use crate::tools::{ToolKind, ToolParser};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct CoverageReport {
    totals: CoverageTotals,
}

#[derive(Debug, Deserialize)]
struct CoverageTotals {
    percent_covered: f64,
    covered_lines: u64,
    num_statements: u64,
}

/// Parser for coverage.py JSON reports.
pub struct CoverageParser;

impl ToolParser for CoverageParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Coverage
    }

    fn fields(&self) -> &'static [&'static str] {
        &["test_coverage", "covered_lines", "total_statements"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let report: CoverageReport = from_json(self.tool(), content)?;
        let totals = report.totals;
        Ok(BTreeMap::from([
            (
                "test_coverage".to_string(),
                (totals.percent_covered * 100.0).round() / 100.0,
            ),
            ("covered_lines".to_string(), totals.covered_lines as f64),
            ("total_statements".to_string(), totals.num_statements as f64),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_totals() {
        let output = r#"{
            "meta": {"version": "7.4.0"},
            "files": {"app/main.py": {"summary": {"percent_covered": 50.0}}},
            "totals": {
                "covered_lines": 412,
                "num_statements": 500,
                "percent_covered": 82.4,
                "percent_covered_display": "82",
                "missing_lines": 88
            }
        }"#;
        let fields = CoverageParser.parse(output).unwrap();
        assert_eq!(fields["test_coverage"], 82.4);
        assert_eq!(fields["covered_lines"], 412.0);
        assert_eq!(fields["total_statements"], 500.0);
    }

    #[test]
    fn test_missing_totals_is_error() {
        assert!(CoverageParser.parse(r#"{"meta": {}}"#).is_err());
    }
}
