//! bandit `-f json` parser

use super::from_json;
use crate::error::Result;
use crate::tools::{ToolKind, ToolParser};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
struct BanditReport {
    results: Vec<BanditIssue>,
}

#[derive(Debug, Deserialize)]
struct BanditIssue {
    #[serde(default)]
    issue_severity: String,
}

/// Parser for bandit JSON output.
pub struct BanditParser;

impl ToolParser for BanditParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Bandit
    }

    fn fields(&self) -> &'static [&'static str] {
        &["security_issues", "high_severity_issues"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let report: BanditReport = from_json(self.tool(), content)?;
        let high = report
            .results
            .iter()
            .filter(|i| i.issue_severity.eq_ignore_ascii_case("high"))
            .count();

        Ok(BTreeMap::from([
            ("security_issues".to_string(), report.results.len() as f64),
            ("high_severity_issues".to_string(), high as f64),
        ]))
    }
}
