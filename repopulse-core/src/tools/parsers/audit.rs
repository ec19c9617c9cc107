//! Dependency audit parsers: pip-audit and safety.
//!
//! Both tools changed their JSON layout between major versions, so each
//! report type accepts every layout still seen in CI images.

use super::from_json;
use crate::error::Result;
use crate::tools::{ToolKind, ToolParser};
use serde::Deserialize;
use std::collections::BTreeMap;

/// `pip-audit --format json`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PipAuditReport {
    // Sequence layouts go first: untagged struct variants also accept arrays.
    /// Older releases: bare list of dependencies
    Legacy(Vec<AuditedDependency>),
    /// pip-audit >= 2.5: `{"dependencies": [{"name", "vulns": [...]}], "fixes": [...]}`
    Dependencies { dependencies: Vec<AuditedDependency> },
    /// Flattened `{"vulnerabilities": [...]}` emitted by wrapper scripts
    Flat {
        vulnerabilities: Vec<serde_json::Value>,
    },
}

#[derive(Debug, Deserialize)]
struct AuditedDependency {
    #[serde(default)]
    vulns: Vec<serde_json::Value>,
}

impl PipAuditReport {
    fn vulnerability_count(&self) -> usize {
        match self {
            PipAuditReport::Dependencies { dependencies } | PipAuditReport::Legacy(dependencies) => {
                dependencies.iter().map(|d| d.vulns.len()).sum()
            }
            PipAuditReport::Flat { vulnerabilities } => vulnerabilities.len(),
        }
    }
}

/// `safety check --json`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SafetyReport {
    /// safety 1.x: one array per finding
    Legacy(Vec<serde_json::Value>),
    /// safety 2.x report object
    Report {
        vulnerabilities: Vec<serde_json::Value>,
    },
}

impl SafetyReport {
    fn vulnerability_count(&self) -> usize {
        match self {
            SafetyReport::Report { vulnerabilities } => vulnerabilities.len(),
            SafetyReport::Legacy(findings) => findings.len(),
        }
    }
}

/// Parser for pip-audit JSON output.
pub struct PipAuditParser;

impl ToolParser for PipAuditParser {
    fn tool(&self) -> ToolKind {
        ToolKind::PipAudit
    }

    fn fields(&self) -> &'static [&'static str] {
        &["pip_audit_vulnerabilities"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let report: PipAuditReport = from_json(self.tool(), content)?;
        Ok(BTreeMap::from([(
            "pip_audit_vulnerabilities".to_string(),
            report.vulnerability_count() as f64,
        )]))
    }
}

/// Parser for safety JSON output.
pub struct SafetyParser;

impl ToolParser for SafetyParser {
    fn tool(&self) -> ToolKind {
        ToolKind::Safety
    }

    fn fields(&self) -> &'static [&'static str] {
        &["safety_vulnerabilities"]
    }

    fn parse(&self, content: &str) -> Result<BTreeMap<String, f64>> {
        let report: SafetyReport = from_json(self.tool(), content)?;
        Ok(BTreeMap::from([(
            "safety_vulnerabilities".to_string(),
            report.vulnerability_count() as f64,
        )]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pip_audit_dependencies_layout() {
        let output = r#"{
            "dependencies": [
                {"name": "jinja2", "version": "2.11.2", "vulns": [
                    {"id": "PYSEC-2021-66", "fix_versions": ["2.11.3"]},
                    {"id": "GHSA-h5c8-rqwp-cp95", "fix_versions": ["3.1.3"]}
                ]},
                {"name": "requests", "version": "2.31.0", "vulns": []},
                {"name": "local-pkg", "skip_reason": "not on PyPI"}
            ],
            "fixes": []
        }"#;
        let fields = PipAuditParser.parse(output).unwrap();
        assert_eq!(fields["pip_audit_vulnerabilities"], 2.0);
    }

    #[test]
    fn test_pip_audit_legacy_and_flat_layouts() {
        let legacy = r#"[{"name": "urllib3", "version": "1.26.4", "vulns": [{"id": "PYSEC-1"}]}]"#;
        assert_eq!(
            PipAuditParser.parse(legacy).unwrap()["pip_audit_vulnerabilities"],
            1.0
        );

        let flat = r#"{"vulnerabilities": [{"id": "a"}, {"id": "b"}, {"id": "c"}]}"#;
        assert_eq!(
            PipAuditParser.parse(flat).unwrap()["pip_audit_vulnerabilities"],
            3.0
        );
    }

    #[test]
    fn test_safety_layouts() {
        let report = r#"{"report_meta": {"scan_target": "environment"}, "vulnerabilities": [{"vulnerability_id": "51668"}]}"#;
        assert_eq!(SafetyParser.parse(report).unwrap()["safety_vulnerabilities"], 1.0);

        let legacy = r#"[["django", "<3.2.14", "3.2.0", "SQL injection", "49733"]]"#;
        assert_eq!(SafetyParser.parse(legacy).unwrap()["safety_vulnerabilities"], 1.0);
    }

    #[test]
    fn test_safety_rejects_unrelated_object() {
        assert!(SafetyParser.parse(r#"{"status": "error"}"#).is_err());
    }
}
