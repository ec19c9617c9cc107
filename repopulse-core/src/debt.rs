//! Technical debt index
//!
//! Condenses one snapshot into a 0-100 score where higher means more debt.
//! Each component maps one metric onto 0-100 and contributes by its weight.
//!
//! | Component | Metric | Default weight |
//! |-----------|--------|----------------|
//! | code quality | `quality_score` | 0.30 |
//! | complexity | `avg_complexity` | 0.25 |
//! | test coverage | `test_coverage` | 0.20 |
//! | dependencies | `dependency_vulnerabilities` | 0.15 |
//! | duplication | `code_duplication_percent` | 0.10 |
//!
//! Components whose metric is absent or missing are left out and the
//! remaining weights are rescaled, so a failed tool never reads as zero debt.

use crate::config::DebtConfig;
use crate::types::{MetricSnapshot, MetricsHistory};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DebtComponent {
    CodeQuality,
    Complexity,
    TestCoverage,
    Dependencies,
    Duplication,
}

impl DebtComponent {
    pub const ALL: [DebtComponent; 5] = [
        DebtComponent::CodeQuality,
        DebtComponent::Complexity,
        DebtComponent::TestCoverage,
        DebtComponent::Dependencies,
        DebtComponent::Duplication,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtComponent::CodeQuality => "code_quality",
            DebtComponent::Complexity => "complexity",
            DebtComponent::TestCoverage => "test_coverage",
            DebtComponent::Dependencies => "dependencies",
            DebtComponent::Duplication => "duplication",
        }
    }

    /// Snapshot metric feeding this component.
    pub fn metric(&self) -> &'static str {
        match self {
            DebtComponent::CodeQuality => "quality_score",
            DebtComponent::Complexity => "avg_complexity",
            DebtComponent::TestCoverage => "test_coverage",
            DebtComponent::Dependencies => "dependency_vulnerabilities",
            DebtComponent::Duplication => "code_duplication_percent",
        }
    }

    /// Map a metric value onto 0-100 debt.
    pub fn score(&self, value: f64) -> f64 {
        let raw = match self {
            // 10/10 is no debt, 0/10 is full debt.
            DebtComponent::CodeQuality => (10.0 - value) * 10.0,
            // Free below 7, 0-50 up to 15, then 5 points per unit.
            DebtComponent::Complexity => {
                if value < 7.0 {
                    0.0
                } else if value < 15.0 {
                    (value - 7.0) * (50.0 / 8.0)
                } else {
                    50.0 + ((value - 15.0) * 5.0).min(50.0)
                }
            }
            DebtComponent::TestCoverage => (100.0 - value) * 0.75,
            DebtComponent::Dependencies => value * 10.0,
            DebtComponent::Duplication => {
                if value < 5.0 {
                    value * 4.0
                } else if value < 15.0 {
                    20.0 + (value - 5.0) * 5.0
                } else {
                    70.0 + ((value - 15.0) * 2.0).min(30.0)
                }
            }
        };
        raw.clamp(0.0, 100.0)
    }

    fn recommendation(&self, value: f64) -> Recommendation {
        let (priority, area, issue, action, tool) = match self {
            DebtComponent::CodeQuality => (
                Priority::High,
                "Code Quality",
                format!("Code quality score is low ({value}/10)"),
                "Review pylint warnings and refactor the most problematic files",
                "pylint",
            ),
            DebtComponent::Complexity => (
                Priority::High,
                "Complexity",
                format!("Average complexity is high ({value:.1})"),
                "Break down complex functions into smaller, testable units",
                "radon",
            ),
            DebtComponent::TestCoverage => (
                Priority::High,
                "Test Coverage",
                format!("Test coverage is low ({value:.1}%)"),
                "Write tests for uncovered code paths, focus on critical paths",
                "pytest",
            ),
            DebtComponent::Dependencies => (
                Priority::Critical,
                "Security",
                format!("Found {value:.0} dependency vulnerabilities"),
                "Update packages to patched versions immediately",
                "pip-audit/safety",
            ),
            DebtComponent::Duplication => (
                Priority::Medium,
                "Code Duplication",
                format!("Code duplication is {value:.1}%"),
                "Extract common code into reusable functions/modules",
                "repopulse-record --sources",
            ),
        };
        Recommendation {
            component: *self,
            priority,
            area: area.to_string(),
            issue,
            action: action.to_string(),
            tool: tool.to_string(),
        }
    }
}

impl std::fmt::Display for DebtComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall debt band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DebtSeverity {
    Healthy,
    Acceptable,
    Warning,
    Critical,
    Extreme,
}

impl DebtSeverity {
    pub fn classify(index: f64) -> Self {
        if index < 20.0 {
            DebtSeverity::Healthy
        } else if index < 40.0 {
            DebtSeverity::Acceptable
        } else if index < 60.0 {
            DebtSeverity::Warning
        } else if index < 80.0 {
            DebtSeverity::Critical
        } else {
            DebtSeverity::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DebtSeverity::Healthy => "healthy",
            DebtSeverity::Acceptable => "acceptable",
            DebtSeverity::Warning => "warning",
            DebtSeverity::Critical => "critical",
            DebtSeverity::Extreme => "extreme",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentScore {
    pub component: DebtComponent,
    pub metric: String,
    /// Metric value read from the snapshot
    pub value: f64,
    /// Component debt, 0-100
    pub score: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub component: DebtComponent,
    pub priority: Priority,
    pub area: String,
    pub issue: String,
    pub action: String,
    pub tool: String,
}

/// Debt assessment of one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebtReport {
    pub date: NaiveDate,
    /// Weighted debt, 0-100
    pub index: f64,
    pub severity: DebtSeverity,
    pub components: Vec<ComponentScore>,
    /// Components left out because their metric was not measured
    pub unavailable: Vec<DebtComponent>,
    /// Most urgent first
    pub recommendations: Vec<Recommendation>,
}

/// Scores snapshots with configured component weights.
#[derive(Debug, Clone)]
pub struct TechnicalDebtIndex {
    config: DebtConfig,
}

impl Default for TechnicalDebtIndex {
    fn default() -> Self {
        Self::new(&DebtConfig::default())
    }
}

impl TechnicalDebtIndex {
    pub fn new(config: &DebtConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Assess `snapshot`.
    ///
    /// `None` when no weighted component has a measured value.
    pub fn assess(&self, snapshot: &MetricSnapshot) -> Option<DebtReport> {
        let mut components = Vec::new();
        let mut unavailable = Vec::new();

        for component in DebtComponent::ALL {
            let weight = self.config.weights.get(component);
            if weight <= 0.0 {
                continue;
            }
            match snapshot.get(component.metric()) {
                Some(value) => components.push(ComponentScore {
                    component,
                    metric: component.metric().to_string(),
                    value,
                    score: round2(component.score(value)),
                    weight,
                }),
                None => unavailable.push(component),
            }
        }

        let total_weight: f64 = components.iter().map(|c| c.weight).sum();
        if components.is_empty() || total_weight <= 0.0 {
            tracing::debug!(date = %snapshot.date(), "No debt components measured");
            return None;
        }

        let weighted: f64 = components
            .iter()
            .map(|c| c.component.score(c.value) * c.weight)
            .sum();
        let index = round2(weighted / total_weight);

        let mut recommendations: Vec<Recommendation> = components
            .iter()
            .filter(|c| c.score > self.config.recommend_above)
            .map(|c| c.component.recommendation(c.value))
            .collect();
        recommendations.sort_by_key(|r| r.priority);

        let severity = DebtSeverity::classify(index);
        tracing::debug!(
            date = %snapshot.date(),
            index,
            severity = severity.as_str(),
            unavailable = unavailable.len(),
            "Assessed technical debt"
        );

        Some(DebtReport {
            date: snapshot.date(),
            index,
            severity,
            components,
            unavailable,
            recommendations,
        })
    }

    /// Assess the newest snapshot of `history`.
    pub fn assess_latest(&self, history: &MetricsHistory) -> Option<DebtReport> {
        history.latest().and_then(|s| self.assess(s))
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(values: &[(&str, f64)]) -> MetricSnapshot {
        let mut s = MetricSnapshot::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        for (name, v) in values {
            s.set(*name, *v).unwrap();
        }
        s
    }

    #[test]
    fn test_component_scores() {
        assert_eq!(DebtComponent::CodeQuality.score(6.5), 35.0);
        assert_eq!(DebtComponent::CodeQuality.score(11.0), 0.0);
        assert_eq!(DebtComponent::Complexity.score(5.0), 0.0);
        assert!((DebtComponent::Complexity.score(8.2) - 7.5).abs() < 1e-9);
        assert_eq!(DebtComponent::Complexity.score(40.0), 100.0);
        assert_eq!(DebtComponent::TestCoverage.score(72.5), 20.625);
        assert_eq!(DebtComponent::Dependencies.score(14.0), 100.0);
        assert_eq!(DebtComponent::Duplication.score(6.5), 27.5);
        assert_eq!(DebtComponent::Duplication.score(20.0), 80.0);
    }

    #[test]
    fn test_full_snapshot_index() {
        let report = TechnicalDebtIndex::default()
            .assess(&snapshot(&[
                ("quality_score", 6.5),
                ("avg_complexity", 8.2),
                ("test_coverage", 72.5),
                ("dependency_vulnerabilities", 1.0),
                ("code_duplication_percent", 6.5),
            ]))
            .unwrap();

        assert!((report.index - 20.75).abs() < 1e-9);
        assert_eq!(report.severity, DebtSeverity::Acceptable);
        assert_eq!(report.components.len(), 5);
        assert!(report.unavailable.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_unmeasured_components_are_rescaled_out() {
        let mut s = snapshot(&[
            ("quality_score", 6.5),
            ("avg_complexity", 8.2),
            ("dependency_vulnerabilities", 1.0),
        ]);
        s.set_missing("test_coverage").unwrap();

        let report = TechnicalDebtIndex::default().assess(&s).unwrap();

        // (35 * 0.30 + 7.5 * 0.25 + 10 * 0.15) / 0.70
        assert!((report.index - 19.82).abs() < 1e-9);
        assert_eq!(report.severity, DebtSeverity::Healthy);
        assert_eq!(
            report.unavailable,
            vec![DebtComponent::TestCoverage, DebtComponent::Duplication]
        );
    }

    #[test]
    fn test_recommendations_put_security_first() {
        let report = TechnicalDebtIndex::default()
            .assess(&snapshot(&[
                ("quality_score", 2.0),
                ("avg_complexity", 5.0),
                ("test_coverage", 10.0),
                ("dependency_vulnerabilities", 8.0),
            ]))
            .unwrap();

        let order: Vec<_> = report.recommendations.iter().map(|r| r.component).collect();
        assert_eq!(
            order,
            vec![
                DebtComponent::Dependencies,
                DebtComponent::CodeQuality,
                DebtComponent::TestCoverage
            ]
        );
        assert_eq!(report.recommendations[0].issue, "Found 8 dependency vulnerabilities");
    }

    #[test]
    fn test_nothing_measured_has_no_report() {
        let s = snapshot(&[("total_lines", 1200.0)]);
        assert!(TechnicalDebtIndex::default().assess(&s).is_none());
        assert!(TechnicalDebtIndex::default()
            .assess_latest(&MetricsHistory::default())
            .is_none());
    }

    #[test]
    fn test_zero_weight_skips_component() {
        let mut config = DebtConfig::default();
        config.weights.dependencies = 0.0;
        let report = TechnicalDebtIndex::new(&config)
            .assess(&snapshot(&[
                ("quality_score", 10.0),
                ("dependency_vulnerabilities", 10.0),
            ]))
            .unwrap();

        assert_eq!(report.index, 0.0);
        assert_eq!(report.components.len(), 1);
        assert!(!report.unavailable.contains(&DebtComponent::Dependencies));
    }
}
