//! Metrics registry for discovery, documentation and polarity lookups.
//!
//! The history store is agnostic to metric semantics. The only semantic it
//! needs downstream is polarity: whether a rising value is good news. Trends
//! and degradation alerts both resolve polarity through [`MetricRegistry`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix for per-language line counts (e.g. `lines.Python`).
pub const LANGUAGE_LINES_PREFIX: &str = "lines.";

/// Whether higher or lower values of a metric count as improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

impl Polarity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::HigherIsBetter => "higher_is_better",
            Polarity::LowerIsBetter => "lower_is_better",
        }
    }

    /// +1.0 when rising is good, -1.0 when falling is good.
    pub fn sign(&self) -> f64 {
        match self {
            Polarity::HigherIsBetter => 1.0,
            Polarity::LowerIsBetter => -1.0,
        }
    }
}

/// Descriptor for a metric recorded in snapshots.
#[derive(Debug, Clone)]
pub struct MetricDescriptor {
    pub name: &'static str,
    /// Tool (or `derived`) that produces the metric
    pub source: &'static str,
    pub polarity: Polarity,
    pub unit: &'static str,
    pub summary: &'static str,
}

const ALL_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor {
        name: "quality_score",
        source: "pylint",
        polarity: Polarity::HigherIsBetter,
        unit: "score/10",
        summary: "Pylint global evaluation score.",
    },
    MetricDescriptor {
        name: "pylint_messages",
        source: "pylint",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Number of pylint messages emitted.",
    },
    MetricDescriptor {
        name: "flake8_issues",
        source: "flake8",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Number of flake8 violations.",
    },
    MetricDescriptor {
        name: "lint_score",
        source: "derived",
        polarity: Polarity::HigherIsBetter,
        unit: "score/10",
        summary: "Weighted blend: 70% pylint score, 30% flake8 penalty.",
    },
    MetricDescriptor {
        name: "avg_complexity",
        source: "radon_cc",
        polarity: Polarity::LowerIsBetter,
        unit: "cyclomatic",
        summary: "Mean cyclomatic complexity across analysed blocks.",
    },
    MetricDescriptor {
        name: "high_complexity_blocks",
        source: "radon_cc",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Blocks with cyclomatic complexity above 10.",
    },
    MetricDescriptor {
        name: "avg_maintainability",
        source: "radon_mi",
        polarity: Polarity::HigherIsBetter,
        unit: "index",
        summary: "Mean maintainability index across files.",
    },
    MetricDescriptor {
        name: "low_maintainability_files",
        source: "radon_mi",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Files ranked C or worse by radon mi.",
    },
    MetricDescriptor {
        name: "security_issues",
        source: "bandit",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Code security findings reported by bandit.",
    },
    MetricDescriptor {
        name: "high_severity_issues",
        source: "bandit",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Bandit findings with HIGH severity.",
    },
    MetricDescriptor {
        name: "pip_audit_vulnerabilities",
        source: "pip_audit",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Known vulnerabilities reported by pip-audit.",
    },
    MetricDescriptor {
        name: "safety_vulnerabilities",
        source: "safety",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Known vulnerabilities reported by safety.",
    },
    MetricDescriptor {
        name: "dependency_vulnerabilities",
        source: "derived",
        polarity: Polarity::LowerIsBetter,
        unit: "count",
        summary: "Larger of the pip-audit and safety vulnerability counts.",
    },
    MetricDescriptor {
        name: "test_coverage",
        source: "coverage",
        polarity: Polarity::HigherIsBetter,
        unit: "percent",
        summary: "Statement coverage reported by pytest-cov.",
    },
    MetricDescriptor {
        name: "covered_lines",
        source: "coverage",
        polarity: Polarity::HigherIsBetter,
        unit: "lines",
        summary: "Statements executed by the test suite.",
    },
    MetricDescriptor {
        name: "total_statements",
        source: "coverage",
        polarity: Polarity::HigherIsBetter,
        unit: "statements",
        summary: "Statements measured by coverage.",
    },
    MetricDescriptor {
        name: "total_lines",
        source: "cloc",
        polarity: Polarity::HigherIsBetter,
        unit: "lines",
        summary: "Code, comment and blank lines combined.",
    },
    MetricDescriptor {
        name: "code_lines",
        source: "cloc",
        polarity: Polarity::HigherIsBetter,
        unit: "lines",
        summary: "Lines of code excluding comments and blanks.",
    },
    MetricDescriptor {
        name: "comment_lines",
        source: "cloc",
        polarity: Polarity::HigherIsBetter,
        unit: "lines",
        summary: "Comment lines.",
    },
    MetricDescriptor {
        name: "blank_lines",
        source: "cloc",
        polarity: Polarity::HigherIsBetter,
        unit: "lines",
        summary: "Blank lines.",
    },
    MetricDescriptor {
        name: "file_count",
        source: "cloc",
        polarity: Polarity::HigherIsBetter,
        unit: "files",
        summary: "Source files counted by cloc.",
    },
    MetricDescriptor {
        name: "code_duplication_percent",
        source: "duplication",
        polarity: Polarity::LowerIsBetter,
        unit: "percent",
        summary: "Share of source lines repeated within their own file.",
    },
    MetricDescriptor {
        name: "duplicated_lines",
        source: "duplication",
        polarity: Polarity::LowerIsBetter,
        unit: "lines",
        summary: "Normalized source lines that occur more than once in a file.",
    },
];

const LANGUAGE_LINES: MetricDescriptor = MetricDescriptor {
    name: "lines.<language>",
    source: "cloc",
    polarity: Polarity::HigherIsBetter,
    unit: "lines",
    summary: "Lines of code for one language.",
};

/// List all registered metrics.
pub fn list_metrics() -> Vec<MetricDescriptor> {
    let mut all = ALL_METRICS.to_vec();
    all.push(LANGUAGE_LINES);
    all
}

/// Look up the descriptor for a metric name.
pub fn describe(name: &str) -> Option<MetricDescriptor> {
    if name.starts_with(LANGUAGE_LINES_PREFIX) {
        return Some(LANGUAGE_LINES);
    }
    ALL_METRICS.iter().find(|m| m.name == name).cloned()
}

/// Polarity lookups with configured overrides layered over the built-ins.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    overrides: HashMap<String, Polarity>,
}

impl MetricRegistry {
    pub fn new(overrides: HashMap<String, Polarity>) -> Self {
        Self { overrides }
    }

    /// Resolve polarity for `name`.
    ///
    /// Unknown metrics default to [`Polarity::HigherIsBetter`].
    pub fn polarity(&self, name: &str) -> Polarity {
        if let Some(p) = self.overrides.get(name) {
            return *p;
        }
        match describe(name) {
            Some(d) => d.polarity,
            None => {
                tracing::debug!(metric = name, "Unregistered metric; assuming higher is better");
                Polarity::HigherIsBetter
            }
        }
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.overrides.contains_key(name) || describe(name).is_some()
    }
}
