//! Degradation alerts between consecutive snapshots
//!
//! Each configured metric has a tolerance: the largest change in the "worse"
//! direction (per the metric's polarity) that passes silently. A metric with
//! a zero tolerance is critical: any worsening alerts at
//! [`Severity::Critical`].
//!
//! Metrics missing from either snapshot are never compared.

use crate::config::DegradationConfig;
use crate::metrics::MetricRegistry;
use crate::types::{MetricSnapshot, MetricsHistory};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
        }
    }
}

/// A metric that got worse by more than its tolerance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradationAlert {
    pub metric: String,
    pub severity: Severity,
    pub previous: f64,
    pub current: f64,
    /// `current - previous`
    pub change: f64,
    pub threshold: f64,
    pub message: String,
}

/// Compares snapshots against per-metric tolerances.
#[derive(Debug, Clone)]
pub struct DegradationDetector {
    thresholds: BTreeMap<String, f64>,
    registry: MetricRegistry,
}

impl DegradationDetector {
    pub fn new(config: &DegradationConfig, registry: MetricRegistry) -> Self {
        Self {
            thresholds: config
                .thresholds
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
            registry,
        }
    }

    /// Alerts for `current` relative to `previous`, critical first.
    pub fn detect(&self, previous: &MetricSnapshot, current: &MetricSnapshot) -> Vec<DegradationAlert> {
        let mut alerts: Vec<DegradationAlert> = self
            .thresholds
            .iter()
            .filter_map(|(metric, threshold)| {
                let prev = previous.get(metric)?;
                let curr = current.get(metric)?;
                self.check(metric, *threshold, prev, curr)
            })
            .collect();

        alerts.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.metric.cmp(&b.metric)));

        for alert in &alerts {
            tracing::warn!(
                metric = %alert.metric,
                severity = alert.severity.as_str(),
                previous = alert.previous,
                current = alert.current,
                "{}",
                alert.message
            );
        }
        alerts
    }

    /// Alerts between the two most recent snapshots of `history`.
    pub fn detect_latest(&self, history: &MetricsHistory) -> Vec<DegradationAlert> {
        match history.last_two() {
            Some((previous, current)) => self.detect(previous, current),
            None => Vec::new(),
        }
    }

    fn check(&self, metric: &str, threshold: f64, previous: f64, current: f64) -> Option<DegradationAlert> {
        let change = current - previous;
        let worsening = -change * self.registry.polarity(metric).sign();
        if worsening <= threshold {
            return None;
        }

        let severity = if threshold == 0.0 {
            Severity::Critical
        } else {
            Severity::Warning
        };
        let verb = if change > 0.0 { "rose" } else { "fell" };

        Some(DegradationAlert {
            metric: metric.to_string(),
            severity,
            previous,
            current,
            change: (change * 100.0).round() / 100.0,
            threshold,
            message: format!(
                "{metric} {verb} from {} to {} (tolerance {threshold})",
                fmt_value(previous),
                fmt_value(current)
            ),
        })
    }
}

fn fmt_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}
