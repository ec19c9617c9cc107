//! Trend report rendering (plain text, markdown, JSON)

use crate::debt::DebtReport;
use crate::degradation::DegradationAlert;
use crate::error::{Error, Result};
use crate::trend::{Direction, TrendComputer, TrendResult};
use crate::types::MetricsHistory;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write as _;

/// One metric's row in a report.
#[derive(Debug, Clone, Serialize)]
pub struct TrendEntry {
    pub metric: String,
    /// Present when the trend could be computed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendResult>,
    /// Why the trend is unavailable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
}

/// Trends for a set of metrics over one window.
#[derive(Debug, Clone, Serialize)]
pub struct TrendReport {
    pub window_days: u32,
    /// Newest snapshot date; the window ends here
    pub as_of: Option<NaiveDate>,
    pub snapshots: usize,
    pub entries: Vec<TrendEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alerts: Vec<DegradationAlert>,
    /// Debt assessment of the newest snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt: Option<DebtReport>,
}

impl TrendReport {
    /// Compute trends for `metrics`, or for every metric in the window when
    /// `metrics` is empty.
    pub fn build(
        history: &MetricsHistory,
        computer: &TrendComputer,
        metrics: &[String],
        window_days: u32,
    ) -> Self {
        let results: Vec<(String, Result<TrendResult>)> = if metrics.is_empty() {
            computer.compute_all(history, window_days).into_iter().collect()
        } else {
            metrics
                .iter()
                .map(|m| (m.clone(), computer.compute(history, m, window_days)))
                .collect()
        };

        let entries = results
            .into_iter()
            .map(|(metric, result)| match result {
                Ok(trend) => TrendEntry {
                    metric,
                    trend: Some(trend),
                    unavailable: None,
                },
                Err(e) => TrendEntry {
                    metric,
                    trend: None,
                    unavailable: Some(unavailable_reason(&e)),
                },
            })
            .collect();

        Self {
            window_days,
            as_of: history.last_date(),
            snapshots: history.len(),
            entries,
            alerts: Vec::new(),
            debt: None,
        }
    }

    pub fn with_alerts(mut self, alerts: Vec<DegradationAlert>) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn with_debt(mut self, debt: Option<DebtReport>) -> Self {
        self.debt = debt;
        self
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Markdown summary suitable for a job summary or README section.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Metric Trends\n");
        match self.as_of {
            Some(date) => {
                let _ = writeln!(
                    out,
                    "_{} snapshot(s); {}-day window ending {}_\n",
                    self.snapshots, self.window_days, date
                );
            }
            None => {
                let _ = writeln!(out, "_No history recorded yet._");
                return out;
            }
        }

        let _ = writeln!(out, "| Metric | Direction | Change | Per day | Points |");
        let _ = writeln!(out, "|--------|-----------|--------|---------|--------|");
        for entry in &self.entries {
            match (&entry.trend, &entry.unavailable) {
                (Some(t), _) => {
                    let _ = writeln!(
                        out,
                        "| {} | {} {} | {} -> {} ({}) | {:+.4} | {} |",
                        t.metric_name,
                        direction_marker(t),
                        t.direction,
                        fmt_num(t.first_value),
                        fmt_num(t.last_value),
                        fmt_signed(t.delta),
                        t.slope,
                        t.points
                    );
                }
                (None, reason) => {
                    let _ = writeln!(
                        out,
                        "| {} | n/a | {} | | |",
                        entry.metric,
                        reason.as_deref().unwrap_or("unavailable")
                    );
                }
            }
        }

        if !self.alerts.is_empty() {
            let _ = writeln!(out, "\n### Degradation Alerts\n");
            for alert in &self.alerts {
                let _ = writeln!(out, "- **{}**: {}", alert.severity.as_str(), alert.message);
            }
        }

        if let Some(debt) = &self.debt {
            let _ = writeln!(out, "\n### Technical Debt\n");
            let _ = writeln!(
                out,
                "**Index:** {}/100 ({})\n",
                fmt_num(debt.index),
                debt.severity.as_str()
            );
            let _ = writeln!(out, "| Component | Metric | Value | Debt | Weight |");
            let _ = writeln!(out, "|-----------|--------|-------|------|--------|");
            for c in &debt.components {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | {} | {:.2} |",
                    c.component,
                    c.metric,
                    fmt_num(c.value),
                    fmt_num(c.score),
                    c.weight
                );
            }
            if !debt.unavailable.is_empty() {
                let names: Vec<&str> = debt.unavailable.iter().map(|c| c.as_str()).collect();
                let _ = writeln!(out, "\n_Not measured: {}_", names.join(", "));
            }
            if !debt.recommendations.is_empty() {
                let _ = writeln!(out);
                for r in &debt.recommendations {
                    let _ = writeln!(
                        out,
                        "- **{}** {}: {}. {}",
                        r.priority.as_str(),
                        r.area,
                        r.issue,
                        r.action
                    );
                }
            }
        }
        out
    }

    /// Aligned plain-text rendering for terminals and CI logs.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let Some(date) = self.as_of else {
            return "No history recorded yet.\n".to_string();
        };
        let _ = writeln!(
            out,
            "Trends over {} days ending {} ({} snapshots)",
            self.window_days, date, self.snapshots
        );
        let width = self
            .entries
            .iter()
            .map(|e| e.metric.len())
            .max()
            .unwrap_or(0);
        for entry in &self.entries {
            match &entry.trend {
                Some(t) => {
                    let _ = writeln!(
                        out,
                        "  {:<width$}  {:<9}  delta {:>10}  slope {:+.4}/day  ({} points)",
                        entry.metric,
                        t.direction.as_str(),
                        fmt_signed(t.delta),
                        t.slope,
                        t.points
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "  {:<width$}  unavailable: {}",
                        entry.metric,
                        entry.unavailable.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
        for alert in &self.alerts {
            let _ = writeln!(out, "{}: {}", alert.severity.as_str().to_uppercase(), alert.message);
        }
        if let Some(debt) = &self.debt {
            let _ = writeln!(
                out,
                "Technical debt: {}/100 ({})",
                fmt_num(debt.index),
                debt.severity.as_str()
            );
            for r in &debt.recommendations {
                let _ = writeln!(out, "  [{}] {}: {}", r.priority.as_str(), r.area, r.action);
            }
        }
        out
    }
}

fn unavailable_reason(e: &Error) -> String {
    match e {
        Error::NoData { points, days, .. } => {
            format!("insufficient data ({points} point(s) over {days} day(s))")
        }
        other => other.to_string(),
    }
}

fn direction_marker(t: &TrendResult) -> &'static str {
    match t.direction {
        Direction::Improving => "+",
        Direction::Declining => "-",
        Direction::Stable => "=",
    }
}

fn fmt_num(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.2}")
    }
}

fn fmt_signed(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:+.0}")
    } else {
        format!("{v:+.2}")
    }
}
