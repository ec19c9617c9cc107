//! Trend computation over a metrics history.
//!
//! For one metric, the trend is derived from the measured values inside a
//! trailing window of days:
//!
//! - `delta`: newest value minus oldest value
//! - `slope`: ordinary least squares fit of value against elapsed days
//! - `direction`: `stable` while `|slope|` stays under the metric's epsilon,
//!   otherwise `improving` or `declining` according to the metric's polarity
//!
//! The window ends at the newest snapshot in the history unless an explicit
//! anchor is given, so an old history still yields its trends.

use crate::config::TrendConfig;
use crate::error::{Error, Result};
use crate::metrics::{MetricRegistry, Polarity};
use crate::types::{days_before, MetricsHistory};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Qualitative movement of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Improving,
    Declining,
    Stable,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Improving => "improving",
            Direction::Declining => "declining",
            Direction::Stable => "stable",
        }
    }

    /// Direction implied by a slope, a stability threshold and polarity.
    pub fn classify(slope: f64, epsilon: f64, polarity: Polarity) -> Self {
        if slope.abs() < epsilon {
            Direction::Stable
        } else if slope * polarity.sign() > 0.0 {
            Direction::Improving
        } else {
            Direction::Declining
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trend of one metric over one window. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub metric_name: String,
    pub direction: Direction,
    /// Newest minus oldest value in the window
    pub delta: f64,
    /// Change per day
    pub slope: f64,
    pub first_value: f64,
    pub last_value: f64,
    /// Measured points that contributed
    pub points: usize,
    /// Date of the oldest contributing point
    pub first_date: NaiveDate,
    /// Date of the newest contributing point
    pub last_date: NaiveDate,
    /// Stability threshold applied to `slope`
    pub epsilon: f64,
    pub polarity: Polarity,
}

/// Derives [`TrendResult`]s from a history.
#[derive(Debug, Clone)]
pub struct TrendComputer {
    registry: MetricRegistry,
    window_days: u32,
    epsilon_fraction: f64,
    epsilon_overrides: HashMap<String, f64>,
}

impl Default for TrendComputer {
    fn default() -> Self {
        Self::new(&TrendConfig::default())
    }
}

impl TrendComputer {
    pub fn new(config: &TrendConfig) -> Self {
        Self {
            registry: MetricRegistry::new(config.polarity.clone()),
            window_days: config.window_days,
            epsilon_fraction: config.epsilon_fraction,
            epsilon_overrides: config.epsilon.clone(),
        }
    }

    /// Configured default window.
    pub fn window_days(&self) -> u32 {
        self.window_days
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Trend of `metric` over the `window_days` ending at the newest snapshot.
    pub fn compute(
        &self,
        history: &MetricsHistory,
        metric: &str,
        window_days: u32,
    ) -> Result<TrendResult> {
        match history.last_date() {
            Some(anchor) => self.compute_as_of(history, metric, window_days, anchor),
            None => Err(Error::NoData {
                metric: metric.to_string(),
                points: 0,
                days: 0,
            }),
        }
    }

    /// Trend of `metric` over `[anchor - window_days, anchor]`.
    pub fn compute_as_of(
        &self,
        history: &MetricsHistory,
        metric: &str,
        window_days: u32,
        anchor: NaiveDate,
    ) -> Result<TrendResult> {
        let start = days_before(anchor, window_days);
        let points: Vec<(NaiveDate, f64)> = history
            .between(start, anchor)
            .filter_map(|s| s.get(metric).map(|v| (s.date(), v)))
            .collect();

        let days = points
            .iter()
            .map(|(d, _)| *d)
            .collect::<BTreeSet<_>>()
            .len();

        let no_data = || Error::NoData {
            metric: metric.to_string(),
            points: points.len(),
            days,
        };

        if points.len() < 2 || days < 2 {
            return Err(no_data());
        }

        let slope = ols_slope(&points).ok_or_else(no_data)?;
        let (first_date, first_value) = points[0];
        let (last_date, last_value) = points[points.len() - 1];

        let epsilon = self.epsilon_for(metric, &points);
        let polarity = self.registry.polarity(metric);
        let direction = Direction::classify(slope, epsilon, polarity);

        tracing::debug!(
            metric,
            points = points.len(),
            slope,
            epsilon,
            direction = direction.as_str(),
            "Computed trend"
        );

        Ok(TrendResult {
            metric_name: metric.to_string(),
            direction,
            delta: last_value - first_value,
            slope,
            first_value,
            last_value,
            points: points.len(),
            first_date,
            last_date,
            epsilon,
            polarity,
        })
    }

    /// Trends for every metric measured inside the window.
    ///
    /// Metrics with too little data map to their [`Error::NoData`].
    pub fn compute_all(
        &self,
        history: &MetricsHistory,
        window_days: u32,
    ) -> BTreeMap<String, Result<TrendResult>> {
        let Some(anchor) = history.last_date() else {
            return BTreeMap::new();
        };
        let start = days_before(anchor, window_days);

        let names: BTreeSet<String> = history
            .between(start, anchor)
            .flat_map(|s| s.measured_names().map(str::to_string))
            .collect();

        names
            .into_iter()
            .map(|name| {
                let result = self.compute_as_of(history, &name, window_days, anchor);
                (name, result)
            })
            .collect()
    }

    fn epsilon_for(&self, metric: &str, points: &[(NaiveDate, f64)]) -> f64 {
        if let Some(eps) = self.epsilon_overrides.get(metric) {
            return *eps;
        }
        let mean_magnitude =
            points.iter().map(|(_, v)| v.abs()).sum::<f64>() / points.len() as f64;
        (self.epsilon_fraction * mean_magnitude).max(f64::EPSILON)
    }
}

/// Least squares slope of value against days since the first point.
///
/// `None` when every point falls on the same day.
fn ols_slope(points: &[(NaiveDate, f64)]) -> Option<f64> {
    let origin = points.first()?.0;
    let xs: Vec<f64> = points
        .iter()
        .map(|(d, _)| (*d - origin).num_days() as f64)
        .collect();
    let n = points.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, v)| v).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, (_, y)) in xs.iter().zip(points) {
        sxy += (x - mean_x) * (y - mean_y);
        sxx += (x - mean_x) * (x - mean_x);
    }

    if sxx == 0.0 {
        return None;
    }
    Some(sxy / sxx)
}
