//! Core domain types for repopulse
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Snapshot** | One dated set of metric values from a single analysis run |
//! | **History** | All retained snapshots, ascending by date |
//! | **Missing** | A metric the run tried to produce but could not (stored as `null`) |
//! | **Retention window** | Maximum age of snapshots kept in the history |
//!
//! A missing metric is different from an absent one: absent means the run
//! never tracked it, missing means the producing tool failed or was skipped.
//! Neither is ever read as zero.

use crate::error::{Error, Result};
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Key holding the snapshot date in the persisted object.
pub const DATE_KEY: &str = "date";

/// Legacy key accepted on read when [`DATE_KEY`] is absent.
pub const TIMESTAMP_KEY: &str = "timestamp";

// ============================================
// Snapshot
// ============================================

/// One analysis run's metric values.
///
/// Persisted as a flat JSON object:
///
/// ```json
/// {"date": "2024-01-08", "quality_score": 7.0, "test_coverage": null}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct MetricSnapshot {
    date: NaiveDate,
    fields: BTreeMap<String, Option<f64>>,
}

impl MetricSnapshot {
    /// Create an empty snapshot for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fields: BTreeMap::new(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// All fields, including explicitly missing ones.
    pub fn fields(&self) -> &BTreeMap<String, Option<f64>> {
        &self.fields
    }

    /// Record a measured value.
    ///
    /// Non-finite values are recorded as missing.
    pub fn set(&mut self, name: impl Into<String>, value: f64) -> Result<()> {
        let name = validate_field_name(name.into())?;
        let value = value.is_finite().then_some(value);
        self.fields.insert(name, value);
        Ok(())
    }

    /// Record that a metric could not be produced in this run.
    pub fn set_missing(&mut self, name: impl Into<String>) -> Result<()> {
        let name = validate_field_name(name.into())?;
        self.fields.insert(name, None);
        Ok(())
    }

    /// Measured value, `None` when the metric is absent or missing.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied().flatten()
    }

    /// True when the metric is present with the missing marker.
    pub fn is_missing(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(None))
    }

    /// Names of metrics carrying a measured value.
    pub fn measured_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_some())
            .map(|(k, _)| k.as_str())
    }
}

fn validate_field_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidSnapshot("metric name is empty".to_string()));
    }
    if name == DATE_KEY || name == TIMESTAMP_KEY {
        return Err(Error::InvalidSnapshot(format!(
            "metric name {name:?} is reserved"
        )));
    }
    Ok(name)
}

/// `date` minus `days`, clamped to the earliest representable date.
pub fn days_before(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

/// Parse a day from `YYYY-MM-DD`, RFC 3339, or a naive ISO datetime.
pub fn parse_day(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

impl TryFrom<Map<String, Value>> for MetricSnapshot {
    type Error = Error;

    fn try_from(mut raw: Map<String, Value>) -> Result<Self> {
        let date_value = raw
            .remove(DATE_KEY)
            .or_else(|| raw.get(TIMESTAMP_KEY).cloned())
            .ok_or_else(|| Error::InvalidSnapshot("missing \"date\" field".to_string()))?;
        raw.remove(TIMESTAMP_KEY);

        let date = date_value
            .as_str()
            .and_then(parse_day)
            .ok_or_else(|| Error::InvalidSnapshot(format!("unparseable date {date_value}")))?;

        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            match value {
                Value::Null => {
                    fields.insert(name, None);
                }
                Value::Number(n) => {
                    fields.insert(name, n.as_f64().filter(|v| v.is_finite()));
                }
                // Nested breakdowns, labels and flags are not metrics.
                _ => {}
            }
        }

        Ok(Self { date, fields })
    }
}

impl Serialize for MetricSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(DATE_KEY, &self.date.format("%Y-%m-%d").to_string())?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

// ============================================
// History
// ============================================

/// Retained snapshots, ascending by date.
///
/// Snapshots sharing a date keep the order in which they were appended.
/// Every operation consumes the history and returns the updated one; retained
/// snapshots are never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricsHistory {
    snapshots: Vec<MetricSnapshot>,
}

impl<'de> Deserialize<'de> for MetricsHistory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let snapshots = Vec::<MetricSnapshot>::deserialize(deserializer)?;
        Ok(Self::from_snapshots(snapshots))
    }
}

impl MetricsHistory {
    /// Build a history, sorting by date (stable).
    pub fn from_snapshots(mut snapshots: Vec<MetricSnapshot>) -> Self {
        snapshots.sort_by_key(|s| s.date);
        Self { snapshots }
    }

    pub fn snapshots(&self) -> &[MetricSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&MetricSnapshot> {
        self.snapshots.last()
    }

    /// The two most recent snapshots as `(previous, latest)`.
    pub fn last_two(&self) -> Option<(&MetricSnapshot, &MetricSnapshot)> {
        match self.snapshots.as_slice() {
            [.., previous, latest] => Some((previous, latest)),
            _ => None,
        }
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.snapshots.first().map(|s| s.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.snapshots.last().map(|s| s.date)
    }

    /// Insert a snapshot, keeping ascending date order.
    ///
    /// Same-day snapshots are all kept; the new one goes after existing
    /// snapshots for that day.
    pub fn append(mut self, snapshot: MetricSnapshot) -> Self {
        let idx = self.snapshots.partition_point(|s| s.date <= snapshot.date);
        self.snapshots.insert(idx, snapshot);
        self
    }

    /// Replace every snapshot for the new snapshot's date with it.
    pub fn replace_day(mut self, snapshot: MetricSnapshot) -> Self {
        let date = snapshot.date;
        self.snapshots.retain(|s| s.date != date);
        self.append(snapshot)
    }

    /// Drop snapshots dated before `today - retention_days`.
    ///
    /// Snapshots dated exactly on the cutoff day are retained.
    pub fn prune(mut self, retention_days: u32, today: NaiveDate) -> Self {
        let cutoff = days_before(today, retention_days);
        self.snapshots.retain(|s| s.date >= cutoff);
        self
    }

    /// Snapshots dated within `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = &MetricSnapshot> {
        self.snapshots
            .iter()
            .filter(move |s| s.date >= start && s.date <= end)
    }

    /// Measured values of one metric in chronological order, skipping
    /// snapshots where it is absent or missing.
    pub fn series(&self, metric: &str) -> Vec<(NaiveDate, f64)> {
        self.snapshots
            .iter()
            .filter_map(|s| s.get(metric).map(|v| (s.date, v)))
            .collect()
    }

    /// Every metric name that has at least one measured value.
    pub fn metric_names(&self) -> BTreeSet<String> {
        self.snapshots
            .iter()
            .flat_map(|s| s.measured_names().map(str::to_string))
            .collect()
    }
}
