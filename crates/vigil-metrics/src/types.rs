//! Core value types shared by the query backend and the rule engine.
//!
//! - [`Label`]: an immutable name/value pair
//! - [`Metric`]: one sample returned by a query backend
//! - [`TimeSeries`]: one output series in the shape the write path expects
//! - [`Sample`]: a single (value, timestamp) pair of a [`TimeSeries`]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The reserved label holding a series' metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A single name/value label pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    /// The label name.
    pub name: String,
    /// The label value.
    pub value: String,
}

impl Label {
    /// Creates a new label.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.name, self.value)
    }
}

/// A sample returned by a query backend.
///
/// `timestamp` is a Unix timestamp in seconds, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// The label set identifying the sample.
    pub labels: Vec<Label>,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    /// The sample value.
    pub value: f64,
}

impl Metric {
    /// Creates a metric without labels.
    #[must_use]
    pub const fn new(value: f64, timestamp: i64) -> Self {
        Self {
            labels: Vec::new(),
            timestamp,
            value,
        }
    }

    /// Adds a label and returns self for chaining.
    #[must_use]
    pub fn label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push(Label::new(name, value));
        self
    }

    /// Returns the value of the first label with the given name.
    #[must_use]
    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{label}")?;
        }
        write!(f, "}} {} @{}", self.value, self.timestamp)
    }
}

/// A single value at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// The sample value.
    pub value: f64,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

/// An output series: a label set plus its samples.
///
/// Built once per evaluation and not mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Labels sorted by name.
    pub labels: Vec<Label>,
    /// The series samples.
    pub samples: Vec<Sample>,
}

impl TimeSeries {
    /// Builds a single-sample series from a label map.
    ///
    /// Labels come out sorted by name because the map is ordered.
    #[must_use]
    pub fn new(labels: BTreeMap<String, String>, value: f64, timestamp_millis: i64) -> Self {
        Self {
            labels: labels
                .into_iter()
                .map(|(name, value)| Label { name, value })
                .collect(),
            samples: vec![Sample {
                value,
                timestamp: timestamp_millis,
            }],
        }
    }

    /// Returns the value of the label with the given name.
    #[must_use]
    pub fn label_value(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.value.as_str())
    }

    /// Returns the metric name carried in [`METRIC_NAME_LABEL`].
    #[must_use]
    pub fn metric_name(&self) -> Option<&str> {
        self.label_value(METRIC_NAME_LABEL)
    }
}
