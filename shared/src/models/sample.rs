//! Metric sample data model.
//!
//! A sample is one named value fetched from one host of a watched
//! installation during a single collection pass.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::TargetKey;

/// How a sampled value behaves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// A value that can go up or down (e.g. current connections).
    #[default]
    Gauge,
    /// A monotonically increasing value (e.g. queries executed).
    Counter,
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gauge => write!(f, "gauge"),
            Self::Counter => write!(f, "counter"),
        }
    }
}

/// A single value fetched from one host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Installation the host belongs to.
    pub target: TargetKey,
    /// Address of the host the value was read from.
    pub address: String,
    /// Metric name, including its query-set prefix (e.g. `metric_Query`).
    pub name: String,
    /// Kind of the metric.
    pub kind: SampleKind,
    /// Sampled value.
    pub value: f64,
}

impl MetricSample {
    /// Creates a new gauge sample.
    #[must_use]
    pub fn gauge(
        target: TargetKey,
        address: impl Into<String>,
        name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self {
            target,
            address: address.into(),
            name: name.into(),
            kind: SampleKind::Gauge,
            value,
        }
    }

    /// Sets the sample kind.
    #[must_use]
    pub fn with_kind(mut self, kind: SampleKind) -> Self {
        self.kind = kind;
        self
    }
}
