//! The exposable metric set.
//!
//! Collection passes write here, the exposition layer reads here. Entries
//! are keyed by target and address so each host's samples are replaced as a
//! unit: a host that failed in the last pass has no samples at all.

use crate::models::{MetricSample, TargetKey};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A host of a watched target.
pub type HostKey = (TargetKey, String);

#[derive(Debug, Default)]
struct Inner {
    samples: BTreeMap<HostKey, Vec<MetricSample>>,
    failures: BTreeMap<HostKey, u64>,
    last_pass: Option<DateTime<Utc>>,
}

/// Point-in-time copy of the exposable metric set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposedSnapshot {
    /// Samples grouped by metric name, ordered by target and address.
    pub metrics: BTreeMap<String, Vec<MetricSample>>,
    /// Failed collection attempts per host since it started being watched.
    pub failures: BTreeMap<HostKey, u64>,
    /// When the last completed pass started.
    pub last_pass: Option<DateTime<Utc>>,
}

/// Metric samples and failure counters of the current watched set.
#[derive(Debug, Default)]
pub struct ExposedMetrics {
    inner: RwLock<Inner>,
}

impl ExposedMetrics {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the samples of a host.
    pub fn record_success(&self, target: &TargetKey, address: &str, samples: Vec<MetricSample>) {
        self.write()
            .samples
            .insert((target.clone(), address.to_string()), samples);
    }

    /// Drops the samples of a host and counts one failure for it.
    pub fn record_failure(&self, target: &TargetKey, address: &str) {
        let key = (target.clone(), address.to_string());
        let mut inner = self.write();
        inner.samples.remove(&key);
        *inner.failures.entry(key).or_insert(0) += 1;
    }

    /// Forgets every host not in `live`.
    pub fn retain(&self, live: &HashSet<HostKey>) {
        let mut inner = self.write();
        inner.samples.retain(|key, _| live.contains(key));
        inner.failures.retain(|key, _| live.contains(key));
    }

    /// Records the start time of a completed pass.
    pub fn finish_pass(&self, started_at: DateTime<Utc>) {
        let mut inner = self.write();
        if inner.last_pass.map_or(true, |last| last < started_at) {
            inner.last_pass = Some(started_at);
        }
    }

    /// Returns the samples currently exposed for a host.
    #[must_use]
    pub fn samples_for(&self, target: &TargetKey, address: &str) -> Vec<MetricSample> {
        self.read()
            .samples
            .get(&(target.clone(), address.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the failure count of a host.
    #[must_use]
    pub fn failure_count(&self, target: &TargetKey, address: &str) -> u64 {
        self.read()
            .failures
            .get(&(target.clone(), address.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Copies the set, grouping samples by metric name.
    #[must_use]
    pub fn snapshot(&self) -> ExposedSnapshot {
        let inner = self.read();
        let mut metrics: BTreeMap<String, Vec<MetricSample>> = BTreeMap::new();

        for sample in inner.samples.values().flatten() {
            metrics
                .entry(sample.name.clone())
                .or_default()
                .push(sample.clone());
        }

        ExposedSnapshot {
            metrics,
            failures: inner.failures.clone(),
            last_pass: inner.last_pass,
        }
    }
}
