//! Watched-target registry.
//!
//! Holds the set of installations the exporter collects from. The control
//! surface is the only writer; collection passes read it through
//! [`WatchedTargetRegistry::snapshot`] and do all network work on the copy.

use crate::models::{Target, TargetKey};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Concurrency-safe mapping from target identity to target.
///
/// Every operation holds the lock for exactly one read or write, so a
/// snapshot never observes a partially replaced address list. Concurrent
/// snapshots share the read lock. A poisoned lock is recovered rather than
/// reported: none of these operations can leave the map half-written.
#[derive(Debug, Default)]
pub struct WatchedTargetRegistry {
    targets: RwLock<BTreeMap<TargetKey, Vec<String>>>,
}

impl WatchedTargetRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<TargetKey, Vec<String>>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<TargetKey, Vec<String>>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or fully replaces the target stored under its key.
    ///
    /// A target without addresses is not watched, so upserting one removes
    /// the key instead.
    pub fn upsert(&self, target: Target) {
        let Target { key, addresses } = target;

        if addresses.is_empty() {
            self.remove(&key);
            return;
        }

        let count = addresses.len();
        let previous = self.write().insert(key.clone(), addresses);

        tracing::info!(
            target_key = %key,
            addresses = count,
            replaced = previous.is_some(),
            "Watched target upserted"
        );
    }

    /// Removes the target stored under `key`. Missing keys are ignored.
    pub fn remove(&self, key: &TargetKey) {
        if self.write().remove(key).is_some() {
            tracing::info!(target_key = %key, "Watched target removed");
        } else {
            tracing::debug!(target_key = %key, "Remove of unwatched target ignored");
        }
    }

    /// Returns a copy of every watched target, ordered by key.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Target> {
        self.read()
            .iter()
            .map(|(key, addresses)| Target {
                key: key.clone(),
                addresses: addresses.clone(),
            })
            .collect()
    }

    /// Returns the target stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &TargetKey) -> Option<Target> {
        self.read().get(key).map(|addresses| Target {
            key: key.clone(),
            addresses: addresses.clone(),
        })
    }

    /// Returns the number of watched targets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no target is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
