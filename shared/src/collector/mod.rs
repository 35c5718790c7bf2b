//! Collection passes over the watched targets.
//!
//! A pass snapshots the registry, then scrapes every host of every target
//! concurrently through its own [`Session`]. Hosts fail independently: a
//! failure drops that host's samples and bumps its failure counter, and the
//! rest of the pass carries on. No registry lock is held during network I/O.

pub mod exposed;
pub mod pool;
pub mod queries;

pub use exposed::{ExposedMetrics, ExposedSnapshot, HostKey};
pub use pool::SessionPool;
pub use queries::{MetricQuery, QuerySet};

use crate::config::ConnectionDefaults;
use crate::connection::{Connector, Session, SessionError};
use crate::models::{MetricSample, TargetKey};
use crate::registry::WatchedTargetRegistry;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

/// Errors that end a collection pass.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// A host task panicked or was cancelled; the pass is abandoned.
    #[error("collection pass aborted: {0}")]
    Fatal(String),
}

/// Summary of a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// How long the pass took.
    pub duration: Duration,
    /// Number of targets in the snapshot.
    pub targets: usize,
    /// Hosts scraped successfully.
    pub succeeded: usize,
    /// Hosts that failed.
    pub failed: usize,
    /// Hosts skipped because an overlapping pass was using their session.
    pub busy: usize,
}

/// Drives sessions over the registry and fills the exposed metric set.
#[derive(Debug)]
pub struct Collector {
    registry: Arc<WatchedTargetRegistry>,
    pool: SessionPool,
    queries: Arc<QuerySet>,
    exposed: Arc<ExposedMetrics>,
}

impl Collector {
    /// Creates a collector.
    #[must_use]
    pub fn new(
        registry: Arc<WatchedTargetRegistry>,
        connector: Arc<dyn Connector>,
        defaults: ConnectionDefaults,
        queries: QuerySet,
    ) -> Self {
        Self {
            registry,
            pool: SessionPool::new(connector, defaults),
            queries: Arc::new(queries),
            exposed: Arc::new(ExposedMetrics::new()),
        }
    }

    /// Returns the exposed metric set this collector writes to.
    #[must_use]
    pub fn exposed(&self) -> &Arc<ExposedMetrics> {
        &self.exposed
    }

    /// Returns the registry this collector reads from.
    #[must_use]
    pub fn registry(&self) -> &Arc<WatchedTargetRegistry> {
        &self.registry
    }

    /// Returns the session pool.
    #[must_use]
    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    /// Runs one collection pass.
    ///
    /// # Errors
    ///
    /// Returns [`CollectorError::Fatal`] if a host task panicked. The
    /// remaining host tasks are cancelled; the registry is untouched.
    pub async fn collect_once(&self) -> Result<PassReport, CollectorError> {
        let started_at = Utc::now();
        let clock = Instant::now();
        let snapshot = self.registry.snapshot();

        let mut tasks = JoinSet::new();
        let mut scheduled: HashSet<HostKey> = HashSet::new();

        for target in &snapshot {
            for address in &target.addresses {
                if !scheduled.insert((target.key.clone(), address.clone())) {
                    continue;
                }

                let session = self.pool.session(&target.key, address);
                let queries = Arc::clone(&self.queries);
                let key = target.key.clone();
                let address = address.clone();

                tasks.spawn(async move {
                    let outcome = scrape_host(&session, &key, &queries).await;
                    (key, address, outcome)
                });
            }
        }

        let mut report = PassReport {
            started_at,
            duration: Duration::ZERO,
            targets: snapshot.len(),
            succeeded: 0,
            failed: 0,
            busy: 0,
        };

        while let Some(joined) = tasks.join_next().await {
            let (key, address, outcome) = joined.map_err(|e| {
                tracing::error!(error = %e, "Host task failed, aborting collection pass");
                CollectorError::Fatal(e.to_string())
            })?;

            match outcome {
                Ok(samples) => {
                    report.succeeded += 1;
                    self.exposed.record_success(&key, &address, samples);
                }
                Err(SessionError::Busy { .. }) => {
                    report.busy += 1;
                    tracing::debug!(target_key = %key, address, "Host busy, skipped");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        target_key = %key,
                        address,
                        kind = e.kind(),
                        error = %e,
                        "Failed to collect host metrics"
                    );
                    self.exposed.record_failure(&key, &address);
                }
            }
        }

        // Targets removed while the pass was in flight are dropped here.
        let live: HashSet<HostKey> = self
            .registry
            .snapshot()
            .into_iter()
            .flat_map(|t| {
                let key = t.key;
                t.addresses.into_iter().map(move |a| (key.clone(), a))
            })
            .collect();
        self.pool.retain(&live);
        self.exposed.retain(&live);
        self.exposed.finish_pass(started_at);

        report.duration = clock.elapsed();
        tracing::debug!(
            targets = report.targets,
            succeeded = report.succeeded,
            failed = report.failed,
            busy = report.busy,
            duration_ms = u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX),
            "Collection pass complete"
        );
        Ok(report)
    }
}

/// Runs the whole query set on one host. The first failing query ends the
/// host's scrape; the session has already dropped its connection by then.
async fn scrape_host(
    session: &Session,
    target: &TargetKey,
    queries: &QuerySet,
) -> Result<Vec<MetricSample>, SessionError> {
    let mut guard = session.try_lock()?;
    let mut samples = Vec::new();

    for query in queries.iter() {
        let rows = guard.run_query(&query.sql).await?;
        tracing::trace!(
            address = guard.address(),
            query = %query.name,
            rows = rows.len(),
            "Query complete"
        );
        samples.extend(rows.into_iter().map(|row| {
            MetricSample::gauge(
                target.clone(),
                guard.address(),
                query.sample_name(&row.metric),
                row.value,
            )
            .with_kind(query.kind)
        }));
    }

    Ok(samples)
}
