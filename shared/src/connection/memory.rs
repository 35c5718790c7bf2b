//! In-memory backend simulating hosts.
//!
//! Useful for development and testing: each address is mapped to an
//! [`InMemoryHost`] describing how it behaves, and the behaviour can be
//! swapped at any time to simulate outages and recoveries. Connections look
//! the behaviour up on every call, so a change also affects connections that
//! are already open.

use super::{BackendError, Connection, ConnectionParams, Connector, MetricRow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

/// Behaviour of a simulated host.
#[derive(Debug, Clone, Default)]
pub struct InMemoryHost {
    reachable: bool,
    ping_fails: bool,
    ping_hangs: bool,
    queries_fail: bool,
    query_delay: Option<Duration>,
    rows: Vec<MetricRow>,
}

impl InMemoryHost {
    /// A host that accepts connections and answers every query with `rows`.
    #[must_use]
    pub fn healthy(rows: Vec<MetricRow>) -> Self {
        Self {
            reachable: true,
            rows,
            ..Self::default()
        }
    }

    /// A host that refuses connections.
    #[must_use]
    pub fn unreachable() -> Self {
        Self::default()
    }

    /// Makes the liveness probe fail.
    #[must_use]
    pub fn with_failing_ping(mut self) -> Self {
        self.ping_fails = true;
        self
    }

    /// Makes the liveness probe never answer.
    #[must_use]
    pub fn with_hanging_ping(mut self) -> Self {
        self.ping_hangs = true;
        self
    }

    /// Makes every query and command fail.
    #[must_use]
    pub fn with_failing_queries(mut self) -> Self {
        self.queries_fail = true;
        self
    }

    /// Delays every query and command by `delay`.
    #[must_use]
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }
}

#[derive(Debug, Default)]
struct Counters {
    opens: usize,
    pings: usize,
    queries: usize,
}

#[derive(Debug, Default)]
struct Hosts {
    behaviour: HashMap<String, InMemoryHost>,
    counters: HashMap<String, Counters>,
}

/// Connector backed by simulated hosts. Clones share the same hosts.
///
/// Addresses that were never configured behave as unreachable.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConnector {
    hosts: Arc<RwLock<Hosts>>,
}

impl InMemoryConnector {
    /// Creates a connector with no hosts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the behaviour of `address`.
    pub fn set_host(&self, address: impl Into<String>, host: InMemoryHost) {
        self.write_hosts()
            .behaviour
            .insert(address.into(), host);
    }

    /// Number of connections opened to `address`.
    #[must_use]
    pub fn open_count(&self, address: &str) -> usize {
        self.read_counter(address, |c| c.opens)
    }

    /// Number of liveness probes sent to `address`.
    #[must_use]
    pub fn ping_count(&self, address: &str) -> usize {
        self.read_counter(address, |c| c.pings)
    }

    /// Number of queries and commands sent to `address`.
    #[must_use]
    pub fn query_count(&self, address: &str) -> usize {
        self.read_counter(address, |c| c.queries)
    }

    fn read_counter(&self, address: &str, f: impl Fn(&Counters) -> usize) -> usize {
        self.hosts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .counters
            .get(address)
            .map_or(0, f)
    }

    fn write_hosts(&self) -> std::sync::RwLockWriteGuard<'_, Hosts> {
        self.hosts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a call and returns the host's current behaviour.
    fn record(&self, address: &str, f: impl Fn(&mut Counters)) -> InMemoryHost {
        let mut hosts = self.write_hosts();
        f(hosts.counters.entry(address.to_string()).or_default());
        hosts.behaviour.get(address).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    async fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, BackendError> {
        let host = self.record(&params.address, |c| c.opens += 1);
        if !host.reachable {
            return Err(BackendError::new(format!(
                "connection refused: {}",
                params.address
            )));
        }

        Ok(Box::new(InMemoryConnection {
            connector: self.clone(),
            address: params.address.clone(),
        }))
    }
}

struct InMemoryConnection {
    connector: InMemoryConnector,
    address: String,
}

impl InMemoryConnection {
    async fn call(&self) -> Result<Vec<MetricRow>, BackendError> {
        let host = self.connector.record(&self.address, |c| c.queries += 1);

        if let Some(delay) = host.query_delay {
            tokio::time::sleep(delay).await;
        }
        if !host.reachable || host.queries_fail {
            return Err(BackendError::new(format!(
                "query failed on {}",
                self.address
            )));
        }
        Ok(host.rows)
    }
}

#[async_trait]
impl Connection for InMemoryConnection {
    async fn ping(&self) -> Result<(), BackendError> {
        let host = self.connector.record(&self.address, |c| c.pings += 1);

        if host.ping_hangs {
            std::future::pending::<()>().await;
        }
        if !host.reachable || host.ping_fails {
            return Err(BackendError::new(format!("ping failed on {}", self.address)));
        }
        Ok(())
    }

    async fn query(&self, _sql: &str) -> Result<Vec<MetricRow>, BackendError> {
        self.call().await
    }

    async fn execute(&self, _sql: &str) -> Result<(), BackendError> {
        self.call().await.map(|_| ())
    }
}
