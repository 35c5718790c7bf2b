//! Resilient connection layer.
//!
//! A [`Session`] wraps one host address. It opens its connection lazily
//! through a [`Connector`], probes it once, reuses it until an operation
//! fails, and bounds every operation with a deadline so an unreachable host
//! only ever costs its own caller a timeout.
//!
//! The backend is pluggable: [`ClickHouseConnector`] talks to real servers,
//! [`InMemoryConnector`] simulates hosts for development and testing.

pub mod http;
pub mod memory;
pub mod session;

pub use http::ClickHouseConnector;
pub use memory::{InMemoryConnector, InMemoryHost};
pub use session::{Session, SessionGuard};

use crate::config::ConnectionDefaults;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One row of a metric-producing query: a metric name and its value.
///
/// Queries must alias their columns to `metric` and `value`, with `value`
/// cast to `Float64`.
#[derive(Debug, Clone, PartialEq, clickhouse::Row, Deserialize)]
pub struct MetricRow {
    /// Metric name as reported by the server.
    pub metric: String,
    /// Metric value.
    pub value: f64,
}

impl MetricRow {
    /// Creates a new row.
    #[must_use]
    pub fn new(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            value,
        }
    }
}

/// Error reported by a backend while opening, probing or using a connection.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Creates a new backend error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by a [`Session`].
///
/// All of them are recoverable: the session resets itself and the next call
/// starts over with a fresh connection.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The connection could not be opened or did not answer its probe.
    #[error("not connected to {address}: {reason}")]
    NotConnected {
        /// Host address.
        address: String,
        /// Why the connection attempt failed.
        reason: String,
    },

    /// A query or command failed on a live connection.
    #[error("operation failed on {address}: {reason}")]
    OperationFailed {
        /// Host address.
        address: String,
        /// Backend error message.
        reason: String,
    },

    /// A query or command did not complete within its deadline.
    #[error("operation on {address} exceeded its {timeout:?} deadline")]
    DeadlineExceeded {
        /// Host address.
        address: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The session is in use by another caller.
    #[error("session for {address} is busy")]
    Busy {
        /// Host address.
        address: String,
    },
}

impl SessionError {
    /// Short, stable name of the error class, suitable as a log field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected { .. } => "not_connected",
            Self::OperationFailed { .. } => "operation_failed",
            Self::DeadlineExceeded { .. } => "deadline_exceeded",
            Self::Busy { .. } => "busy",
        }
    }
}

/// Everything needed to reach one host.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// The address as it was registered.
    pub address: String,
    /// Host name or IP, without brackets.
    pub host: String,
    /// Port.
    pub port: u16,
    /// User to authenticate as.
    pub user: String,
    /// Password for `user`.
    pub password: String,
    /// Database to select, if any.
    pub database: Option<String>,
    /// Whether to use HTTPS.
    pub secure: bool,
    /// Deadline for open + ping.
    pub connect_timeout: Duration,
    /// Deadline for each query or command.
    pub query_timeout: Duration,
}

impl ConnectionParams {
    /// Derives connection parameters from a registered address.
    ///
    /// Accepts `host`, `host:port` and `[v6-addr]:port`. A bare IPv6 address
    /// is taken as a host. When no port can be read the default port applies.
    #[must_use]
    pub fn from_address(address: &str, defaults: &ConnectionDefaults) -> Self {
        let (host, port) = split_host_port(address.trim());

        Self {
            address: address.to_string(),
            host: host.to_string(),
            port: port.unwrap_or(defaults.port),
            user: defaults.user.clone(),
            password: defaults.password.clone(),
            database: defaults.database.clone(),
            secure: defaults.secure,
            connect_timeout: defaults.connect_timeout,
            query_timeout: defaults.query_timeout,
        }
    }

    /// Returns the server URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        if self.host.contains(':') {
            format!("{scheme}://[{}]:{}", self.host, self.port)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }
}

fn split_host_port(address: &str) -> (&str, Option<u16>) {
    if let Some(rest) = address.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    match address.rsplit_once(':') {
        Some((host, "")) if !host.contains(':') => (host, None),
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (address, None),
        },
        _ => (address, None),
    }
}

/// Password-free rendering, safe for logs.
impl fmt::Display for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.url())?;
        if let Some(database) = &self.database {
            write!(f, "/{database}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("address", &self.address)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("database", &self.database)
            .field("secure", &self.secure)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

/// Opens connections to hosts.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    /// Opens a new connection. The session probes it before first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be created.
    async fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, BackendError>;
}

/// A live connection to one host.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Checks that the host answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not answer.
    async fn ping(&self) -> Result<(), BackendError>;

    /// Runs a metric-producing query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    async fn query(&self, sql: &str) -> Result<Vec<MetricRow>, BackendError>;

    /// Runs a statement that returns no rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the statement fails.
    async fn execute(&self, sql: &str) -> Result<(), BackendError>;
}
