//! Self-healing, deadline-bound session for one host.

use super::{BackendError, Connection, ConnectionParams, Connector, MetricRow, SessionError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Connection state of a session.
enum SessionState {
    /// No usable connection; the next operation opens one.
    Disconnected,
    /// A connection that answered its probe when it was opened.
    Connected(Box<dyn Connection>),
}

/// A reusable connection wrapper for one host address.
///
/// The connection is opened on first use and probed once with a ping
/// bounded by the connect deadline. It is then reused without re-probing
/// until an operation fails or times out, at which point it is dropped and
/// the following operation reconnects. A failing call is never retried
/// internally.
///
/// Use is exclusive: [`Session::run_query`] and [`Session::run_command`]
/// wait for a concurrent caller to finish, while [`Session::try_lock`]
/// reports [`SessionError::Busy`] instead of waiting.
pub struct Session {
    params: ConnectionParams,
    connector: Arc<dyn Connector>,
    state: Mutex<SessionState>,
}

impl Session {
    /// Creates a disconnected session. Nothing is opened until first use.
    #[must_use]
    pub fn new(params: ConnectionParams, connector: Arc<dyn Connector>) -> Self {
        Self {
            params,
            connector,
            state: Mutex::new(SessionState::Disconnected),
        }
    }

    /// Returns the connection parameters.
    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Returns the host address this session serves.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.params.address
    }

    /// Returns `true` if the session holds a probed connection.
    ///
    /// Waits for any operation in progress.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Connected(_))
    }

    /// Takes exclusive use of the session, waiting if it is busy.
    pub async fn lock(&self) -> SessionGuard<'_> {
        SessionGuard {
            session: self,
            state: self.state.lock().await,
        }
    }

    /// Takes exclusive use of the session without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Busy`] if another caller is using it.
    pub fn try_lock(&self) -> Result<SessionGuard<'_>, SessionError> {
        let state = self.state.try_lock().map_err(|_| SessionError::Busy {
            address: self.params.address.clone(),
        })?;
        Ok(SessionGuard {
            session: self,
            state,
        })
    }

    /// Runs a metric-producing query under the query deadline.
    ///
    /// # Errors
    ///
    /// See [`SessionGuard::run_query`].
    pub async fn run_query(&self, sql: &str) -> Result<Vec<MetricRow>, SessionError> {
        self.lock().await.run_query(sql).await
    }

    /// Runs a statement under the query deadline.
    ///
    /// # Errors
    ///
    /// See [`SessionGuard::run_command`].
    pub async fn run_command(&self, sql: &str) -> Result<(), SessionError> {
        self.lock().await.run_command(sql).await
    }

    async fn connect(&self) -> Result<Box<dyn Connection>, SessionError> {
        let deadline = self.params.connect_timeout;
        tracing::debug!(dsn = %self.params, "Establishing connection");

        let connection = bounded(deadline, self.connector.open(&self.params))
            .await
            .map_err(|reason| self.not_connected("open", reason))?;

        // The probe is bounded independently of the open.
        bounded(deadline, connection.ping())
            .await
            .map_err(|reason| self.not_connected("ping", reason))?;

        tracing::debug!(dsn = %self.params, "Connection established");
        Ok(connection)
    }

    fn not_connected(&self, step: &str, reason: String) -> SessionError {
        tracing::warn!(dsn = %self.params, step, reason = %reason, "Failed to connect");
        SessionError::NotConnected {
            address: self.params.address.clone(),
            reason: format!("{step} failed: {reason}"),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("params", &self.params)
            .field("connector", &self.connector)
            .finish_non_exhaustive()
    }
}

/// Exclusive use of a [`Session`], released on drop.
pub struct SessionGuard<'a> {
    session: &'a Session,
    state: MutexGuard<'a, SessionState>,
}

impl SessionGuard<'_> {
    /// Returns the host address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.session.address()
    }

    /// Returns `true` if the session holds a probed connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(*self.state, SessionState::Connected(_))
    }

    /// Runs a metric-producing query under the query deadline.
    ///
    /// Empty or blank text returns no rows without touching the network.
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotConnected`] if the connection could not be opened
    ///   or probed
    /// - [`SessionError::OperationFailed`] if the query failed
    /// - [`SessionError::DeadlineExceeded`] if the query timed out
    ///
    /// The last two leave the session disconnected.
    pub async fn run_query(&mut self, sql: &str) -> Result<Vec<MetricRow>, SessionError> {
        if sql.trim().is_empty() {
            return Ok(Vec::new());
        }

        let deadline = self.session.params.query_timeout;
        let result = {
            let connection = self.connection().await?;
            tokio::time::timeout(deadline, connection.query(sql)).await
        };
        self.settle(sql, deadline, result)
    }

    /// Runs a statement that returns no rows under the query deadline.
    ///
    /// Empty or blank text succeeds without touching the network.
    ///
    /// # Errors
    ///
    /// Same as [`SessionGuard::run_query`].
    pub async fn run_command(&mut self, sql: &str) -> Result<(), SessionError> {
        if sql.trim().is_empty() {
            return Ok(());
        }

        let deadline = self.session.params.query_timeout;
        let result = {
            let connection = self.connection().await?;
            tokio::time::timeout(deadline, connection.execute(sql)).await
        };
        self.settle(sql, deadline, result)
    }

    async fn connection(&mut self) -> Result<&dyn Connection, SessionError> {
        if let SessionState::Disconnected = *self.state {
            let connection = self.session.connect().await?;
            *self.state = SessionState::Connected(connection);
        } else {
            tracing::trace!(dsn = %self.session.params, "Reusing connection");
        }

        match &*self.state {
            SessionState::Connected(connection) => Ok(connection.as_ref()),
            SessionState::Disconnected => Err(SessionError::NotConnected {
                address: self.session.params.address.clone(),
                reason: "connection dropped".to_string(),
            }),
        }
    }

    /// Maps an operation outcome to the session contract, dropping the
    /// connection on any failure.
    fn settle<T>(
        &mut self,
        sql: &str,
        deadline: Duration,
        result: Result<Result<T, BackendError>, tokio::time::error::Elapsed>,
    ) -> Result<T, SessionError> {
        let address = self.session.params.address.clone();
        let err = match result {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => SessionError::OperationFailed {
                address,
                reason: e.to_string(),
            },
            Err(_) => SessionError::DeadlineExceeded {
                address,
                timeout: deadline,
            },
        };

        tracing::warn!(
            dsn = %self.session.params,
            kind = err.kind(),
            error = %err,
            sql,
            "Operation failed, dropping connection"
        );
        *self.state = SessionState::Disconnected;
        Err(err)
    }
}

/// Runs `fut` under `deadline`, flattening both failure modes into a reason.
async fn bounded<T, F>(deadline: Duration, fut: F) -> Result<T, String>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {deadline:?}")),
    }
}
