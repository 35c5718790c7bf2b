//! Connection settings shared by every session.
//!
//! Addresses come from the control protocol; everything else needed to reach
//! a host (credentials, default port, transport, deadlines) is process-wide
//! and supplied by the configuration layer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default `ClickHouse` HTTP port.
pub const DEFAULT_PORT: u16 = 8123;

/// Default deadline for opening a connection and probing it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default deadline for a single query or command.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Process-wide connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDefaults {
    /// Port used when an address does not carry one.
    pub port: u16,
    /// User to authenticate as.
    pub user: String,
    /// Password for `user`.
    #[serde(skip_serializing)]
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

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            user: "default".to_string(),
            password: String::new(),
            database: None,
            secure: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl ConnectionDefaults {
    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the open + ping deadline.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the per-operation deadline.
    #[must_use]
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = ConnectionDefaults::default();

        assert_eq!(defaults.port, 8123);
        assert_eq!(defaults.user, "default");
        assert!(defaults.database.is_none());
        assert!(!defaults.secure);
        assert_eq!(defaults.connect_timeout, Duration::from_secs(2));
        assert_eq!(defaults.query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_password_is_not_serialized() {
        let defaults = ConnectionDefaults::default().with_credentials("exporter", "s3cret");
        let json = serde_json::to_string(&defaults).unwrap();

        assert!(json.contains("exporter"));
        assert!(!json.contains("s3cret"));
    }
}
