//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use shared::config::ConnectionDefaults;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default port for the metrics and control endpoints.
pub const DEFAULT_PORT: u16 = 8888;

/// Default interval between background collection passes.
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(30);

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `CHIMETRICS_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `CHIMETRICS_PORT`: The port to listen on (default: 8888)
/// - `CHIMETRICS_CONTROL_PORT`: Serve `/chi` on this port instead (optional)
/// - `CHIMETRICS_COLLECT_INTERVAL_SECS`: Background pass interval, 0 disables (default: 30)
/// - `CHIMETRICS_COLLECT_ON_SCRAPE`: Run a pass on every `/metrics` request (default: true)
/// - `CHIMETRICS_CH_USER`, `CHIMETRICS_CH_PASSWORD`, `CHIMETRICS_CH_DATABASE`,
///   `CHIMETRICS_CH_PORT`, `CHIMETRICS_CH_SECURE`: `ClickHouse` connection defaults
/// - `CHIMETRICS_CONNECT_TIMEOUT_MS`, `CHIMETRICS_QUERY_TIMEOUT_MS`: session deadlines
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Separate port for the control endpoint, if any.
    pub control_port: Option<u16>,
    /// Interval between background passes; `None` disables the loop.
    pub collect_interval: Option<Duration>,
    /// Whether `/metrics` runs a pass before rendering.
    pub collect_on_scrape: bool,
    /// Connection defaults applied to every watched address.
    pub connection: ConnectionDefaults,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric or boolean variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("CHIMETRICS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("CHIMETRICS_PORT")?.unwrap_or(DEFAULT_PORT);
        let control_port = parse_var::<u16>("CHIMETRICS_CONTROL_PORT")?;

        let collect_interval = match parse_var::<u64>("CHIMETRICS_COLLECT_INTERVAL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(DEFAULT_COLLECT_INTERVAL),
        };
        let collect_on_scrape = parse_var("CHIMETRICS_COLLECT_ON_SCRAPE")?.unwrap_or(true);

        let defaults = ConnectionDefaults::default();
        let mut connection = ConnectionDefaults {
            port: parse_var("CHIMETRICS_CH_PORT")?.unwrap_or(defaults.port),
            database: std::env::var("CHIMETRICS_CH_DATABASE")
                .ok()
                .filter(|db| !db.is_empty()),
            secure: parse_var("CHIMETRICS_CH_SECURE")?.unwrap_or(defaults.secure),
            ..defaults
        };
        if let Ok(user) = std::env::var("CHIMETRICS_CH_USER") {
            let password = std::env::var("CHIMETRICS_CH_PASSWORD").unwrap_or_default();
            connection = connection.with_credentials(user, password);
        } else if let Ok(password) = std::env::var("CHIMETRICS_CH_PASSWORD") {
            connection.password = password;
        }
        if let Some(ms) = parse_var("CHIMETRICS_CONNECT_TIMEOUT_MS")? {
            connection = connection.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var("CHIMETRICS_QUERY_TIMEOUT_MS")? {
            connection = connection.with_query_timeout(Duration::from_millis(ms));
        }

        Ok(Self {
            host,
            port,
            control_port,
            collect_interval,
            collect_on_scrape,
            connection,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Panics
    ///
    /// Panics if the host and port combination cannot be parsed as a valid socket address.
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr_for(self.port)
    }

    /// Returns the socket address of the separate control listener.
    ///
    /// `None` when the control endpoint shares the main listener.
    ///
    /// # Panics
    ///
    /// Panics if the host and port combination cannot be parsed as a valid socket address.
    #[must_use]
    pub fn control_socket_addr(&self) -> Option<SocketAddr> {
        self.control_port
            .filter(|&port| port != self.port)
            .map(|port| self.addr_for(port))
    }

    fn addr_for(&self, port: u16) -> SocketAddr {
        format!("{}:{}", self.host, port)
            .parse()
            .expect("Invalid socket address from config")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            control_port: None,
            collect_interval: Some(DEFAULT_COLLECT_INTERVAL),
            collect_on_scrape: true,
            connection: ConnectionDefaults::default(),
        }
    }
}

/// Reads and parses an optional environment variable.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(name)
        .ok()
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {name}: {raw:?}"))
        })
        .transpose()
}
