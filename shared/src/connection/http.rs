//! `ClickHouse` backend over the HTTP interface.
//!
//! Opening a connection builds a configured [`clickhouse::Client`]; the
//! client itself connects lazily, so the session's ping is what actually
//! proves the server is reachable.

use super::{BackendError, Connection, ConnectionParams, Connector, MetricRow};
use async_trait::async_trait;
use clickhouse::Client;

impl From<clickhouse::error::Error> for BackendError {
    fn from(e: clickhouse::error::Error) -> Self {
        Self::new(e.to_string())
    }
}

/// Connector for real `ClickHouse` servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseConnector;

impl ClickHouseConnector {
    /// Creates a new connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn client(params: &ConnectionParams) -> Client {
        let client = Client::default()
            .with_url(params.url())
            .with_user(params.user.as_str())
            .with_password(params.password.as_str());

        match &params.database {
            Some(database) => client.with_database(database.as_str()),
            None => client,
        }
    }
}

#[async_trait]
impl Connector for ClickHouseConnector {
    async fn open(&self, params: &ConnectionParams) -> Result<Box<dyn Connection>, BackendError> {
        Ok(Box::new(ClickHouseConnection {
            client: Self::client(params),
        }))
    }
}

/// A configured client for one server.
struct ClickHouseConnection {
    client: Client,
}

#[async_trait]
impl Connection for ClickHouseConnection {
    async fn ping(&self) -> Result<(), BackendError> {
        self.client.query("SELECT 1").fetch_one::<u8>().await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<MetricRow>, BackendError> {
        Ok(self.client.query(sql).fetch_all::<MetricRow>().await?)
    }

    async fn execute(&self, sql: &str) -> Result<(), BackendError> {
        self.client.query(sql).execute().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionDefaults;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_does_not_touch_the_network() {
        let params = ConnectionParams::from_address("192.0.2.1:8123", &ConnectionDefaults::default());
        let connector = ClickHouseConnector::new();

        assert!(connector.open(&params).await.is_ok());
    }

    #[tokio::test]
    async fn test_ping_unreachable_server_fails() {
        // Nothing listens on port 1 of the loopback interface.
        let params = ConnectionParams::from_address("127.0.0.1:1", &ConnectionDefaults::default());
        let connection = ClickHouseConnector::new().open(&params).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), connection.ping()).await;
        assert!(matches!(result, Ok(Err(_))));
    }
}
