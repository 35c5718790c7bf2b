//! Chimetrics API Server
//!
//! This crate provides the HTTP server of the Chimetrics exporter. It accepts
//! watch/unwatch requests for `ClickHouse` installations on `/chi`, collects
//! their system metrics and serves them to Prometheus on `/metrics`.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - The `/chi` control endpoint over the watched-target registry
//! - The `/metrics` scrape endpoint in the Prometheus text format
//! - A background loop running collection passes at a fixed interval
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod metrics;
mod routes;
pub mod state;

pub use config::Config;
pub use routes::ChiError;
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use metrics::CollectionMonitor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Runs the Chimetrics API server.
///
/// This function loads a `.env` file if present, initializes the server with
/// configuration from environment variables and starts listening for
/// incoming connections. It handles graceful shutdown on SIGTERM/SIGINT
/// signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Chimetrics API server with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    let addr = config.socket_addr();
    let control_addr = config.control_socket_addr();

    tracing::info!(
        host = %config.host,
        port = %config.port,
        control_port = ?config.control_port,
        clickhouse_port = config.connection.port,
        clickhouse_user = %config.connection.user,
        secure = config.connection.secure,
        "Chimetrics API server starting"
    );

    let state = AppState::with_clickhouse(config.connection.clone())
        .with_collect_on_scrape(config.collect_on_scrape);

    let monitor_handle = config.collect_interval.map(|interval| {
        tracing::info!(interval_secs = interval.as_secs(), "Starting collection loop");
        let monitor = Arc::new(CollectionMonitor::new(
            Arc::clone(state.collector()),
            interval,
        ));
        tokio::spawn(monitor.run())
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        shutdown_signal().await;
        // Receivers treat a dropped sender as shutdown too.
        let _ = shutdown_tx.send(());
    });

    let result = match control_addr {
        Some(control_addr) => {
            let listener = TcpListener::bind(addr).await?;
            let control_listener = TcpListener::bind(control_addr).await?;
            tracing::info!(%addr, %control_addr, "Listening for connections");

            let metrics = axum::serve(listener, create_metrics_router(state.clone()))
                .with_graceful_shutdown(wait_for(shutdown_rx.clone()));
            let control = axum::serve(control_listener, create_control_router(state))
                .with_graceful_shutdown(wait_for(shutdown_rx));

            tokio::try_join!(
                async { metrics.await },
                async { control.await }
            )
            .map(|_| ())
        }
        None => {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(%addr, "Listening for connections");

            axum::serve(listener, create_router(state))
                .with_graceful_shutdown(wait_for(shutdown_rx))
                .await
        }
    };

    if let Some(handle) = monitor_handle {
        handle.abort();
    }
    result?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::chi_routes(state.clone()))
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Creates the router served on the main port when `/chi` has its own listener.
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Creates the router served on the separate control port.
pub fn create_control_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::chi_routes(state))
        .layer(TraceLayer::new_for_http())
}

async fn wait_for(mut shutdown: watch::Receiver<()>) {
    let _ = shutdown.changed().await;
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
