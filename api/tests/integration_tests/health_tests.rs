//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint
//! - Empty registry behavior
//! - Unknown paths

use axum::http::StatusCode;

use super::common::{get, get_text, test_app};

#[tokio::test]
async fn test_health_check() {
    let (app, _state) = test_app();

    let (status, response) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], "chimetrics");
}

#[tokio::test]
async fn test_empty_registry_returns_empty_results() {
    let (app, _state) = test_app();

    let (status, response) = get(app.clone(), "/chi").await;
    assert_eq!(status, StatusCode::OK);
    assert!(response.as_array().unwrap().is_empty());

    let (status, body) = get_text(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("chi_exporter_watched_chis 0"));
    assert!(!body.contains("chi_clickhouse_"));
}

#[tokio::test]
async fn test_unknown_path_returns_404() {
    let (app, _state) = test_app();

    let (status, _) = get(app, "/chi/default/chi-a").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
