//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

#![allow(dead_code)]

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::connection::InMemoryConnector;

/// Creates a test router over a backend where every host is unreachable.
///
/// # Returns
///
/// A tuple containing the configured router and the app state.
pub fn test_app() -> (Router, AppState) {
    test_app_with(InMemoryConnector::new())
}

/// Creates a test router over the given simulated hosts.
pub fn test_app_with(connector: InMemoryConnector) -> (Router, AppState) {
    let state = AppState::with_in_memory_connector(connector);
    let router = create_router(state.clone());
    (router, state)
}

async fn send_json(app: Router, method: &str, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request with JSON body.
///
/// # Arguments
///
/// * `app` - The Axum router to send the request to
/// * `uri` - The URI path to POST to
/// * `body` - The JSON body to send
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body
/// (`Value::Null` for empty bodies).
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "POST", uri, &body).await
}

/// Helper to make a DELETE request with JSON body.
pub async fn delete_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send_json(app, "DELETE", uri, &body).await
}

/// Helper to make a GET request.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, text) = get_text(app, uri).await;
    let json: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    (status, json)
}

/// Helper to make a GET request and return the raw body.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}
