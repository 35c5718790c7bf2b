//! Integration tests for the `/chi` control endpoint.
//!
//! Tests cover:
//! - Add, list and delete round trip
//! - Replacing addresses
//! - Empty address lists
//! - Validation and malformed requests
//! - Unsupported methods

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use super::common::{delete_json, get, post_json, test_app};

#[tokio::test]
async fn test_add_list_delete() {
    let (app, _state) = test_app();

    let (status, _) = post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["10.0.0.1:9000"]}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, response) = get(app.clone(), "/chi").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response,
        json!([{"namespace": "default", "name": "chi-a", "addresses": ["10.0.0.1:9000"]}])
    );

    let (status, _) = delete_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a"}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, response) = get(app, "/chi").await;
    assert_eq!(response, json!([]));
}

#[tokio::test]
async fn test_upsert_replaces_addresses() {
    let (app, state) = test_app();

    for addresses in [json!(["h0", "h1"]), json!(["h2"])] {
        let (status, _) = post_json(
            app.clone(),
            "/chi",
            json!({"namespace": "default", "name": "chi-a", "addresses": addresses}),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, response) = get(app, "/chi").await;
    assert_eq!(response[0]["addresses"], json!(["h2"]));
    assert_eq!(state.registry().len(), 1);
}

#[tokio::test]
async fn test_list_is_ordered_by_key() {
    let (app, _state) = test_app();

    for (namespace, name) in [("prod", "chi-b"), ("default", "chi-z"), ("default", "chi-a")] {
        post_json(
            app.clone(),
            "/chi",
            json!({"namespace": namespace, "name": name, "addresses": ["h0"]}),
        )
        .await;
    }

    let (_, response) = get(app, "/chi").await;
    let keys: Vec<String> = response
        .as_array()
        .unwrap()
        .iter()
        .map(|t| format!("{}/{}", t["namespace"].as_str().unwrap(), t["name"].as_str().unwrap()))
        .collect();
    assert_eq!(keys, vec!["default/chi-a", "default/chi-z", "prod/chi-b"]);
}

#[tokio::test]
async fn test_empty_addresses_unwatch() {
    let (app, state) = test_app();

    post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["h0"]}),
    )
    .await;
    let (status, _) = post_json(
        app,
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": []}),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.registry().is_empty());
}

#[tokio::test]
async fn test_delete_missing_target_is_noop() {
    let (app, _state) = test_app();

    let (status, _) = delete_json(
        app,
        "/chi",
        json!({"namespace": "default", "name": "never-added"}),
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_blank_namespace_rejected() {
    let (app, state) = test_app();

    let (status, response) = post_json(
        app,
        "/chi",
        json!({"namespace": "  ", "name": "chi-a", "addresses": ["h0"]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_namespace");
    assert!(response["message"].is_string());
    assert!(state.registry().is_empty());
}

#[tokio::test]
async fn test_delete_without_name_rejected() {
    let (app, _state) = test_app();

    let (status, response) = delete_json(app, "/chi", json!({"namespace": "default"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_name");
}

#[tokio::test]
async fn test_wrong_field_type_rejected() {
    let (app, _state) = test_app();

    let (status, response) = post_json(
        app,
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": "h0"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_json");
}

#[tokio::test]
async fn test_patch_not_allowed() {
    let (app, _state) = test_app();

    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("PATCH")
            .uri("/chi")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
