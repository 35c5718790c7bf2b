//! Integration tests for metric collection and exposition.
//!
//! Tests cover:
//! - Samples of watched hosts on `/metrics`
//! - Failure isolation between targets
//! - Failure counters
//! - Dropping series of unwatched targets

use axum::http::StatusCode;
use serde_json::json;
use shared::connection::{InMemoryConnector, InMemoryHost, MetricRow};
use shared::models::TargetKey;

use super::common::{delete_json, get_text, post_json, test_app, test_app_with};

fn healthy_hosts(addresses: &[&str]) -> InMemoryConnector {
    let connector = InMemoryConnector::new();
    for address in addresses {
        connector.set_host(
            *address,
            InMemoryHost::healthy(vec![MetricRow::new("Query", 7.0)]),
        );
    }
    connector
}

#[tokio::test]
async fn test_watched_host_is_exposed() {
    let (app, _state) = test_app_with(healthy_hosts(&["10.0.0.1:8123"]));

    post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["10.0.0.1:8123"]}),
    )
    .await;
    let (status, body) = get_text(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(
        r#"chi_clickhouse_metric_Query{chi="chi-a",hostname="10.0.0.1:8123",namespace="default"} 7"#
    ));
    assert!(body.contains(
        r#"chi_clickhouse_event_Query{chi="chi-a",hostname="10.0.0.1:8123",namespace="default"} 7"#
    ));
    assert!(body.contains("chi_exporter_watched_chis 1"));
}

#[tokio::test]
async fn test_unreachable_target_does_not_hide_others() {
    let (app, _state) = test_app_with(healthy_hosts(&["a0", "b0"]));

    for (name, address) in [("chi-a", "a0"), ("chi-b", "b0"), ("chi-down", "10.0.0.9:8123")] {
        post_json(
            app.clone(),
            "/chi",
            json!({"namespace": "default", "name": name, "addresses": [address]}),
        )
        .await;
    }
    let (status, body) = get_text(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"chi="chi-a""#));
    assert!(body.contains(r#"chi="chi-b""#));
    assert!(body.contains(
        r#"chi_exporter_scrape_failures_total{chi="chi-down",hostname="10.0.0.9:8123",namespace="default"} 1"#
    ));
    assert!(!body.contains(r#"chi_clickhouse_metric_Query{chi="chi-down""#));
}

#[tokio::test]
async fn test_unreachable_target_counts_one_failure_per_pass() {
    let (app, state) = test_app();

    post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["10.0.0.1:9000"]}),
    )
    .await;
    state.collector().collect_once().await.unwrap();

    let chi = TargetKey::new("default", "chi-a");
    assert_eq!(state.exposed().failure_count(&chi, "10.0.0.1:9000"), 1);
    assert!(state.exposed().samples_for(&chi, "10.0.0.1:9000").is_empty());
}

#[tokio::test]
async fn test_unwatched_target_series_disappear() {
    let (app, _state) = test_app_with(healthy_hosts(&["h0"]));

    post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["h0"]}),
    )
    .await;
    let (_, body) = get_text(app.clone(), "/metrics").await;
    assert!(body.contains("chi_clickhouse_metric_Query"));

    delete_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a"}),
    )
    .await;
    let (_, body) = get_text(app, "/metrics").await;

    assert!(!body.contains("chi_clickhouse_"));
    assert!(body.contains("chi_exporter_watched_chis 0"));
}

#[tokio::test]
async fn test_recovered_host_is_exposed_again() {
    let connector = InMemoryConnector::new();
    connector.set_host("h0", InMemoryHost::unreachable());
    let (app, _state) = test_app_with(connector.clone());

    post_json(
        app.clone(),
        "/chi",
        json!({"namespace": "default", "name": "chi-a", "addresses": ["h0"]}),
    )
    .await;
    let (_, body) = get_text(app.clone(), "/metrics").await;
    assert!(!body.contains("chi_clickhouse_"));

    connector.set_host("h0", InMemoryHost::healthy(vec![MetricRow::new("Query", 1.0)]));
    let (_, body) = get_text(app, "/metrics").await;

    assert!(body.contains("chi_clickhouse_metric_Query"));
}
