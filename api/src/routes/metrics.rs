//! Prometheus scrape endpoint.

use crate::metrics::exposition::{self, CONTENT_TYPE};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};

/// Creates the metrics routes.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(scrape_metrics))
        .with_state(state)
}

/// Renders the exposed metric set.
///
/// With collect-on-scrape enabled a pass runs first. A pass that fails
/// fatally is logged and the previous samples are served; watched hosts
/// failing never fail the scrape.
async fn scrape_metrics(State(state): State<AppState>) -> impl IntoResponse {
    if state.collect_on_scrape() {
        if let Err(e) = state.collector().collect_once().await {
            tracing::error!(error = %e, "Collection pass failed during scrape");
        }
    }

    match exposition::render(&state.exposed().snapshot(), state.registry().len()) {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, CONTENT_TYPE)], body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                e.to_string(),
            )
        }
    }
}
