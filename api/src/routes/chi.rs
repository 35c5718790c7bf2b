//! Control endpoint for the watched-target registry.
//!
//! - `GET /chi` lists the watched targets.
//! - `POST /chi` adds a target or replaces its addresses.
//! - `DELETE /chi` stops watching a target.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::control::{ControlOp, ControlOutcome, ValidationError};
use shared::models::{Target, TargetKey};

/// Error response for rejected control requests.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChiError {
    /// Error code.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

type ChiRejection = (StatusCode, Json<ChiError>);

impl From<ValidationError> for ChiError {
    fn from(e: ValidationError) -> Self {
        Self {
            error: format!("invalid_{}", e.field()),
            message: e.to_string(),
        }
    }
}

/// Creates the control routes.
pub fn chi_routes(state: AppState) -> Router {
    Router::new()
        .route("/chi", get(list_targets).post(upsert_target).delete(remove_target))
        .with_state(state)
}

fn bad_request(error: ChiError) -> ChiRejection {
    (StatusCode::BAD_REQUEST, Json(error))
}

fn invalid_json(rejection: &JsonRejection) -> ChiRejection {
    bad_request(ChiError {
        error: "invalid_json".to_string(),
        message: rejection.body_text(),
    })
}

/// Applies a decoded operation and maps the outcome onto a response.
fn apply(state: &AppState, op: ControlOp) -> Result<Response, ChiRejection> {
    let outcome = state.control().apply(op).map_err(|e| {
        tracing::debug!(field = e.field(), error = %e, "Rejected control request");
        bad_request(e.into())
    })?;

    Ok(match outcome {
        ControlOutcome::Listed(targets) => Json(targets).into_response(),
        ControlOutcome::Applied => StatusCode::NO_CONTENT.into_response(),
    })
}

async fn list_targets(State(state): State<AppState>) -> Result<Response, ChiRejection> {
    apply(&state, ControlOp::List)
}

async fn upsert_target(
    State(state): State<AppState>,
    payload: Result<Json<Target>, JsonRejection>,
) -> Result<Response, ChiRejection> {
    let Json(target) = payload.map_err(|rejection| invalid_json(&rejection))?;
    apply(&state, ControlOp::Upsert(target))
}

async fn remove_target(
    State(state): State<AppState>,
    payload: Result<Json<TargetKey>, JsonRejection>,
) -> Result<Response, ChiRejection> {
    let Json(key) = payload.map_err(|rejection| invalid_json(&rejection))?;
    apply(&state, ControlOp::Remove(key))
}
