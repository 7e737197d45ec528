use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::AppState;
use crate::auth::{AuthError, Credentials, Identity, IssuedToken};
use crate::cache::{RefreshState, Snapshot};
use crate::monitoring::metrics::METRICS;

const SERVICE_NAME: &str = "live-odds-proxy";

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// A login body axum could not parse, answered with the usual `{error}` body
/// and axum's status (400, 415 or 422).
fn rejected_body(rejection: JsonRejection) -> Response {
    let message = rejection.body_text();
    debug!(target: "http", status = %rejection.status(), error = %message, "login body rejected");
    (rejection.status(), Json(json!({ "error": message }))).into_response()
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<IssuedToken>, Response> {
    let Json(credentials) = payload.map_err(rejected_body)?;
    let issued = state
        .auth
        .authenticate(&credentials)
        .map_err(AuthError::into_response)?;
    info!(target: "http", user = %credentials.username, expires_at = %issued.expires_at, "login succeeded");
    Ok(Json(issued))
}

/// The current snapshot, or an empty document if nothing was published yet.
pub async fn live_games(State(state): State<AppState>) -> Json<Arc<Snapshot>> {
    let snapshot = state.store.read().into_snapshot(Utc::now());
    METRICS.record_snapshot_served();
    debug!(target: "http", total_games = snapshot.total_count(), "serving live games");
    Json(snapshot)
}

pub async fn refresh_status(State(state): State<AppState>) -> Json<RefreshState> {
    Json(state.store.refresh_state())
}

pub async fn verify(Extension(identity): Extension<Identity>) -> Json<Value> {
    Json(json!({ "valid": true, "username": identity.username }))
}

pub async fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
