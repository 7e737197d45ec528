use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};

use super::AppState;
use crate::auth::{bearer_token, AuthError};
use crate::monitoring::metrics::METRICS;

/// Reject the request with 401 unless it carries a valid bearer token. On
/// success the caller's [`Identity`](crate::auth::Identity) is attached as a
/// request extension.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AuthError> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?;
    let identity = state.auth.verify(bearer_token(value)?)?;

    debug!(target: "http", user = %identity.username, path = %req.uri().path(), "authorized");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let status = match self {
            AuthError::Signing(_) => {
                error!(target: "http", error = %message, "token signing failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => {
                METRICS.record_auth_rejection(&message);
                StatusCode::UNAUTHORIZED
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
