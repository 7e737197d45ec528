//! HTTP surface. Handlers only read from the [`CacheStore`]; they never reach
//! an upstream provider.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::auth::Authenticator;
use crate::cache::CacheStore;

mod guard;
mod handlers;

pub use guard::require_auth;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CacheStore>,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(store: Arc<CacheStore>, auth: Arc<dyn Authenticator>) -> Self {
        Self { store, auth }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/live-games", get(handlers::live_games))
        .route("/api/refresh-status", get(handlers::refresh_status))
        .route("/api/verify", get(handlers::verify))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/login", post(handlers::login))
        .merge(protected)
        .fallback(handlers::not_found)
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(target: "http", %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!(target: "http", "HTTP server stopped");
    Ok(())
}
