use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::auth::TokenAuthenticator;
use crate::cache::CacheStore;
use crate::client::{PolymarketClient, PricingSource, SofaScoreClient, StatsSource};
use crate::monitoring::dashboard;
use crate::scheduler::{CycleOutcome, RefreshScheduler};
use crate::server::{self, AppState};
use crate::types::AppConfig;

fn build_sources(cfg: &AppConfig) -> anyhow::Result<(Arc<dyn PricingSource>, Arc<dyn StatsSource>)> {
    let pricing = PolymarketClient::new(&cfg.upstream, cfg.sports.clone())
        .context("failed to build Polymarket client")?;
    let stats = SofaScoreClient::new(&cfg.upstream).context("failed to build SofaScore client")?;
    Ok((Arc::new(pricing), Arc::new(stats)))
}

/// Entrypoint used by `main.rs` for the `serve` command.
///
/// Wires the cache store, the refresh scheduler, the metrics logger and the
/// HTTP server together; Ctrl-C cancels all of them.
pub async fn run_server(cfg: AppConfig) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let store = Arc::new(CacheStore::new());
    let (pricing, stats) = build_sources(&cfg)?;

    let scheduler = RefreshScheduler::from_config(Arc::clone(&store), pricing, stats, &cfg.refresh)
        .spawn(shutdown.clone());

    if cfg.refresh.metrics_log_secs > 0 {
        dashboard::spawn_metrics_logger(
            Duration::from_secs(cfg.refresh.metrics_log_secs),
            shutdown.clone(),
        );
    }

    let bind_addr = cfg.server.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    let state = AppState::new(store, Arc::new(TokenAuthenticator::from_config(&cfg.auth)));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(target: "proxy", "shutdown signal received"),
            Err(err) => warn!(target: "proxy", error = %err, "failed to listen for ctrl-c"),
        }
        signal_token.cancel();
    });

    let served = server::serve(listener, state, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(err) = scheduler.await {
        warn!(target: "proxy", error = %err, "refresh scheduler task aborted");
    }
    served
}

/// Entrypoint for the `refresh` command: one cycle, snapshot printed as JSON.
pub async fn refresh_and_print(cfg: AppConfig) -> anyhow::Result<()> {
    let store = Arc::new(CacheStore::new());
    let (pricing, stats) = build_sources(&cfg)?;
    let mut scheduler = RefreshScheduler::from_config(Arc::clone(&store), pricing, stats, &cfg.refresh);

    if let CycleOutcome::Failed(reason) = scheduler.refresh_once().await {
        anyhow::bail!("refresh failed: {reason}");
    }

    let snapshot = store.read().into_snapshot(chrono::Utc::now());
    println!("{}", serde_json::to_string_pretty(&*snapshot)?);
    Ok(())
}
