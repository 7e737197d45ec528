use serde::Serialize;
use tracing::info;

use crate::types::AppConfig;

#[derive(Serialize)]
struct StartupLog<'a> {
    event: &'a str,
    bind_addr: String,
    sports: Vec<&'a str>,
    refresh_window_secs: (u64, u64),
    max_retained_age_secs: u64,
    gamma_api: &'a str,
    sofascore_api: &'a str,
    fetch_momentum: bool,
}

pub fn log_startup(cfg: &AppConfig) {
    let payload = StartupLog {
        event: "startup",
        bind_addr: cfg.server.bind_addr(),
        sports: cfg.sports.iter().map(|s| s.name()).collect(),
        refresh_window_secs: (cfg.refresh.min_interval_secs, cfg.refresh.max_interval_secs),
        max_retained_age_secs: cfg.refresh.max_retained_age_secs,
        gamma_api: &cfg.upstream.gamma_api,
        sofascore_api: &cfg.upstream.sofascore_api,
        fetch_momentum: cfg.upstream.fetch_momentum,
    };
    info!(target: "proxy", startup = serde_json::to_string(&payload).unwrap_or_default().as_str());
}
