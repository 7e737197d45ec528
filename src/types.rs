use std::fs;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::sports::Sport;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Lower bound of the jittered delay between refresh cycles.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: u64,
    /// Upper bound (inclusive) of the jittered delay between refresh cycles.
    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,
    /// Period of the metrics log line; 0 disables it.
    #[serde(default = "default_metrics_log_secs")]
    pub metrics_log_secs: u64,
    /// How long a source's last good batch may stand in for a failed fetch.
    /// Past this age the source counts as having no data; 0 never reuses.
    #[serde(default = "default_max_retained_age_secs")]
    pub max_retained_age_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: default_min_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            metrics_log_secs: default_metrics_log_secs(),
            max_retained_age_secs: default_max_retained_age_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs(self.min_interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn max_retained_age(&self) -> Duration {
        Duration::from_secs(self.max_retained_age_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    pub admin_username: String,
    pub admin_password: String,
    /// HMAC key used to sign bearer tokens.
    pub secret_key: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_gamma_api")]
    pub gamma_api: String,
    #[serde(default = "default_clob_api")]
    pub clob_api: String,
    #[serde(default = "default_event_url_base")]
    pub event_url_base: String,
    #[serde(default = "default_sofascore_api")]
    pub sofascore_api: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_price_timeout_secs")]
    pub price_timeout_secs: u64,
    #[serde(default = "default_detail_timeout_secs")]
    pub detail_timeout_secs: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fetch graph/statistics/comments for every live match.
    #[serde(default = "default_true")]
    pub fetch_momentum: bool,
    #[serde(default = "default_comment_limit")]
    pub comment_limit: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            gamma_api: default_gamma_api(),
            clob_api: default_clob_api(),
            event_url_base: default_event_url_base(),
            sofascore_api: default_sofascore_api(),
            page_size: default_page_size(),
            max_events: default_max_events(),
            request_timeout_secs: default_request_timeout_secs(),
            price_timeout_secs: default_price_timeout_secs(),
            detail_timeout_secs: default_detail_timeout_secs(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            fetch_momentum: true,
            comment_limit: default_comment_limit(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_sports")]
    pub sports: Vec<Sport>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at {path}"))?;
        let mut cfg: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to deserialize TOML config at {path}"))?;
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Secrets may be kept out of the config file and supplied through the
    /// environment (or a `.env` file loaded at startup).
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("PROXY_ADMIN_USERNAME") {
            self.auth.admin_username = v;
        }
        if let Ok(v) = std::env::var("PROXY_ADMIN_PASSWORD") {
            self.auth.admin_password = v;
        }
        if let Ok(v) = std::env::var("PROXY_SECRET_KEY") {
            self.auth.secret_key = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.refresh.min_interval_secs == 0 {
            anyhow::bail!("refresh.min_interval_secs must be greater than zero");
        }
        if self.refresh.min_interval_secs > self.refresh.max_interval_secs {
            anyhow::bail!(
                "refresh.min_interval_secs ({}) must not exceed refresh.max_interval_secs ({})",
                self.refresh.min_interval_secs,
                self.refresh.max_interval_secs
            );
        }
        if self.auth.secret_key.is_empty() {
            anyhow::bail!("auth.secret_key must be set (or PROXY_SECRET_KEY)");
        }
        if self.auth.token_ttl_days <= 0 {
            anyhow::bail!("auth.token_ttl_days must be positive");
        }
        if self.upstream.page_size == 0 {
            anyhow::bail!("upstream.page_size must be greater than zero");
        }
        if self.sports.is_empty() {
            anyhow::bail!("at least one sport must be enabled");
        }
        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_min_interval_secs() -> u64 {
    30
}

fn default_max_interval_secs() -> u64 {
    60
}

fn default_metrics_log_secs() -> u64 {
    60
}

fn default_max_retained_age_secs() -> u64 {
    180
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_gamma_api() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_clob_api() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_event_url_base() -> String {
    "https://polymarket.com/event".to_string()
}

fn default_sofascore_api() -> String {
    "https://www.sofascore.com/api/v1".to_string()
}

fn default_page_size() -> usize {
    100
}

fn default_max_events() -> usize {
    2000
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_price_timeout_secs() -> u64 {
    2
}

fn default_detail_timeout_secs() -> u64 {
    3
}

fn default_concurrency() -> usize {
    16
}

fn default_max_retries() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_comment_limit() -> usize {
    10
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_sports() -> Vec<Sport> {
    vec![Sport::Soccer]
}
