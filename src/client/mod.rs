use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{PricingBatch, StatsRecord};

pub mod clob;
pub mod gamma;
pub mod sofascore;

pub use clob::ClobPriceClient;
pub use gamma::PolymarketClient;
pub use sofascore::SofaScoreClient;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status}: {body}")]
    HttpStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// The two upstream providers the refresh scheduler draws from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Pricing,
    Stats,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Pricing => f.write_str("pricing"),
            SourceKind::Stats => f.write_str("stats"),
        }
    }
}

/// Prediction-market feed: decides which events exist and carries their odds.
#[async_trait]
pub trait PricingSource: Send + Sync {
    async fn fetch_events(&self) -> ClientResult<PricingBatch>;
}

/// Live statistics feed: scores, minute, momentum.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Base records only; per-match details are left for [`attach_details`].
    ///
    /// [`attach_details`]: StatsSource::attach_details
    async fn fetch_live(&self) -> ClientResult<Vec<StatsRecord>>;

    /// Fill in per-match details for `records[i]` for each `i` in `matched`.
    /// Best effort; the default attaches nothing.
    async fn attach_details(&self, _records: &mut [StatsRecord], _matched: &[usize]) {}
}

/// Join a base URL and a path without doubling or dropping the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Turn a non-success response into [`ClientError::HttpStatus`].
pub(crate) async fn ensure_success(resp: reqwest::Response) -> ClientResult<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::HttpStatus { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/", "/events"), "http://a/events");
        assert_eq!(join_url("http://a", "events"), "http://a/events");
        assert_eq!(join_url("http://a/api/v1", "sport/x"), "http://a/api/v1/sport/x");
    }

    #[test]
    fn source_kind_display() {
        assert_eq!(SourceKind::Pricing.to_string(), "pricing");
        assert_eq!(SourceKind::Stats.to_string(), "stats");
    }
}
