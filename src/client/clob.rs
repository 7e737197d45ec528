use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

use crate::models::PriceData;
use crate::types::UpstreamConfig;

use super::{ensure_success, join_url, ClientError, ClientResult};

#[derive(Debug, Deserialize)]
struct MidpointResponse {
    #[serde(default)]
    mid: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct SpreadResponse {
    #[serde(default)]
    spread: Option<serde_json::Value>,
}

/// CLOB returns decimals as strings ("0.455"); accept plain numbers as well.
fn parse_decimal(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Read-only client for the public CLOB price endpoints.
pub struct ClobPriceClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    concurrency: usize,
}

impl ClobPriceClient {
    pub fn new(http: Client, config: &UpstreamConfig) -> Self {
        Self {
            http,
            base_url: config.clob_api.clone(),
            timeout: Duration::from_secs(config.price_timeout_secs),
            max_retries: config.max_retries,
            concurrency: config.concurrency.max(1),
        }
    }

    fn backoff(attempt: u32) -> Duration {
        let capped = attempt.min(3);
        let millis = 100 * (1_u64 << capped);
        Duration::from_millis(millis.min(1_000))
    }

    async fn get_public<TResp>(&self, path: &str, token_id: &str) -> ClientResult<TResp>
    where
        TResp: DeserializeOwned,
    {
        let url = join_url(&self.base_url, path);
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .get(&url)
                .query(&[("token_id", token_id)])
                .timeout(self.timeout)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status().is_server_error() && attempt < self.max_retries {
                        attempt += 1;
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }
                    let resp = ensure_success(resp).await?;
                    return Ok(resp.json::<TResp>().await?);
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        attempt += 1;
                        sleep(Self::backoff(attempt)).await;
                        continue;
                    }
                    return Err(ClientError::Http(err));
                }
            }
        }
    }

    pub async fn midpoint(&self, token_id: &str) -> ClientResult<Option<f64>> {
        let resp: MidpointResponse = self.get_public("midpoint", token_id).await?;
        Ok(resp.mid.as_ref().and_then(parse_decimal))
    }

    pub async fn spread(&self, token_id: &str) -> ClientResult<Option<f64>> {
        let resp: SpreadResponse = self.get_public("spread", token_id).await?;
        Ok(resp.spread.as_ref().and_then(parse_decimal))
    }

    /// Price and spread for one token. A failed lookup leaves that field unset.
    pub async fn price_data(&self, token_id: &str) -> PriceData {
        let (mid, spread) = tokio::join!(self.midpoint(token_id), self.spread(token_id));
        if let Err(err) = &mid {
            debug!(target: "upstream", token_id, error = %err, "midpoint lookup failed");
        }
        if let Err(err) = &spread {
            debug!(target: "upstream", token_id, error = %err, "spread lookup failed");
        }
        PriceData {
            price: mid.ok().flatten(),
            spread: spread.ok().flatten(),
        }
    }

    /// Look up many tokens with bounded concurrency.
    pub async fn bulk_price_data<I>(&self, token_ids: I) -> HashMap<String, PriceData>
    where
        I: IntoIterator<Item = String>,
    {
        stream::iter(token_ids)
            .map(|id| async move {
                let data = self.price_data(&id).await;
                (id, data)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_string_and_number_decimals() {
        assert_eq!(parse_decimal(&json!("0.455")), Some(0.455));
        assert_eq!(parse_decimal(&json!(0.3)), Some(0.3));
        assert_eq!(parse_decimal(&json!("n/a")), None);
        assert_eq!(parse_decimal(&json!(null)), None);
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(ClobPriceClient::backoff(1), Duration::from_millis(200));
        assert_eq!(ClobPriceClient::backoff(10), Duration::from_millis(800));
    }
}
