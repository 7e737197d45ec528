//! Polymarket Gamma API client: lists open events, keeps the live sports
//! matches among them and prices their moneyline tokens through the CLOB.
//!
//! Gamma encodes `outcomes` and `clobTokenIds` as JSON strings inside JSON
//! (`"[\"Yes\", \"No\"]"`); both that form and plain arrays are accepted.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::models::{Moneyline, MoneylineOutcome, PriceData, PricingBatch, PricingEvent};
use crate::sports::{extract_teams, is_live_event, Sport};
use crate::types::UpstreamConfig;
use crate::utils::time::parse_timestamp;

use super::clob::ClobPriceClient;
use super::{ensure_success, join_url, ClientError, ClientResult, PricingSource};

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub outcomes: serde_json::Value,
    #[serde(default, rename = "clobTokenIds")]
    pub clob_token_ids: serde_json::Value,
}

impl GammaMarket {
    pub fn outcomes(&self) -> Vec<String> {
        parse_string_list(&self.outcomes)
    }

    pub fn clob_token_ids(&self) -> Vec<String> {
        parse_string_list(&self.clob_token_ids)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GammaEvent {
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "startTime")]
    pub start_time: Option<String>,
    #[serde(default, rename = "eventDate")]
    pub event_date: Option<String>,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

impl GammaEvent {
    /// Event id as a string; empty when Gamma sent none.
    pub fn id_string(&self) -> String {
        match &self.id {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => String::new(),
        }
    }
}

/// Parse a field that is either a list or a JSON-encoded list in a string.
/// Object items contribute their `name`.
pub fn parse_string_list(value: &serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::String(s) => match serde_json::from_str::<serde_json::Value>(s) {
            Ok(inner @ serde_json::Value::Array(_)) => parse_string_list(&inner),
            _ if s.is_empty() => Vec::new(),
            _ => vec![s.clone()],
        },
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Object(obj) => obj
                    .get("name")
                    .and_then(|n| n.as_str())
                    .unwrap_or_default()
                    .to_string(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_iso_date(token: &str) -> bool {
    let b = token.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 4 || i == 7 || c.is_ascii_digit())
}

/// "Will Arsenal FC win on 2025-11-08?" -> "Arsenal FC".
pub fn clean_team_name(question: &str) -> String {
    let name = question
        .replace("Will ", "")
        .replace(" win on", "")
        .replace('?', "");
    name.split_whitespace()
        .filter(|tok| !is_iso_date(tok))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Build the moneyline from per-outcome Yes/No markets: one "will X win"
/// market per team plus, for sports with draws, a "draw" market. Prices are
/// left unset. `None` unless the full set of markets is present.
pub fn extract_moneyline(markets: &[GammaMarket], has_draw: bool) -> Option<Moneyline> {
    let mut teams: Vec<MoneylineOutcome> = Vec::new();
    let mut draw: Option<MoneylineOutcome> = None;

    for market in markets {
        let question = market.question.to_lowercase();
        let outcomes = market.outcomes();
        let tokens = market.clob_token_ids();
        if outcomes.len() != 2 || tokens.is_empty() {
            continue;
        }
        let yes_token = &tokens[0];

        if has_draw && question.contains("draw") {
            draw = Some(MoneylineOutcome::new("Draw", yes_token.clone()));
        } else if question.contains("win") {
            teams.push(MoneylineOutcome::new(
                clean_team_name(&market.question),
                yes_token.clone(),
            ));
        }
    }

    if teams.len() != 2 {
        return None;
    }
    let away = teams.pop()?;
    let home = teams.pop()?;

    if has_draw {
        let draw = draw?;
        Some(Moneyline {
            has_draw: true,
            outcomes: vec![home, draw, away],
        })
    } else {
        Some(Moneyline {
            has_draw: false,
            outcomes: vec![home, away],
        })
    }
}

fn apply_prices(events: &mut [PricingEvent], prices: &HashMap<String, PriceData>) {
    for moneyline in events.iter_mut().filter_map(|e| e.moneyline.as_mut()) {
        for outcome in &mut moneyline.outcomes {
            if let Some(data) = prices.get(&outcome.token_id) {
                outcome.apply_price(*data);
            }
        }
    }
}

pub struct PolymarketClient {
    http: Client,
    gamma_base: String,
    event_url_base: String,
    page_size: usize,
    max_events: usize,
    sports: Vec<Sport>,
    clob: ClobPriceClient,
}

impl PolymarketClient {
    pub fn new(config: &UpstreamConfig, sports: Vec<Sport>) -> ClientResult<Self> {
        if sports.is_empty() {
            return Err(ClientError::Config("no sports enabled".to_string()));
        }

        let http = Client::builder()
            .user_agent("live-odds-proxy/0.1")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            clob: ClobPriceClient::new(http.clone(), config),
            http,
            gamma_base: config.gamma_api.clone(),
            event_url_base: config.event_url_base.clone(),
            page_size: config.page_size.max(1),
            max_events: config.max_events,
            sports,
        })
    }

    /// Page through `/events?closed=false`. A failing first page is an error;
    /// a failure further in keeps what was already collected.
    pub async fn fetch_open_events(&self) -> ClientResult<Vec<GammaEvent>> {
        let url = join_url(&self.gamma_base, "events");
        let mut all = Vec::new();
        let mut offset = 0;

        while offset < self.max_events {
            let page = self.fetch_page(&url, offset).await;
            let events = match page {
                Ok(events) => events,
                Err(err) if offset == 0 => return Err(err),
                Err(err) => {
                    warn!(
                        target: "upstream",
                        offset,
                        error = %err,
                        "stopping Gamma pagination early"
                    );
                    break;
                }
            };

            let n = events.len();
            all.extend(events);
            if n < self.page_size {
                break;
            }
            offset += self.page_size;
        }

        debug!(target: "upstream", events = all.len(), "fetched open Gamma events");
        Ok(all)
    }

    async fn fetch_page(&self, url: &str, offset: usize) -> ClientResult<Vec<GammaEvent>> {
        let limit = self.page_size.to_string();
        let offset = offset.to_string();
        let resp = self
            .http
            .get(url)
            .query(&[
                ("closed", "false"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    pub fn event_url(&self, event: &GammaEvent) -> String {
        match event.slug.as_deref().filter(|s| !s.is_empty()) {
            Some(slug) => join_url(&self.event_url_base, slug),
            None => join_url(&self.event_url_base, &event.id_string()),
        }
    }

    /// Normalize one event; `None` when its title does not name two teams.
    pub fn build_event(&self, event: &GammaEvent, sport: Sport) -> Option<PricingEvent> {
        let (home_team, away_team) = extract_teams(&event.title)?;
        let start_time = event
            .start_time
            .as_deref()
            .or(event.event_date.as_deref())
            .and_then(parse_timestamp);

        Some(PricingEvent {
            event_id: event.id_string(),
            event_slug: event.slug.clone().unwrap_or_default(),
            title: event.title.clone(),
            sport: sport.name().to_string(),
            home_team,
            away_team,
            start_time,
            polymarket_url: self.event_url(event),
            moneyline: extract_moneyline(&event.markets, sport.has_draw_option()),
        })
    }
}

#[async_trait]
impl PricingSource for PolymarketClient {
    async fn fetch_events(&self) -> ClientResult<PricingBatch> {
        let now = Utc::now();
        let raw = self.fetch_open_events().await?;

        let mut found: BTreeMap<String, usize> = BTreeMap::new();
        let mut events: Vec<PricingEvent> = raw
            .iter()
            .filter_map(|ev| {
                let sport = Sport::classify(&self.sports, ev)?;
                if !is_live_event(ev, now) {
                    return None;
                }
                *found.entry(sport.name().to_string()).or_default() += 1;
                self.build_event(ev, sport)
            })
            .collect();

        let token_ids: HashSet<String> = events
            .iter()
            .filter_map(|e| e.moneyline.as_ref())
            .flat_map(|m| m.token_ids().map(str::to_string))
            .collect();
        let prices = self.clob.bulk_price_data(token_ids).await;
        apply_prices(&mut events, &prices);

        info!(
            target: "upstream",
            source = "polymarket",
            open_events = raw.len(),
            live_events = found.values().sum::<usize>(),
            listed_events = events.len(),
            priced_tokens = prices.len(),
            "pricing fetch complete"
        );
        Ok(PricingBatch::new(events, found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn market(question: &str, tokens: &[&str]) -> GammaMarket {
        serde_json::from_value(json!({
            "question": question,
            "outcomes": "[\"Yes\", \"No\"]",
            "clobTokenIds": serde_json::to_string(tokens).unwrap(),
        }))
        .unwrap()
    }

    #[test]
    fn string_lists_in_both_encodings() {
        assert_eq!(parse_string_list(&json!("[\"Yes\", \"No\"]")), vec!["Yes", "No"]);
        assert_eq!(parse_string_list(&json!(["a", "b"])), vec!["a", "b"]);
        assert_eq!(parse_string_list(&json!([{"name": "Draw"}])), vec!["Draw"]);
        assert_eq!(parse_string_list(&json!("solo")), vec!["solo"]);
        assert!(parse_string_list(&json!("")).is_empty());
        assert!(parse_string_list(&json!(null)).is_empty());
    }

    #[test]
    fn cleans_team_questions() {
        assert_eq!(clean_team_name("Will Arsenal FC win on 2025-11-08?"), "Arsenal FC");
        assert_eq!(clean_team_name("Will Boca Juniors win?"), "Boca Juniors");
    }

    #[test]
    fn moneyline_with_draw_is_ordered_home_draw_away() {
        let markets = vec![
            market("Will Arsenal win on 2025-11-08?", &["t-ars", "n-ars"]),
            market("Will Arsenal vs. Chelsea end in a draw?", &["t-draw", "n-draw"]),
            market("Will Chelsea win on 2025-11-08?", &["t-che", "n-che"]),
        ];
        let ml = extract_moneyline(&markets, true).expect("moneyline");
        assert!(ml.has_draw);
        let names: Vec<_> = ml.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Arsenal", "Draw", "Chelsea"]);
        assert_eq!(ml.outcomes[1].token_id, "t-draw");
        assert!(ml.outcomes.iter().all(|o| o.price.is_none()));
    }

    #[test]
    fn incomplete_moneyline_is_absent() {
        let markets = vec![
            market("Will Arsenal win on 2025-11-08?", &["t-ars", "n-ars"]),
            market("Will Chelsea win on 2025-11-08?", &["t-che", "n-che"]),
        ];
        assert!(extract_moneyline(&markets, true).is_none());
        let two_way = extract_moneyline(&markets, false).expect("two-way moneyline");
        assert_eq!(two_way.outcomes.len(), 2);
        assert!(!two_way.has_draw);
    }

    #[test]
    fn prices_are_applied_by_token() {
        let mut events = vec![PricingEvent {
            event_id: "1".into(),
            event_slug: "s".into(),
            title: "A vs B".into(),
            sport: "NHL".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            start_time: None,
            polymarket_url: String::new(),
            moneyline: Some(Moneyline {
                has_draw: false,
                outcomes: vec![MoneylineOutcome::new("A", "ta"), MoneylineOutcome::new("B", "tb")],
            }),
        }];
        let mut prices = HashMap::new();
        prices.insert(
            "ta".to_string(),
            PriceData {
                price: Some(0.6),
                spread: Some(0.02),
            },
        );
        apply_prices(&mut events, &prices);
        let ml = events[0].moneyline.as_ref().unwrap();
        assert_eq!(ml.outcomes[0].price, Some(0.6));
        assert_eq!(ml.outcomes[1].price, None);
    }

    #[test]
    fn event_ids_from_strings_or_numbers() {
        let ev: GammaEvent = serde_json::from_value(json!({"id": 42, "title": "x"})).unwrap();
        assert_eq!(ev.id_string(), "42");
        let ev: GammaEvent = serde_json::from_value(json!({"id": "abc", "title": "x"})).unwrap();
        assert_eq!(ev.id_string(), "abc");
        let ev: GammaEvent = serde_json::from_value(json!({"title": "x"})).unwrap();
        assert_eq!(ev.id_string(), "");
    }
}
