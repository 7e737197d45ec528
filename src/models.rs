//! Record types for both upstream sources and the merged per-event view.
//!
//! Every field that an upstream may not supply is an `Option`; absent data is
//! serialized as `null` so clients can tell "no quote" or "no score yet" apart
//! from a real zero.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price and spread for a single outcome token, both in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub price: Option<f64>,
    pub spread: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoneylineOutcome {
    pub name: String,
    pub token_id: String,
    pub price: Option<f64>,
    pub spread: Option<f64>,
}

impl MoneylineOutcome {
    pub fn new(name: impl Into<String>, token_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token_id: token_id.into(),
            price: None,
            spread: None,
        }
    }

    pub fn apply_price(&mut self, data: PriceData) {
        self.price = data.price;
        self.spread = data.spread;
    }
}

/// Moneyline market: home, (draw,) away.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Moneyline {
    pub has_draw: bool,
    pub outcomes: Vec<MoneylineOutcome>,
}

impl Moneyline {
    pub fn token_ids(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().map(|o| o.token_id.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MomentumDirection {
    Home,
    Away,
    Neutral,
}

/// One point of the pressure graph; positive values favour the home side.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub minute: f64,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameComment {
    pub text: String,
    pub event_type: String,
    pub is_home: bool,
    pub time: i64,
    pub player_name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Momentum {
    pub possession_home: Option<u32>,
    pub possession_away: Option<u32>,
    pub attacks_home: Option<u32>,
    pub attacks_away: Option<u32>,
    pub dangerous_attacks_home: Option<u32>,
    pub dangerous_attacks_away: Option<u32>,
    pub momentum_direction: Option<MomentumDirection>,
    pub momentum_value: Option<i64>,
    pub momentum_graph: Option<Vec<GraphPoint>>,
    pub recent_comments: Option<Vec<GameComment>>,
}

impl Momentum {
    pub fn has_data(&self) -> bool {
        self.possession_home.is_some()
            || self.attacks_home.is_some()
            || self.dangerous_attacks_home.is_some()
            || self.momentum_value.is_some()
            || self.recent_comments.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveData {
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub current_minute: Option<u32>,
    pub status: Option<String>,
    pub momentum: Option<Momentum>,
}

/// Normalized event from the pricing source. This source decides which
/// events exist in a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct PricingEvent {
    pub event_id: String,
    pub event_slug: String,
    pub title: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: Option<DateTime<Utc>>,
    pub polymarket_url: String,
    pub moneyline: Option<Moneyline>,
}

/// One pricing fetch: the events to list plus, per sport name, how many
/// live events the source classified before dropping unusable ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PricingBatch {
    pub events: Vec<PricingEvent>,
    pub found: BTreeMap<String, usize>,
}

impl PricingBatch {
    pub fn new(events: Vec<PricingEvent>, found: BTreeMap<String, usize>) -> Self {
        Self { events, found }
    }

    pub fn found_for(&self, sport: &str) -> usize {
        self.found.get(sport).copied().unwrap_or_default()
    }
}

/// Counts every event as found.
impl From<Vec<PricingEvent>> for PricingBatch {
    fn from(events: Vec<PricingEvent>) -> Self {
        let mut found = BTreeMap::new();
        for event in &events {
            *found.entry(event.sport.clone()).or_default() += 1;
        }
        Self { events, found }
    }
}

/// Normalized live match from the stats source.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsRecord {
    /// Pricing-source event id this record is known to belong to, if any.
    pub event_ref: Option<String>,
    /// Stats-source identifier of the match.
    pub source_id: Option<i64>,
    pub home_team: String,
    pub away_team: String,
    pub live: LiveData,
}

impl StatsRecord {
    pub fn has_teams(&self) -> bool {
        !self.home_team.trim().is_empty() && !self.away_team.trim().is_empty()
    }
}

/// One sporting event's merged view as served to clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: String,
    pub event_slug: String,
    pub title: String,
    pub sport: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: Option<DateTime<Utc>>,
    pub polymarket_url: String,
    pub moneyline: Option<Moneyline>,
    pub live_data: Option<LiveData>,
}

impl EventRecord {
    pub fn from_parts(pricing: &PricingEvent, live: Option<&LiveData>) -> Self {
        Self {
            event_id: pricing.event_id.clone(),
            event_slug: pricing.event_slug.clone(),
            title: pricing.title.clone(),
            sport: pricing.sport.clone(),
            home_team: pricing.home_team.clone(),
            away_team: pricing.away_team.clone(),
            start_time: pricing.start_time,
            polymarket_url: pricing.polymarket_url.clone(),
            moneyline: pricing.moneyline.clone(),
            live_data: live.cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_live_data_serializes_as_null() {
        let pricing = PricingEvent {
            event_id: "E1".into(),
            event_slug: "a-vs-b".into(),
            title: "A vs B".into(),
            sport: "Soccer".into(),
            home_team: "A".into(),
            away_team: "B".into(),
            start_time: None,
            polymarket_url: "https://polymarket.com/event/a-vs-b".into(),
            moneyline: None,
        };
        let record = EventRecord::from_parts(&pricing, None);
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["live_data"].is_null());
        assert!(json["moneyline"].is_null());
    }

    #[test]
    fn missing_score_is_not_zero() {
        let live = LiveData::default();
        let json = serde_json::to_value(&live).unwrap();
        assert!(json["home_score"].is_null());
        assert_ne!(json["home_score"], serde_json::json!(0));
    }

    #[test]
    fn momentum_without_any_signal_has_no_data() {
        let mut m = Momentum::default();
        assert!(!m.has_data());
        m.momentum_value = Some(0);
        assert!(m.has_data());
    }
}
