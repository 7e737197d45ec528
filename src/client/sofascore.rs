//! SofaScore live feed: scores, match minute and momentum for in-play games.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::models::{GameComment, GraphPoint, LiveData, Momentum, StatsRecord};
use crate::types::UpstreamConfig;
use crate::utils::math::{direction_from_stats, direction_from_value, weighted_momentum};
use crate::utils::time::game_minute;

use super::{ensure_success, join_url, ClientError, ClientResult, StatsSource};

const FINISHED_STATUS_TERMS: [&str; 5] = [
    "finished",
    "ended",
    "full time",
    "after extra time",
    "after penalties",
];

#[derive(Debug, Default, Deserialize)]
struct SofaTeam {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct SofaScoreLine {
    #[serde(default)]
    current: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SofaStatus {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SofaTime {
    #[serde(default, rename = "currentPeriodStartTimestamp")]
    current_period_start: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SofaEvent {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, rename = "homeTeam")]
    home_team: SofaTeam,
    #[serde(default, rename = "awayTeam")]
    away_team: SofaTeam,
    #[serde(default, rename = "homeScore")]
    home_score: SofaScoreLine,
    #[serde(default, rename = "awayScore")]
    away_score: SofaScoreLine,
    #[serde(default)]
    status: SofaStatus,
    #[serde(default)]
    time: SofaTime,
}

#[derive(Debug, Deserialize)]
struct LiveEventsResponse {
    #[serde(default)]
    events: Option<Vec<SofaEvent>>,
}

#[derive(Debug, Deserialize)]
struct GraphResponse {
    #[serde(default, rename = "graphPoints")]
    graph_points: Vec<GraphPoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsResponse {
    #[serde(default)]
    statistics: Vec<PeriodStatistics>,
}

#[derive(Debug, Deserialize)]
struct PeriodStatistics {
    #[serde(default)]
    period: String,
    #[serde(default)]
    groups: Vec<StatisticsGroup>,
}

#[derive(Debug, Deserialize)]
struct StatisticsGroup {
    #[serde(default, rename = "statisticsItems")]
    items: Vec<StatisticsItem>,
}

#[derive(Debug, Deserialize)]
struct StatisticsItem {
    #[serde(default)]
    key: String,
    #[serde(default, rename = "homeValue")]
    home_value: Option<serde_json::Value>,
    #[serde(default, rename = "awayValue")]
    away_value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CommentsResponse {
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    #[serde(default)]
    text: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default, rename = "isHome")]
    is_home: bool,
    #[serde(default)]
    time: i64,
    #[serde(default)]
    player: Option<RawPlayer>,
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    #[serde(default, rename = "shortName")]
    short_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl From<RawComment> for GameComment {
    fn from(raw: RawComment) -> Self {
        let player_name = raw.player.and_then(|p| p.short_name.or(p.name));
        Self {
            text: raw.text,
            event_type: raw.kind.unwrap_or_else(|| "unknown".to_string()),
            is_home: raw.is_home,
            time: raw.time,
            player_name,
        }
    }
}

fn stat_value(v: &Option<serde_json::Value>) -> Option<u32> {
    v.as_ref()?.as_f64().filter(|f| *f >= 0.0).map(|f| f as u32)
}

fn is_finished(status: &str) -> bool {
    let status = status.to_lowercase();
    FINISHED_STATUS_TERMS.iter().any(|t| status.contains(t))
}

/// Combine graph, match statistics and comments into one momentum block.
/// `None` when none of them yielded anything.
pub fn build_momentum(
    graph: Option<Vec<GraphPoint>>,
    statistics: Option<StatisticsResponse>,
    comments: Option<Vec<GameComment>>,
) -> Option<Momentum> {
    let mut m = Momentum::default();

    if let Some(points) = graph.filter(|p| !p.is_empty()) {
        if let Some(value) = weighted_momentum(&points) {
            m.momentum_value = Some(value);
            m.momentum_direction = Some(direction_from_value(value));
        }
        m.momentum_graph = Some(points);
    }

    let whole_match = statistics
        .into_iter()
        .flat_map(|s| s.statistics)
        .filter(|p| p.period == "ALL");
    for item in whole_match.flat_map(|p| p.groups).flat_map(|g| g.items) {
        let (Some(home), Some(away)) = (stat_value(&item.home_value), stat_value(&item.away_value))
        else {
            continue;
        };
        match item.key.as_str() {
            "ballPossession" => {
                m.possession_home = Some(home);
                m.possession_away = Some(away);
            }
            "attacks" => {
                m.attacks_home = Some(home);
                m.attacks_away = Some(away);
            }
            "dangerousAttacks" => {
                m.dangerous_attacks_home = Some(home);
                m.dangerous_attacks_away = Some(away);
            }
            _ => {}
        }
    }

    if let Some(comments) = comments.filter(|c| !c.is_empty()) {
        m.recent_comments = Some(comments);
    }

    if m.momentum_direction.is_none() && m.possession_home.is_some() {
        m.momentum_direction = Some(direction_from_stats(&m));
    }

    m.has_data().then_some(m)
}

pub struct SofaScoreClient {
    http: Client,
    base_url: String,
    detail_timeout: Duration,
    concurrency: usize,
    fetch_momentum: bool,
    comment_limit: usize,
}

impl SofaScoreClient {
    pub fn new(config: &UpstreamConfig) -> ClientResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.sofascore.com"));
        headers.insert(REFERER, HeaderValue::from_static("https://www.sofascore.com/"));

        let http = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            http,
            base_url: config.sofascore_api.clone(),
            detail_timeout: Duration::from_secs(config.detail_timeout_secs),
            concurrency: config.concurrency.max(1),
            fetch_momentum: config.fetch_momentum,
            comment_limit: config.comment_limit,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, timeout: Option<Duration>) -> ClientResult<T> {
        let mut req = self.http.get(join_url(&self.base_url, path));
        if let Some(timeout) = timeout {
            req = req.timeout(timeout);
        }
        let resp = ensure_success(req.send().await?).await?;
        Ok(resp.json().await?)
    }

    pub async fn fetch_live_events(&self) -> ClientResult<Vec<SofaEvent>> {
        let resp: LiveEventsResponse = self.get_json("sport/football/events/live", None).await?;
        resp.events
            .ok_or_else(|| ClientError::Shape("live events response missing 'events'".to_string()))
    }

    pub async fn fetch_comments(&self, event_id: i64) -> ClientResult<Vec<GameComment>> {
        let resp: CommentsResponse = self
            .get_json(&format!("event/{event_id}/comments"), Some(self.detail_timeout))
            .await?;
        Ok(resp
            .comments
            .into_iter()
            .take(self.comment_limit)
            .map(GameComment::from)
            .collect())
    }

    /// Graph, statistics and comments for one match; each is best effort.
    pub async fn fetch_momentum(&self, event_id: i64) -> Option<Momentum> {
        let graph_path = format!("event/{event_id}/graph");
        let statistics_path = format!("event/{event_id}/statistics");
        let (graph, statistics, comments) = tokio::join!(
            self.get_json::<GraphResponse>(&graph_path, Some(self.detail_timeout)),
            self.get_json::<StatisticsResponse>(
                &statistics_path,
                Some(self.detail_timeout)
            ),
            self.fetch_comments(event_id),
        );

        for (what, err) in [
            ("graph", graph.as_ref().err()),
            ("statistics", statistics.as_ref().err()),
            ("comments", comments.as_ref().err()),
        ] {
            if let Some(err) = err {
                debug!(target: "upstream", event_id, part = what, error = %err, "momentum detail unavailable");
            }
        }

        build_momentum(
            graph.ok().map(|g| g.graph_points),
            statistics.ok(),
            comments.ok(),
        )
    }

    fn to_record(event: SofaEvent, now: DateTime<Utc>) -> StatsRecord {
        let status = event.status.description;
        let current_minute = event
            .time
            .current_period_start
            .and_then(|start| game_minute(start, status.as_deref().unwrap_or_default(), now));

        StatsRecord {
            event_ref: None,
            source_id: event.id,
            home_team: event.home_team.name,
            away_team: event.away_team.name,
            live: LiveData {
                home_score: event.home_score.current,
                away_score: event.away_score.current,
                current_minute,
                status,
                momentum: None,
            },
        }
    }
}

#[async_trait]
impl StatsSource for SofaScoreClient {
    async fn fetch_live(&self) -> ClientResult<Vec<StatsRecord>> {
        let now = Utc::now();
        let events = self.fetch_live_events().await?;
        let total = events.len();

        let records: Vec<StatsRecord> = events
            .into_iter()
            .filter(|e| {
                !e.status
                    .description
                    .as_deref()
                    .map(is_finished)
                    .unwrap_or(false)
            })
            .map(|ev| Self::to_record(ev, now))
            .collect();

        info!(
            target: "upstream",
            source = "sofascore",
            live_events = total,
            records = records.len(),
            "stats fetch complete"
        );
        Ok(records)
    }

    /// Momentum for the listed records only, at most `concurrency` matches
    /// at a time.
    async fn attach_details(&self, records: &mut [StatsRecord], matched: &[usize]) {
        if !self.fetch_momentum {
            return;
        }
        let wanted: Vec<(usize, i64)> = matched
            .iter()
            .filter_map(|&i| Some((i, records.get(i)?.source_id?)))
            .collect();
        let requested = wanted.len();

        let details: Vec<(usize, Option<Momentum>)> = stream::iter(wanted)
            .map(|(i, id)| async move { (i, self.fetch_momentum(id).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut attached = 0;
        for (i, momentum) in details {
            if momentum.is_some() {
                attached += 1;
            }
            records[i].live.momentum = momentum;
        }
        debug!(target: "upstream", source = "sofascore", requested, attached, "momentum details fetched");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MomentumDirection;
    use serde_json::json;

    #[test]
    fn momentum_from_graph_and_stats() {
        let graph = vec![
            GraphPoint { minute: 1.0, value: 20.0 },
            GraphPoint { minute: 2.0, value: 30.0 },
        ];
        let stats: StatisticsResponse = serde_json::from_value(json!({
            "statistics": [
                {"period": "1ST", "groups": [{"statisticsItems": [
                    {"key": "ballPossession", "homeValue": 90, "awayValue": 10}
                ]}]},
                {"period": "ALL", "groups": [{"statisticsItems": [
                    {"key": "ballPossession", "homeValue": 55, "awayValue": 45},
                    {"key": "attacks", "homeValue": 15, "awayValue": 8},
                    {"key": "dangerousAttacks", "homeValue": 5, "awayValue": null}
                ]}]}
            ]
        }))
        .unwrap();

        let m = build_momentum(Some(graph), Some(stats), None).expect("momentum");
        // (20*1 + 30*2) / 3 = 26
        assert_eq!(m.momentum_value, Some(26));
        assert_eq!(m.momentum_direction, Some(MomentumDirection::Home));
        assert_eq!(m.possession_home, Some(55));
        assert_eq!(m.attacks_away, Some(8));
        assert_eq!(m.dangerous_attacks_home, None);
        assert!(m.recent_comments.is_none());
    }

    #[test]
    fn stats_only_momentum_uses_fallback_direction() {
        let stats: StatisticsResponse = serde_json::from_value(json!({
            "statistics": [{"period": "ALL", "groups": [{"statisticsItems": [
                {"key": "ballPossession", "homeValue": 30, "awayValue": 70},
                {"key": "attacks", "homeValue": 4, "awayValue": 12}
            ]}]}]
        }))
        .unwrap();
        let m = build_momentum(None, Some(stats), None).expect("momentum");
        assert_eq!(m.momentum_direction, Some(MomentumDirection::Away));
        assert!(m.momentum_value.is_none());
    }

    #[test]
    fn nothing_yields_no_momentum() {
        assert!(build_momentum(Some(vec![]), None, Some(vec![])).is_none());
    }

    #[test]
    fn comment_conversion_prefers_short_name() {
        let raw: RawComment = serde_json::from_value(json!({
            "text": "Goal!", "type": "goal", "isHome": true, "time": 34,
            "player": {"shortName": "B. Saka", "name": "Bukayo Saka"}
        }))
        .unwrap();
        let c = GameComment::from(raw);
        assert_eq!(c.player_name.as_deref(), Some("B. Saka"));
        assert_eq!(c.event_type, "goal");

        let bare: RawComment = serde_json::from_value(json!({"text": "Kick-off"})).unwrap();
        assert_eq!(GameComment::from(bare).event_type, "unknown");
    }

    #[test]
    fn finished_statuses() {
        assert!(is_finished("Ended"));
        assert!(is_finished("AP - After penalties"));
        assert!(!is_finished("2nd half"));
    }
}
