use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use live_odds_proxy::cache::CacheStore;
use live_odds_proxy::client::{PolymarketClient, SofaScoreClient};
use live_odds_proxy::scheduler::{CycleOutcome, JitterInterval, RefreshScheduler};
use live_odds_proxy::sports::Sport;
use live_odds_proxy::types::UpstreamConfig;
use serde_json::json;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn market(question: &str, yes: &str) -> serde_json::Value {
    json!({
        "question": question,
        "outcomes": "[\"Yes\", \"No\"]",
        "clobTokenIds": format!("[\"{yes}\", \"{yes}-no\"]"),
    })
}

async fn mount_gamma(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "E1",
                "slug": "ars-che",
                "title": "Arsenal FC vs. Chelsea FC",
                "startTime": "2025-01-01T15:00:00Z",
                "markets": [
                    market("Will Arsenal FC win on 2025-01-01?", "h"),
                    market("Will Arsenal FC vs. Chelsea FC end in a draw?", "d"),
                    market("Will Chelsea FC win on 2025-01-01?", "a"),
                ]
            },
            {
                "id": "E2",
                "slug": "lee-new",
                "title": "Leeds United vs. Newcastle United",
                "startTime": "2025-01-01T15:00:00Z",
                "markets": []
            },
            {
                "id": "E3",
                "slug": "ars-special",
                "title": "Arsenal FC: Matchday Special",
                "startTime": "2025-01-01T15:00:00Z",
                "markets": []
            }
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/midpoint"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mid": "0.40"})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/spread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"spread": 0.01})))
        .mount(server)
        .await;
}

async fn mount_sofascore(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/sport/football/events/live"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {
                    "id": 7,
                    "homeTeam": {"name": "Arsenal"},
                    "awayTeam": {"name": "Chelsea"},
                    "homeScore": {"current": 1},
                    "awayScore": {"current": 0},
                    "status": {"description": "1st half"}
                },
                {
                    "id": 8,
                    "homeTeam": {"name": "Real Betis"},
                    "awayTeam": {"name": "Sevilla"},
                    "homeScore": {"current": 0},
                    "awayScore": {"current": 0},
                    "status": {"description": "1st half"}
                }
            ]
        })))
        .mount(server)
        .await;
}

fn config(gamma: &MockServer, sofascore: &MockServer) -> UpstreamConfig {
    UpstreamConfig {
        gamma_api: gamma.uri(),
        clob_api: gamma.uri(),
        sofascore_api: sofascore.uri(),
        fetch_momentum: false,
        max_retries: 0,
        ..UpstreamConfig::default()
    }
}

fn scheduler(store: Arc<CacheStore>, cfg: &UpstreamConfig) -> RefreshScheduler {
    RefreshScheduler::new(
        store,
        Arc::new(PolymarketClient::new(cfg, vec![Sport::Soccer]).unwrap()),
        Arc::new(SofaScoreClient::new(cfg).unwrap()),
        JitterInterval::new(Duration::from_secs(30), Duration::from_secs(60)),
    )
}

#[tokio::test]
async fn cycle_merges_both_upstreams_into_one_snapshot() {
    let gamma = MockServer::start().await;
    let sofascore = MockServer::start().await;
    mount_gamma(&gamma).await;
    mount_sofascore(&sofascore).await;

    let store = Arc::new(CacheStore::new());
    let outcome = scheduler(store.clone(), &config(&gamma, &sofascore))
        .refresh_once()
        .await;
    assert_eq!(outcome, CycleOutcome::Published { total_games: 2, partial: false });

    let snap = store.read().into_snapshot(Utc::now());
    let soccer = &snap.sports()["Soccer"];
    // E3 is live soccer but names no opponent, so it is found and not listed.
    assert_eq!(soccer.total_found(), 3);
    assert_eq!(soccer.games().len(), 2);
    assert_eq!(soccer.total_live(), 1);
    assert!(snap.find("E3").is_none());

    let e1 = snap.find("E1").unwrap();
    let live = e1.live_data.as_ref().expect("fuzzy-matched live data");
    assert_eq!(live.home_score, Some(1));
    let ml = e1.moneyline.as_ref().unwrap();
    assert!(ml.outcomes.iter().all(|o| o.price == Some(0.40) && o.spread == Some(0.01)));

    let e2 = snap.find("E2").unwrap();
    assert!(e2.live_data.is_none());
    assert!(e2.moneyline.is_none());
}

#[tokio::test]
async fn stats_outage_still_publishes_pricing() {
    let gamma = MockServer::start().await;
    let sofascore = MockServer::start().await;
    mount_gamma(&gamma).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&sofascore)
        .await;

    let store = Arc::new(CacheStore::new());
    let outcome = scheduler(store.clone(), &config(&gamma, &sofascore))
        .refresh_once()
        .await;
    assert_eq!(outcome, CycleOutcome::Published { total_games: 2, partial: true });

    let state = store.refresh_state();
    assert!(state.source_errors.contains_key("stats"));
    assert!(state.last_error.is_none());
    assert!(store
        .read()
        .into_snapshot(Utc::now())
        .games()
        .all(|g| g.live_data.is_none()));
}

#[tokio::test]
async fn momentum_is_fetched_only_for_matched_games() {
    let gamma = MockServer::start().await;
    let sofascore = MockServer::start().await;
    mount_gamma(&gamma).await;
    mount_sofascore(&sofascore).await;
    Mock::given(method("GET"))
        .and(path("/event/7/graph"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "graphPoints": [{"minute": 10, "value": 30}]
        })))
        .expect(1)
        .mount(&sofascore)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/event/7/(statistics|comments)$"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&sofascore)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/event/8/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&sofascore)
        .await;

    let cfg = UpstreamConfig {
        fetch_momentum: true,
        ..config(&gamma, &sofascore)
    };
    let store = Arc::new(CacheStore::new());
    let outcome = scheduler(store.clone(), &cfg).refresh_once().await;
    assert_eq!(outcome, CycleOutcome::Published { total_games: 2, partial: false });

    let snap = store.read().into_snapshot(Utc::now());
    let live = snap.find("E1").unwrap().live_data.as_ref().unwrap();
    assert_eq!(live.momentum.as_ref().unwrap().momentum_value, Some(30));
}
