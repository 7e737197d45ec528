use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use live_odds_proxy::auth::{Authenticator, TokenAuthenticator};
use live_odds_proxy::cache::{CacheStore, CycleReport, Snapshot, SportGroup};
use live_odds_proxy::models::{EventRecord, LiveData};
use live_odds_proxy::server::{self, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

struct TestServer {
    base: String,
    store: Arc<CacheStore>,
    auth: Arc<TokenAuthenticator>,
    http: reqwest::Client,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start() -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let store = Arc::new(CacheStore::new());
    let auth = Arc::new(TokenAuthenticator::new("admin", "hunter2", b"test-secret", Duration::days(7)));
    let shutdown = CancellationToken::new();

    let state = AppState::new(store.clone(), auth.clone());
    tokio::spawn(server::serve(listener, state, shutdown.clone()));

    TestServer {
        base,
        store,
        auth,
        http: reqwest::Client::new(),
        shutdown,
    }
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn token(&self) -> String {
        let body: Value = self
            .http
            .post(self.url("/api/login"))
            .json(&json!({"username": "admin", "password": "hunter2"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        body["token"].as_str().unwrap().to_string()
    }
}

fn game(id: &str, score: Option<(u32, u32)>) -> EventRecord {
    EventRecord {
        event_id: id.to_string(),
        event_slug: id.to_lowercase(),
        title: format!("{id} home vs. {id} away"),
        sport: "Soccer".to_string(),
        home_team: format!("{id} home"),
        away_team: format!("{id} away"),
        start_time: None,
        polymarket_url: format!("https://polymarket.com/event/{}", id.to_lowercase()),
        moneyline: None,
        live_data: score.map(|(h, a)| LiveData {
            home_score: Some(h),
            away_score: Some(a),
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = start().await;
    let resp = srv.http.get(srv.url("/api/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "live-odds-proxy");
    assert_eq!(srv.store.read_count(), 0);
}

#[tokio::test]
async fn login_issues_a_usable_token() {
    let srv = start().await;

    let resp = srv
        .http
        .post(srv.url("/api/login"))
        .json(&json!({"username": "admin", "password": "hunter2"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let token = body["token"].as_str().expect("token");
    assert!(body["expires_at"].is_string());
    assert_eq!(srv.auth.verify(token).unwrap().username, "admin");

    let verify: Value = srv
        .http
        .get(srv.url("/api/verify"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(verify, json!({"valid": true, "username": "admin"}));
}

#[tokio::test]
async fn login_with_bad_credentials_is_401() {
    let srv = start().await;
    let resp = srv
        .http
        .post(srv.url("/api/login"))
        .json(&json!({"username": "admin", "password": "wrong"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid username or password");
}

#[tokio::test]
async fn unreadable_login_bodies_get_a_json_error() {
    let srv = start().await;

    let not_json = srv
        .http
        .post(srv.url("/api/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let missing_field = srv
        .http
        .post(srv.url("/api/login"))
        .json(&json!({"username": "admin"}))
        .send()
        .await
        .unwrap();
    let no_content_type = srv
        .http
        .post(srv.url("/api/login"))
        .body(r#"{"username": "admin", "password": "hunter2"}"#)
        .send()
        .await
        .unwrap();

    for (resp, status) in [(not_json, 400), (missing_field, 422), (no_content_type, 415)] {
        assert_eq!(resp.status(), status);
        let body: Value = resp.json().await.expect("JSON error body");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()), "{body}");
    }
}

#[tokio::test]
async fn live_games_before_first_refresh_is_empty() {
    let srv = start().await;
    let token = srv.token().await;

    let resp = srv
        .http
        .get(srv.url("/api/live-games"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["sports"], json!({}));
    assert_eq!(body["total_games"], 0);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn live_games_serves_published_snapshot() {
    let srv = start().await;
    let token = srv.token().await;

    let mut sports = BTreeMap::new();
    sports.insert(
        "Soccer".to_string(),
        SportGroup::new(vec![game("E1", Some((1, 0))), game("E2", None)], 3),
    );
    srv.store
        .publish(Snapshot::new(Utc::now(), sports), &CycleReport::default());

    let body: Value = srv
        .http
        .get(srv.url("/api/live-games"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["total_games"], 2);
    assert_eq!(body["generation"], 1);
    let soccer = &body["sports"]["Soccer"];
    assert_eq!(soccer["total_found"], 3);
    assert_eq!(soccer["total_live"], 1);
    let games = soccer["games"].as_array().unwrap();
    assert_eq!(games[0]["event_id"], "E1");
    assert_eq!(games[0]["live_data"]["home_score"], 1);
    assert!(games[1]["live_data"].is_null());
}

#[tokio::test]
async fn rejected_requests_never_reach_the_store() {
    let srv = start().await;
    let expired = srv
        .auth
        .issue_at("admin", Utc::now() - Duration::days(8))
        .unwrap()
        .token;

    let cases: Vec<(Option<String>, &str)> = vec![
        (None, "No authorization token provided"),
        (Some("Token abc".to_string()), "Invalid authorization header format"),
        (Some("Bearer not-a-token".to_string()), "Invalid token"),
        (Some(format!("Bearer {expired}")), "Token expired"),
    ];

    for (header, expected) in cases {
        let mut req = srv.http.get(srv.url("/api/live-games"));
        if let Some(h) = header {
            req = req.header("Authorization", h);
        }
        let resp = req.send().await.unwrap();
        assert_eq!(resp.status(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["error"], expected);
    }

    assert_eq!(srv.store.read_count(), 0);
}

#[tokio::test]
async fn refresh_status_reports_failures() {
    let srv = start().await;
    let token = srv.token().await;
    srv.store
        .record_failure("all upstream sources failed", &CycleReport::default());

    let body: Value = srv
        .http
        .get(srv.url("/api/refresh-status"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["last_error"], "all upstream sources failed");
    assert_eq!(body["consecutive_failures"], 1);
    assert!(body["last_success_at"].is_null());
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let srv = start().await;
    let resp = srv.http.get(srv.url("/api/nope")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}
