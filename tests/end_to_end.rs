//! End-to-end runs over `ReqwestSender` against a local axum backend.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use resilient_transport::auth::CredentialStore;
use resilient_transport::{ErrorKind, RequestDescriptor, Transport};

mod common;

#[derive(Clone, Default)]
struct Counters {
    flaky: Arc<AtomicUsize>,
    refresh: Arc<AtomicUsize>,
    search: Arc<AtomicUsize>,
}

async fn flaky(State(c): State<Counters>) -> (StatusCode, Json<Value>) {
    if c.flaky.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"message": "warming up"})))
    } else {
        (StatusCode::OK, Json(json!({"status": "ready"})))
    }
}

async fn secure(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer fresh") => (StatusCode::OK, Json(json!({"orders": [1, 2]}))),
        _ => (StatusCode::UNAUTHORIZED, Json(json!({"message": "token expired"}))),
    }
}

async fn refresh(State(c): State<Counters>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    c.refresh.fetch_add(1, Ordering::SeqCst);
    if body["refreshToken"] == "r1" {
        (StatusCode::OK, Json(json!({"accessToken": "fresh", "refreshToken": "r2"})))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "refresh token revoked"})))
    }
}

async fn search(State(c): State<Counters>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    c.search.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    (StatusCode::OK, Json(json!({"request_id": request_id})))
}

async fn missing() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({"error": "customer not found", "id": 42})))
}

async fn start_api(counters: Counters) -> String {
    let app = Router::new()
        .route("/api/health", get(flaky))
        .route("/api/orders", get(secure))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/customers", get(search))
        .route("/api/customers/42", get(missing))
        .with_state(counters);
    let addr = common::start_backend(app).await;
    format!("http://{}/api/", addr)
}

fn client(base_url: String, credentials: Arc<dyn CredentialStore>) -> Transport {
    let mut config = common::test_config();
    config.client.base_url = base_url;
    config.retries.base_delay_ms = 10;

    Transport::builder(config).credentials(credentials).build().unwrap()
}

async fn start(counters: Counters) -> Transport {
    let base_url = start_api(counters).await;
    client(base_url, common::store("stale", "r1"))
}

#[tokio::test]
async fn test_retries_until_backend_recovers() {
    let counters = Counters::default();
    let t = start(counters.clone()).await;

    let body: Value = t.get_json("/health", false).await.unwrap();

    assert_eq!(body["status"], "ready");
    assert_eq!(counters.flaky.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_refreshes_and_replays_over_http() {
    let counters = Counters::default();
    let t = start(counters.clone()).await;

    let (a, b) = tokio::join!(
        t.execute(RequestDescriptor::get("/orders").query("page", "1")),
        t.execute(RequestDescriptor::get("/orders").query("page", "2")),
    );

    assert_eq!(a.unwrap().json::<Value>().unwrap()["orders"][0], 1);
    assert_eq!(b.unwrap().json::<Value>().unwrap()["orders"][1], 2);
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_deduplicated_search_over_http() {
    let counters = Counters::default();
    let t = start(counters.clone()).await;

    let results = futures_util::future::join_all(
        (0..4).map(|_| t.execute(RequestDescriptor::get("/customers").query("region", "north").dedupe(true))),
    )
    .await;

    assert_eq!(counters.search.load(Ordering::SeqCst), 1);
    let bodies: Vec<Value> = results.into_iter().map(|r| r.unwrap().json().unwrap()).collect();
    assert!(bodies.iter().all(|b| b == &bodies[0]));
    assert!(!bodies[0]["request_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_client_error_is_normalized() {
    let t = start(Counters::default()).await;

    let error = t
        .execute(RequestDescriptor::get("/customers/42"))
        .await
        .unwrap_err();

    assert_eq!(error.kind, ErrorKind::Client);
    assert_eq!(error.code, "NOT_FOUND");
    assert_eq!(error.message, "customer not found");
    assert_eq!(error.http_status, Some(404));
    assert_eq!(error.details.unwrap()["id"], 42);
}

#[tokio::test]
async fn test_revoked_refresh_token_expires_session() {
    let counters = Counters::default();
    let base_url = start_api(counters.clone()).await;
    let credentials = common::store("stale", "revoked");
    let t = client(base_url, credentials.clone());

    let error = t.execute(RequestDescriptor::get("/orders")).await.unwrap_err();

    assert_eq!(error.kind, ErrorKind::SessionExpired);
    assert_eq!(error.code, "SESSION_EXPIRED");
    assert!(credentials.access_token().is_none());
    assert_eq!(counters.refresh.load(Ordering::SeqCst), 1);
}
