// Integration tests for `TokenManager` using wiremock.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use llumin_api::{Error, TokenManager};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, TokenManager) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let manager = TokenManager::new(
        &base,
        "svc-account",
        "hunter2".to_string().into(),
        reqwest::Client::new(),
    )
    .unwrap();
    (server, manager)
}

fn token_mock(token: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/api/GetToken"))
        .respond_with(ResponseTemplate::new(200).set_body_string(token))
}

// ── Acquisition ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_acquires_and_caches_token() {
    let (server, manager) = setup().await;

    token_mock("tok-1").expect(1).mount(&server).await;

    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-1");
    // Second call must reuse the cached token (expect(1) verifies on drop).
    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-1");
}

#[tokio::test]
async fn test_sends_credentials_as_json() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/GetToken"))
        .and(body_json(serde_json::json!({
            "username": "svc-account",
            "password": "hunter2",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("tok-1"))
        .expect(1)
        .mount(&server)
        .await;

    manager.ensure_valid().await.unwrap();
}

#[tokio::test]
async fn test_quoted_token_body_is_stripped() {
    let (server, manager) = setup().await;

    token_mock("\"tok-quoted\"").mount(&server).await;

    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-quoted");
}

// ── Single-flight coalescing ────────────────────────────────────────

#[tokio::test]
async fn test_concurrent_callers_share_one_request() {
    let (server, manager) = setup().await;
    let manager = Arc::new(manager);

    Mock::given(method("POST"))
        .and(path("/api/GetToken"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("tok-shared")
                .set_delay(std::time::Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let m = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { m.ensure_valid().await }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "tok-shared");
    }
}

// ── Failure & recovery ──────────────────────────────────────────────

#[tokio::test]
async fn test_failed_acquisition_retries_on_next_call() {
    let (server, manager) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/GetToken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    token_mock("tok-after-retry").mount(&server).await;

    let first = manager.ensure_valid().await;
    assert!(
        matches!(first, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {first:?}"
    );

    // No cooldown: the very next call attempts a fresh acquisition.
    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-after-retry");
}

#[tokio::test]
async fn test_empty_token_body_is_an_error() {
    let (server, manager) = setup().await;

    token_mock("").mount(&server).await;

    let result = manager.ensure_valid().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_invalidate_forces_reacquisition() {
    let (server, manager) = setup().await;

    token_mock("tok-old").up_to_n_times(1).mount(&server).await;
    token_mock("tok-new").mount(&server).await;

    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-old");

    manager.invalidate().await;
    assert_eq!(manager.ensure_valid().await.unwrap(), "tok-new");
}
