//! Integration tests for the authenticated MediTrack client

use meditrack_client::client::REFRESH_PATH;
use meditrack_client::{
    ApiClient, CallbackRedirect, ClientError, ErrorKind, FileTokenStore, MemoryTokenStore,
    TokenKey, TokenStore,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

struct Harness {
    server: MockServer,
    store: Arc<MemoryTokenStore>,
    redirects: Arc<AtomicUsize>,
    client: ApiClient,
}

async fn harness(access: Option<&str>, refresh: Option<&str>, coalesce: bool) -> Harness {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_tokens(access, refresh));
    let redirects = Arc::new(AtomicUsize::new(0));
    let counter = redirects.clone();

    let client = ApiClient::builder()
        .base_url(server.uri())
        .store(store.clone())
        .redirect(Arc::new(CallbackRedirect::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .coalesce_refresh(coalesce)
        .build()
        .unwrap();

    Harness {
        server,
        store,
        redirects,
        client,
    }
}

fn no_auth_header(request: &Request) -> bool {
    !request.headers.contains_key("authorization")
}

#[tokio::test]
async fn test_bearer_header_matches_stored_token() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "username": "ana" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let profile: Value = h.client.get("/api/profile/").await.unwrap();
    assert_eq!(profile["username"], "ana");
}

#[tokio::test]
async fn test_no_header_without_token() {
    let h = harness(None, None, false).await;
    Mock::given(method("GET"))
        .and(path("/api/doctors/"))
        .and(no_auth_header)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&h.server)
        .await;

    let doctors: Vec<Value> = h.client.get("/api/doctors/").await.unwrap();
    assert!(doctors.is_empty());
}

/// 401, refresh with R1, replay with A2, caller sees the 200
#[tokio::test]
async fn test_refresh_and_replay_is_transparent() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token_not_valid"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({ "refresh": "R1" })))
        .and(no_auth_header)
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let profile: Value = h.client.get("/api/profile/").await.unwrap();
    assert_eq!(profile["id"], 7);
    assert_eq!(h.store.get(TokenKey::Access).as_deref(), Some("A2"));
    assert_eq!(h.store.get(TokenKey::Refresh).as_deref(), Some("R1"));
    assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_replay_body_is_resent() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    let body = json!({ "doctor": 3, "date": "2025-01-02" });
    Mock::given(method("POST"))
        .and(path("/api/appointments/create/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/appointments/create/"))
        .and(header("authorization", "Bearer A2"))
        .and(body_json(&body))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 99 })))
        .expect(1)
        .mount(&h.server)
        .await;

    let created: Value = h
        .client
        .post("/api/appointments/create/", &body)
        .await
        .unwrap();
    assert_eq!(created["id"], 99);
}

/// A replay that is rejected again must not trigger a second refresh
#[tokio::test]
async fn test_single_refresh_and_single_replay() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/emergencies/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/emergencies/").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed(_)));
    assert_eq!(err.kind(), ErrorKind::AuthorizationExpired);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
}

/// The refresh token itself is rejected
#[tokio::test]
async fn test_rejected_refresh_clears_tokens_and_redirects() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("token expired"))
        .expect(1)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/profile/").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RefreshInvalid);
    let ClientError::RefreshFailed(source) = err else {
        panic!("expected RefreshFailed");
    };
    assert!(source.is_auth_expired());

    assert_eq!(h.store.get(TokenKey::Access), None);
    assert_eq!(h.store.get(TokenKey::Refresh), None);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_endpoint_error_tears_down() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    // Refresh endpoint is not mounted: wiremock answers 404
    let err = h.client.get::<Value>("/api/profile/").await.unwrap_err();

    assert!(matches!(err, ClientError::RefreshFailed(_)));
    assert_eq!(h.store.get(TokenKey::Access), None);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refresh_transport_failure_tears_down() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::with_tokens(Some("A1"), Some("R1")));
    let redirects = Arc::new(AtomicUsize::new(0));
    let counter = redirects.clone();
    let client = ApiClient::builder()
        .base_url(server.uri())
        .store(store.clone())
        .redirect(Arc::new(CallbackRedirect::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "A2" }))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client.get::<Value>("/api/profile/").await.unwrap_err();
    let ClientError::RefreshFailed(source) = err else {
        panic!("expected RefreshFailed");
    };
    assert!(matches!(*source, ClientError::Request(_)));

    assert_eq!(store.get(TokenKey::Access), None);
    assert_eq!(store.get(TokenKey::Refresh), None);
    assert_eq!(redirects.load(Ordering::SeqCst), 1);
}

/// No refresh token means no refresh call at all
#[tokio::test]
async fn test_missing_refresh_token_skips_refresh_call() {
    let h = harness(Some("A1"), None, false).await;
    Mock::given(method("GET"))
        .and(path("/api/profile/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/profile/").await.unwrap_err();
    assert!(err.is_auth_expired());
    assert_eq!(h.store.get(TokenKey::Access), None);
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
}

/// Server errors are passed through untouched
#[tokio::test]
async fn test_server_error_is_not_intercepted() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/appointments/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
        .expect(1)
        .mount(&h.server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    let err = h.client.get::<Value>("/api/appointments/").await.unwrap_err();
    match err {
        ClientError::ServerError { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "database down");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(h.store.get(TokenKey::Access).as_deref(), Some("A1"));
    assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_forbidden_and_not_found_pass_through() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(path("/api/emergencies/4/"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&h.server)
        .await;
    Mock::given(path("/api/emergencies/5/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.server)
        .await;
    Mock::given(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    assert!(matches!(
        h.client.get::<Value>("/api/emergencies/4/").await,
        Err(ClientError::Forbidden(_))
    ));
    assert!(matches!(
        h.client.get::<Value>("/api/emergencies/5/").await,
        Err(ClientError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_failures_refresh_independently_by_default() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(2)
        .mount(&h.server)
        .await;

    let (a, b) = tokio::join!(
        h.client.get::<Value>("/api/profile/"),
        h.client.get::<Value>("/api/doctors/")
    );
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn test_coalesced_refresh_is_shared() {
    let h = harness(Some("A1"), Some("R1"), true).await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b, c) = tokio::join!(
        h.client.get::<Value>("/api/profile/"),
        h.client.get::<Value>("/api/doctors/"),
        h.client.get::<Value>("/api/appointments/")
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(h.store.get(TokenKey::Access).as_deref(), Some("A2"));
}

#[tokio::test]
async fn test_coalesced_teardown_redirects_once() {
    let h = harness(Some("A1"), Some("R1"), true).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&h.server)
        .await;

    let (a, b) = tokio::join!(
        h.client.get::<Value>("/api/profile/"),
        h.client.get::<Value>("/api/doctors/")
    );
    assert!(a.is_err() && b.is_err());
    assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_refreshed_token_is_persisted_to_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let tokens = dir.path().join("tokens.json");
    let store = Arc::new(FileTokenStore::open(&tokens).unwrap());
    store.set(TokenKey::Access, "A1");
    store.set(TokenKey::Refresh, "R1");

    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/notes/delete/3/"))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "A2" })))
        .mount(&server)
        .await;

    let client = ApiClient::builder()
        .base_url(server.uri())
        .store(store)
        .build()
        .unwrap();
    client.delete("/api/notes/delete/3/").await.unwrap();

    let reopened = FileTokenStore::open(&tokens).unwrap();
    assert_eq!(reopened.get(TokenKey::Access).as_deref(), Some("A2"));
    assert_eq!(reopened.get(TokenKey::Refresh).as_deref(), Some("R1"));
}

#[tokio::test]
async fn test_chat_history_goes_through_pipeline() {
    let h = harness(Some("A1"), Some("R1"), false).await;
    Mock::given(method("GET"))
        .and(path("/api/chatbot/history/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [
                { "message": "and now?", "ai_response": "rest" },
                { "message": "headache", "ai_response": "hydrate" }
            ]
        })))
        .mount(&h.server)
        .await;

    let transcript = h.client.chat_history().await.unwrap();
    let texts: Vec<&str> = transcript.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["headache", "hydrate", "and now?", "rest"]);
}
