//! Behaviour of the client core against a scripted transport
//!
//! Time-dependent tests run on tokio's paused clock, so backoff delays are
//! measured exactly and cost no wall-clock time.

use std::sync::Arc;
use std::time::Duration;

use campus_core::http::context::{AUTHORIZATION, CLIENT_VERSION, CONTENT_TYPE, PLATFORM, REQUEST_ID};
use campus_core::http::{CallError, Method, MutationRetry, RetryPolicy, ScriptedTransport};
use campus_core::services::{AuthService, StudentService};
use campus_core::store::{TOKEN_KEY, USER_KEY};
use campus_core::{ApiClient, ClientConfig, CredentialStore, Environment, MemoryCredentialStore};
use serde_json::json;

const BASE_DELAY: Duration = Duration::from_millis(100);

fn config() -> ClientConfig {
    ClientConfig::for_environment(Environment::Staging)
        .with_retry_policy(RetryPolicy::default().with_base_delay(BASE_DELAY))
}

fn client_with(
    transport: Arc<ScriptedTransport>,
    store: Arc<MemoryCredentialStore>,
) -> ApiClient {
    ApiClient::builder(config())
        .transport(transport)
        .credential_store(store)
        .build()
        .unwrap()
}

fn client(transport: Arc<ScriptedTransport>) -> ApiClient {
    client_with(transport, Arc::new(MemoryCredentialStore::new()))
}

#[tokio::test(start_paused = true)]
async fn terminal_statuses_are_not_retried() {
    for status in [400u16, 401, 403, 404, 422, 500, 503] {
        let transport = ScriptedTransport::new();
        transport.respond(status, json!({}));

        let err = client(transport.clone()).get("students").await.unwrap_err();
        let normalized = err.normalized().expect("normalized failure");
        assert_eq!(normalized.status, i32::from(status));
        assert!(!normalized.is_network_error);
        assert_eq!(transport.attempts(), 1, "status {status} was retried");
    }
}

#[tokio::test(start_paused = true)]
async fn network_failure_is_retried_three_times() {
    let transport = ScriptedTransport::new();
    for _ in 0..4 {
        transport.drop_connection();
    }

    let err = client(transport.clone()).get("attendance").await.unwrap_err();
    assert_eq!(err.status(), Some(0));
    assert!(err.is_network_error());
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_backs_off_with_increasing_delays() {
    let transport = ScriptedTransport::new();
    transport
        .respond(429, json!({"message": "slow down"}))
        .respond(429, json!({"message": "slow down"}))
        .respond(429, json!({"message": "slow down"}))
        .respond(200, json!({"ok": true}));

    let body = client(transport.clone()).get("fees").await.unwrap();
    assert_eq!(body, json!({"ok": true}));

    let times = transport.attempt_times();
    assert_eq!(times.len(), 4);
    let gaps: Vec<Duration> = times.windows(2).map(|w| w[1] - w[0]).collect();
    assert!(gaps[0] >= BASE_DELAY, "{gaps:?}");
    assert!(gaps.windows(2).all(|w| w[1] > w[0]), "{gaps:?}");
}

#[tokio::test(start_paused = true)]
async fn rate_limit_budget_exhausts() {
    let transport = ScriptedTransport::new();
    for _ in 0..5 {
        transport.respond(429, json!({"message": "slow down"}));
    }

    let err = client(transport.clone()).get("fees").await.unwrap_err();
    let normalized = err.normalized().unwrap();
    assert_eq!(normalized.status, 429);
    assert_eq!(normalized.message, "slow down");
    assert_eq!(transport.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn idempotent_only_policy_does_not_retry_posts() {
    let transport = ScriptedTransport::new();
    transport.drop_connection().drop_connection();

    let config = ClientConfig::for_environment(Environment::Staging).with_retry_policy(
        RetryPolicy::default()
            .with_base_delay(BASE_DELAY)
            .with_mutation_retry(MutationRetry::IdempotentOnly),
    );
    let client = ApiClient::builder(config)
        .transport(transport.clone())
        .build()
        .unwrap();

    let err = client
        .post("fees/payments", &json!({"amount": 100}))
        .await
        .unwrap_err();
    assert!(err.is_network_error());
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn headers_contract() {
    let transport = ScriptedTransport::new();
    transport.respond(200, json!([])).respond(200, json!([]));
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with(transport.clone(), store.clone());

    client.get("students").await.unwrap();
    store.set(TOKEN_KEY, "abc123").await.unwrap();
    client.get("students").await.unwrap();

    let requests = transport.requests();
    assert!(requests[0].header(AUTHORIZATION).is_none());
    assert_eq!(requests[1].header(AUTHORIZATION), Some("Bearer abc123"));
    for request in &requests {
        assert!(request.header(REQUEST_ID).is_some());
        assert_eq!(request.header(PLATFORM), Some("mobile"));
        assert_eq!(request.header(CLIENT_VERSION), Some(campus_core::VERSION));
        assert_eq!(request.header(CONTENT_TYPE), Some("application/json"));
    }
    assert_ne!(requests[0].header(REQUEST_ID), requests[1].header(REQUEST_ID));
}

#[tokio::test(start_paused = true)]
async fn unauthorized_clears_session_and_is_still_surfaced() {
    let transport = ScriptedTransport::new();
    transport
        .respond(401, json!({"message": "Token expired"}))
        .respond(200, json!([]));
    let store = Arc::new(MemoryCredentialStore::new());
    store.set(TOKEN_KEY, "stale").await.unwrap();
    store.set(USER_KEY, r#"{"id":1}"#).await.unwrap();
    let client = client_with(transport.clone(), store.clone());

    let err = client.get("students").await.unwrap_err();
    let normalized = err.normalized().unwrap();
    assert_eq!(normalized.status, 401);
    assert_eq!(normalized.message, "Token expired");
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(USER_KEY).await.unwrap(), None);

    client.get("students").await.unwrap();
    assert!(transport.requests()[1].header(AUTHORIZATION).is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_retries() {
    let transport = ScriptedTransport::new();
    for _ in 0..4 {
        transport.drop_connection();
    }
    let pending = client(transport.clone()).call(Method::GET, "students").spawn();

    while transport.attempts() == 0 {
        tokio::task::yield_now().await;
    }
    pending.cancel();
    assert_eq!(pending.wait().await, Err(CallError::Cancelled));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_while_in_flight() {
    let transport = ScriptedTransport::new();
    transport.hang();
    let call = client(transport.clone()).call(Method::GET, "students");
    let handle = call.cancel_handle();

    let (result, _) = tokio::join!(call.send(), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
    });
    assert_eq!(result, Err(CallError::Cancelled));
    assert_eq!(transport.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_settlement_is_a_no_op() {
    let transport = ScriptedTransport::new();
    transport.respond(200, json!({"id": 7}));
    let pending = client(transport).call(Method::GET, "students/7").spawn();
    let handle = pending.cancel_handle();

    assert_eq!(pending.wait().await, Ok(json!({"id": 7})));
    handle.cancel();
    handle.cancel();
    assert!(handle.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn login_then_expiry_scenario() {
    let transport = ScriptedTransport::new();
    transport
        .respond(200, json!({"access_token": "T", "user": {"id": 1}}))
        .respond(401, json!({"message": "Unauthenticated."}))
        .respond(200, json!([]));
    let store = Arc::new(MemoryCredentialStore::new());
    let client = client_with(transport.clone(), store.clone());
    let auth = AuthService::new(client.clone());
    let students = StudentService::new(client);

    auth.login("a@b.com", "pw").await.unwrap();
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("T"));

    let err = students.list(&[]).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);

    students.list(&[]).await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].header(AUTHORIZATION), Some("Bearer T"));
    assert!(requests[2].header(AUTHORIZATION).is_none());
}
