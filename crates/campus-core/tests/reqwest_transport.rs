//! End-to-end tests of the reqwest transport against a local mock backend

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use campus_core::services::{AuthService, StudentService};
use campus_core::store::{TOKEN_KEY, USER_KEY};
use campus_core::{
    ApiClient, ClientConfig, CredentialStore, Environment, FileCredentialStore, RetryPolicy,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Backend {
    student_requests: Arc<Mutex<Vec<HeaderMap>>>,
    flaky_hits: Arc<AtomicUsize>,
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] == "pw" {
        (
            StatusCode::OK,
            Json(json!({"access_token": "T", "user": {"id": 1, "name": "Admin"}})),
        )
    } else {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "errors": {"password": ["The password is incorrect."]}
            })),
        )
    }
}

/// Any bearer is treated as expired; anonymous callers get an empty list.
async fn students(State(backend): State<Backend>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let authorized = headers.contains_key("authorization");
    backend.student_requests.lock().unwrap().push(headers);
    if authorized {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Token expired"})))
    } else {
        (StatusCode::OK, Json(json!([])))
    }
}

async fn flaky(State(backend): State<Backend>) -> (StatusCode, Json<Value>) {
    if backend.flaky_hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::TOO_MANY_REQUESTS, Json(json!({})))
    } else {
        (StatusCode::OK, Json(json!({"ok": true})))
    }
}

async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/students", get(students))
        .route("/api/v1/flaky", get(flaky))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config(origin: &str) -> ClientConfig {
    ClientConfig::for_environment(Environment::Development)
        .with_origin(origin)
        .unwrap()
        .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(10)))
}

#[tokio::test]
async fn login_then_expired_token_over_http() {
    let backend = Backend::default();
    let origin = spawn_backend(backend.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileCredentialStore::new(dir.path()));
    let client = ApiClient::new(config(&origin), store.clone()).unwrap();
    let auth = AuthService::new(client.clone());
    let students = StudentService::new(client);

    let login = auth.login("a@b.com", "pw").await.unwrap();
    assert_eq!(login.access_token, "T");
    assert_eq!(store.get(TOKEN_KEY).await.unwrap().as_deref(), Some("T"));

    let err = students.list(&[]).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(store.get(TOKEN_KEY).await.unwrap(), None);
    assert_eq!(store.get(USER_KEY).await.unwrap(), None);

    assert_eq!(students.list(&[]).await.unwrap(), json!([]));

    let seen = backend.student_requests.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].get("authorization").unwrap(), "Bearer T");
    assert_eq!(seen[0].get("x-platform").unwrap(), "mobile");
    assert!(seen[0].get("x-request-id").is_some());
    assert!(seen[1].get("authorization").is_none());
}

#[tokio::test]
async fn validation_errors_reach_the_caller() {
    let origin = spawn_backend(Backend::default()).await;
    let client = ApiClient::builder(config(&origin)).build().unwrap();

    let err = AuthService::new(client)
        .login("a@b.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(422));

    let campus_core::services::ServiceError::Call(call) = err else {
        panic!("expected a call failure");
    };
    let normalized = call.normalized().unwrap();
    assert_eq!(normalized.message, "The given data was invalid.");
    assert_eq!(
        normalized.validation_errors,
        Some(json!({"password": ["The password is incorrect."]}))
    );
}

#[tokio::test]
async fn rate_limited_call_recovers() {
    let backend = Backend::default();
    let origin = spawn_backend(backend.clone()).await;
    let client = ApiClient::builder(config(&origin)).build().unwrap();

    assert_eq!(client.get("flaky").await.unwrap(), json!({"ok": true}));
    assert_eq!(backend.flaky_hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unknown_route_is_not_retried() {
    let origin = spawn_backend(Backend::default()).await;
    let client = ApiClient::builder(config(&origin)).build().unwrap();

    let err = client.get("missing").await.unwrap_err();
    let normalized = err.normalized().unwrap();
    assert_eq!(normalized.status, 404);
    assert!(!normalized.is_network_error);
}

#[tokio::test]
async fn caller_paths_stay_under_the_api_prefix() {
    let backend = Backend::default();
    let origin = spawn_backend(backend.clone()).await;
    let store = Arc::new(campus_core::MemoryCredentialStore::new());
    store.set(TOKEN_KEY, "T").await.unwrap();
    let client = ApiClient::new(config(&origin), store).unwrap();

    let err = StudentService::new(client.clone())
        .get("../../students")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(-1));

    let err = client.get(&format!("{origin}/api/v1/students")).await.unwrap_err();
    assert_eq!(err.status(), Some(-1));
    assert!(!err.is_network_error());

    assert!(backend.student_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = ApiClient::builder(config(&origin)).build().unwrap();
    let err = client.get("students").await.unwrap_err();
    let normalized = err.normalized().unwrap();
    assert_eq!(normalized.status, 0);
    assert!(normalized.is_network_error);
}
