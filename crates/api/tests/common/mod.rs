#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use docjob_core::clock::ManualClock;
use docjob_core::job::DEFAULT_RETENTION;
use docjob_queue::InMemoryJobQueue;
use docjob_store::InMemoryStatusStore;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use docjob_api::config::ServerConfig;
use docjob_api::gateway::JobGateway;
use docjob_api::router::build_app_router;
use docjob_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// The router plus handles on its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStatusStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub clock: Arc<ManualClock>,
}

/// Build the full application router over an in-memory store (on a manual
/// clock) and an in-memory queue.
pub fn build_test_app() -> TestApp {
    build_test_app_with_retention(DEFAULT_RETENTION)
}

pub fn build_test_app_with_retention(retention: Duration) -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(InMemoryStatusStore::with_clock(clock.clone(), retention));
    let queue = Arc::new(InMemoryJobQueue::new());
    let config = test_config();

    let state = AppState {
        gateway: Arc::new(JobGateway::new(store.clone(), queue.clone())),
        store: store.clone(),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        queue,
        clock,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
