//! Tests for the HTTP routes
//!
//! Requests are driven straight into the router with `oneshot`, no socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;
use txkv::config::SyncStrategy;
use txkv::http::build_router;
use txkv::{Config, Engine};

fn setup() -> (TempDir, Arc<Engine>, Router) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .file_backend(temp_dir.path().join("transaction.log"), SyncStrategy::EveryWrite)
        .build();
    let engine = Arc::new(Engine::open(config).unwrap());
    let app = build_router(Arc::clone(&engine));
    (temp_dir, engine, app)
}

fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(body.into())
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_put_then_get() {
    let (_temp, engine, app) = setup();

    let response = app
        .clone()
        .oneshot(request("PUT", "/v1/greeting", "hello world"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/v1/greeting", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "hello world");

    assert_eq!(engine.get("greeting").unwrap(), "hello world");
}

#[tokio::test]
async fn test_get_missing_key() {
    let (_temp, _engine, app) = setup();

    let response = app
        .oneshot(request("GET", "/v1/missing", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete() {
    let (_temp, engine, app) = setup();
    engine.put("doomed", "v").unwrap();

    let response = app
        .clone()
        .oneshot(request("DELETE", "/v1/doomed", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request("DELETE", "/v1/doomed", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert!(!engine.store().contains_key("doomed"));
}

#[tokio::test]
async fn test_put_rejects_non_utf8_body() {
    let (_temp, engine, app) = setup();

    let response = app
        .oneshot(request("PUT", "/v1/bin", vec![0xff_u8, 0xfe, 0x00]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(engine.store().is_empty());
}

#[tokio::test]
async fn test_put_empty_value() {
    let (_temp, engine, app) = setup();

    let response = app
        .oneshot(request("PUT", "/v1/empty", Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(engine.get("empty").unwrap(), "");
}

#[tokio::test]
async fn test_healthz_reports_status() {
    let (_temp, engine, app) = setup();
    engine.put("a", "1").unwrap();
    engine.put("b", "2").unwrap();

    let response = app
        .oneshot(request("GET", "/healthz", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let status: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(status["status"], "ok");
    assert_eq!(status["keys"], 2);
    assert_eq!(status["logger"], "running");
    assert!(status["failure"].is_null());
}

#[tokio::test]
async fn test_put_after_close_is_server_error() {
    let (_temp, engine, app) = setup();
    engine.close().unwrap();

    let response = app
        .oneshot(request("PUT", "/v1/late", "v"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_puts_under_backpressure() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .file_backend(temp_dir.path().join("transaction.log"), SyncStrategy::EveryWrite)
        .queue_capacity(1)
        .build();
    let engine = Arc::new(Engine::open(config).unwrap());
    let app = build_router(Arc::clone(&engine));

    // Far more requests than worker threads, all contending for one queue slot
    let requests: Vec<_> = (0..64)
        .map(|i| {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(request("PUT", &format!("/v1/k{i}"), format!("v{i}")))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    for handle in requests {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(request("GET", "/healthz", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    engine.close().unwrap();
    assert_eq!(engine.store().len(), 64);
    assert_eq!(engine.logger().last_sequence(), 64);
}
