//! HTTP round trips through the router, executing real scripts.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use nsjail_python_sandbox_rs::server::{build_router, ServerConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(dir: &tempfile::TempDir, timeout: Duration) -> Option<Router> {
    let sandbox = common::direct_sandbox(dir.path(), timeout)?;
    Some(build_router(Arc::new(sandbox), &ServerConfig::default()))
}

async fn execute(router: Router, script: &str) -> (StatusCode, Value) {
    let body = json!({ "script": script }).to_string();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/execute")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_execute_success() {
    let dir = tempfile::tempdir().unwrap();
    let Some(router) = router(&dir, Duration::from_secs(15)) else {
        return;
    };

    let (status, body) = execute(router, "def main():\n    return {\"sum\": 2+2}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": {"sum": 4}, "stdout": ""}));
}

#[tokio::test]
async fn test_execute_with_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let Some(router) = router(&dir, Duration::from_secs(15)) else {
        return;
    };

    let (status, body) = execute(router, "def main():\n    print(\"hi\")\n    return 1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"result": 1, "stdout": "hi"}));
}

#[tokio::test]
async fn test_execute_exception_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let Some(router) = router(&dir, Duration::from_secs(15)) else {
        return;
    };

    let (status, body) = execute(router, "def main():\n    raise KeyError('missing')").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "main() raised KeyError: 'missing'"}));
    assert_eq!(common::leftover_files(dir.path()), 0);
}

#[tokio::test]
async fn test_execute_timeout_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let Some(router) = router(&dir, Duration::from_millis(500)) else {
        return;
    };

    let (status, body) = execute(router, "def main():\n    while True: pass").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Script execution timed out (500ms)"}));
}

#[tokio::test]
async fn test_error_bodies_carry_no_host_paths() {
    let dir = tempfile::tempdir().unwrap();
    let Some(router) = router(&dir, Duration::from_secs(15)) else {
        return;
    };

    let (status, body) = execute(router, "def main():\n    return open('/nonexistent/x').read()").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("main() raised FileNotFoundError"), "got {}", error);
    assert!(!error.contains("Traceback"));
    assert!(!error.contains(dir.path().to_str().unwrap()));
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn test_body_over_limit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let Some(sandbox) = common::direct_sandbox(dir.path(), Duration::from_secs(15)) else {
        return;
    };
    let config = ServerConfig::new().with_max_body_size(64);
    let router = build_router(Arc::new(sandbox), &config);

    let script = format!("def main():\n    return '{}'", "x".repeat(200));
    let body = json!({ "script": script }).to_string();
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/execute")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(common::leftover_files(dir.path()), 0);
}
