//! Router-level tests for the generator HTTP surface.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use logsim_generator::config::GeneratorConfig;
use logsim_generator::controller::TaskController;
use logsim_generator::handlers::{create_router, AppState};
use logsim_generator::shipper::Shipper;

fn test_app() -> axum::Router {
    let config = Arc::new(GeneratorConfig::default());
    // unroutable parser endpoint: shipping fails fast, which is fine here
    let shipper = Arc::new(Shipper::new("http://127.0.0.1:1/logs").unwrap());
    let controller = Arc::new(TaskController::new(shipper));
    create_router(AppState { config, controller })
}

async fn read_envelope(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_live() {
    let app = test_app();
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["message"], "Server 8080 is live");
    assert_eq!(envelope["data"], Value::Null);
}

#[tokio::test]
async fn invalid_unit_is_rejected() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/logs", r#"{"num_logs":10,"time":"xyz"}"#))
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope["status"], false);
    assert_eq!(
        envelope["message"],
        "Invalid unit. Use s, m, or h for unit variable"
    );
    assert_eq!(envelope["data"], Value::Null);
}

#[tokio::test]
async fn non_positive_rate_is_rejected() {
    let app = test_app();
    let response = app
        .oneshot(post_json("/logs", r#"{"num_logs":0,"time":"s"}"#))
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(envelope["status"], false);
}

#[tokio::test]
async fn wrong_method_gets_envelope_405() {
    let app = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/logs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(envelope["status"], false);
    assert_eq!(envelope["message"], "Only POST method allowed");
}

#[tokio::test]
async fn start_status_stop_lifecycle() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(post_json("/logs", r#"{"num_logs":2,"time":"s"}"#))
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["message"], "Task is in progress...");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/logs/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (_, envelope) = read_envelope(response).await;
    assert_eq!(envelope["data"]["active"], true);
    assert_eq!(envelope["data"]["rate"], 2);
    assert_eq!(envelope["data"]["unit"], "s");

    let response = app
        .clone()
        .oneshot(post_json("/logs/stop", ""))
        .await
        .unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["message"], "Task stopped");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/logs/status")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (_, envelope) = read_envelope(response).await;
    assert_eq!(envelope["data"]["active"], false);
}

#[tokio::test]
async fn missing_body_falls_back_to_config_defaults() {
    let app = test_app();
    // defaults are rate=10 unit=s, so an empty body still starts a task
    let response = app.clone().oneshot(post_json("/logs", "")).await.unwrap();
    let (status, envelope) = read_envelope(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(envelope["message"], "Task is in progress...");

    let _ = app.oneshot(post_json("/logs/stop", "")).await.unwrap();
}
