//! HTTP surface for the generator service.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GeneratorConfig;
use crate::controller::{RateUnit, TaskController};
use crate::response::{failure, success};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GeneratorConfig>,
    pub controller: Arc<TaskController>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub num_logs: Option<i64>,
    #[serde(rename = "time")]
    pub unit: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    let alive_path = state.config.alive_path.clone();
    let start_path = state.config.start_path.clone();
    let base = start_path.trim_end_matches('/').to_string();

    Router::new()
        .route(&alive_path, any(is_alive))
        .route(&start_path, any(start_task))
        .route(&format!("{}/stop", base), any(stop_task))
        .route(&format!("{}/status", base), any(task_status))
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> Response {
    failure(axum::http::StatusCode::NOT_FOUND, "Resource not found")
}

async fn is_alive(State(state): State<AppState>) -> Response {
    debug!("health check hit");
    success(
        format!("Server {} is live", state.config.port),
        Value::Null,
    )
}

async fn start_task(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return failure(
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            "Only POST method allowed",
        );
    }

    let payload: StartRequest = if body.is_empty() {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body).unwrap_or_default()
    };

    // requested values win; each field falls back independently to the last
    // started task, then to the configured defaults
    let last = state.controller.last_configured().await;
    let rate = payload
        .num_logs
        .or(last.map(|(rate, _)| rate))
        .or((state.config.rate > 0).then_some(state.config.rate));
    let unit = payload
        .unit
        .or(last.map(|(_, unit)| unit.as_str().to_string()))
        .or((!state.config.unit.is_empty()).then(|| state.config.unit.clone()));

    let (rate, unit) = match (rate, unit) {
        (Some(rate), Some(unit)) => (rate, unit),
        (Some(_), None) => {
            return failure(
                axum::http::StatusCode::BAD_REQUEST,
                "Invalid unit. Use s, m, or h for unit variable",
            )
        }
        _ => {
            return failure(
                axum::http::StatusCode::BAD_REQUEST,
                "Rate and unit are missing",
            )
        }
    };
    let Some(unit) = RateUnit::parse(&unit) else {
        return failure(
            axum::http::StatusCode::BAD_REQUEST,
            "Invalid unit. Use s, m, or h for unit variable",
        );
    };
    if rate <= 0 {
        return failure(
            axum::http::StatusCode::BAD_REQUEST,
            "Rate must be a positive number of logs",
        );
    }

    match state.controller.start(rate, unit).await {
        Ok(message) => success(message, Value::Null),
        Err(e) => e.into_response(),
    }
}

async fn stop_task(State(state): State<AppState>, method: Method) -> Response {
    if method != Method::POST {
        return failure(
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            "Only POST method allowed",
        );
    }
    let stopped = state.controller.stop().await;
    let message = if stopped { "Task stopped" } else { "No active task" };
    success(message, Value::Null)
}

async fn task_status(State(state): State<AppState>, method: Method) -> Response {
    if method != Method::GET {
        return failure(
            axum::http::StatusCode::METHOD_NOT_ALLOWED,
            "Only GET method allowed",
        );
    }
    let status = state.controller.status().await;
    success("Task status", json!(status))
}
