//! Unified JSON response envelope used by every endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;

/// `{status, message, data}` envelope returned by all handlers.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub status: bool,
    pub message: String,
    pub data: Value,
}

pub fn envelope(code: StatusCode, status: bool, message: impl Into<String>, data: Value) -> Response {
    (
        code,
        Json(ApiResponse {
            status,
            message: message.into(),
            data,
        }),
    )
        .into_response()
}

/// 200 envelope with `status: true`.
pub fn success(message: impl Into<String>, data: Value) -> Response {
    envelope(StatusCode::OK, true, message, data)
}

/// Error envelope with `status: false` and null data.
pub fn failure(code: StatusCode, message: impl Into<String>) -> Response {
    envelope(code, false, message, Value::Null)
}
