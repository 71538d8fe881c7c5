use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::failure;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("No status received in time")]
    StatusWaitTimeout,
}

impl GeneratorError {
    fn status_code(&self) -> StatusCode {
        match self {
            GeneratorError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GeneratorError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            GeneratorError::StatusWaitTimeout => StatusCode::REQUEST_TIMEOUT,
        }
    }
}

impl IntoResponse for GeneratorError {
    fn into_response(self) -> Response {
        failure(self.status_code(), self.to_string())
    }
}
