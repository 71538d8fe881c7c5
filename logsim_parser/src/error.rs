use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::failure;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    MethodNotAllowed(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Failed to connect to Database!")]
    StoreUnavailable,

    #[error("{0}")]
    StoreOperation(String),

    #[error("Delete requires at least one filter")]
    DeleteRequiresFilter,
}

impl ParserError {
    fn status_code(&self) -> StatusCode {
        match self {
            ParserError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ParserError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ParserError::NotFound => StatusCode::NOT_FOUND,
            ParserError::StoreUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
            ParserError::StoreOperation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ParserError::DeleteRequiresFilter => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<sqlx::Error> for ParserError {
    fn from(e: sqlx::Error) -> Self {
        ParserError::StoreOperation(format!("Failed to query database: {}", e))
    }
}

impl IntoResponse for ParserError {
    fn into_response(self) -> Response {
        failure(self.status_code(), self.to_string())
    }
}
