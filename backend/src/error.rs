//! Application error types and result alias.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application result type alias
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
///
/// A resolution that finds nothing is not an error: it is reported as
/// `ResolutionResult::NotFound`. `NotFound` here is reserved for operations
/// whose target must exist (undeleting a trashed file, an unknown repository).
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error (missing repository descriptor, bad routing pattern, cycle)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found error
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Path traversal attempt or malformed coordinate
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Conflict error (undelete destination occupied, release redeploy)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Remote proxy unreachable or answered with an unexpected status
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote proxy fetch exceeded its configured timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Group traversal exceeded the maximum nesting depth
    #[error("Group cycle detected: {0}")]
    CycleDetected(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authorization error
    #[error("Access denied: {0}")]
    Authorization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Address parse error
    #[error("Address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code and HTTP status for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidPath(_) => (StatusCode::BAD_REQUEST, "INVALID_PATH"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::Transport(_) => (StatusCode::BAD_GATEWAY, "TRANSPORT_ERROR"),
            AppError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            AppError::CycleDetected(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CYCLE_DETECTED"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            AppError::AddrParse(_) => (StatusCode::INTERNAL_SERVER_ERROR, "ADDR_PARSE_ERROR"),
            AppError::Json(_) => (StatusCode::BAD_REQUEST, "JSON_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::Io(_) => "IO operation failed".to_string(),
            AppError::AddrParse(_) => "Invalid address".to_string(),
            AppError::Json(_) => "Invalid JSON".to_string(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, code = code, "Request error");
        } else {
            tracing::debug!(error = %self, code = code, "Request rejected");
        }

        let body = Json(json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}
