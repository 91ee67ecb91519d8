//! API error handling with structured responses

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::SessionError;

/// API error type with structured responses
#[derive(Debug, Error)]
pub enum ApiError {
    /// Unknown agent
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Malformed or invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Anything the caller cannot fix
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Structured error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            Self::Internal(msg) => log::error!("API error {code}: {msg}"),
            _ => log::debug!("Client error {code}: {message}"),
        }

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(agent_id) => Self::NotFound(format!("Agent {agent_id}")),
            SessionError::EmptyPrompt => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;
