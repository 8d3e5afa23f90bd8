//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engram_core::error::EngramError;
use serde::Serialize;
use thiserror::Error;

/// API error type.
#[derive(Debug, Error)]
#[error("[{status}] {code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<EngramError> for ApiError {
    fn from(err: EngramError) -> Self {
        let status = match &err {
            EngramError::InvalidQuery { .. } | EngramError::Validation { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngramError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngramError::AllSignalsUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut api = ApiError::new(status, err.code().as_str(), err.to_string());
        match &err {
            EngramError::AllSignalsUnavailable { failures, .. } => {
                api = api.with_details(serde_json::json!({ "failures": failures }));
            }
            _ => {
                if let Some(suggestion) = err.suggestion() {
                    api = api.with_details(serde_json::json!({ "suggestion": suggestion }));
                }
            }
        }
        api
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
