//! JSON error bodies and the mapping from lifecycle errors to responses.

use axum::{
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::domain::subscription::SubscriptionError;

/// Error body returned by every API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// API error type that converts lifecycle errors to HTTP responses.
#[derive(Debug)]
pub struct ApiError(pub SubscriptionError);

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self(SubscriptionError::Validation(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        // Storage details stay in the logs.
        let message = match &self.0 {
            SubscriptionError::Store(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse::new(self.0.code().to_string(), message);
        (status, Json(body)).into_response()
    }
}
