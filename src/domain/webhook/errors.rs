//! Webhook error types for Razorpay webhook handling.
//!
//! The status code decides whether the gateway retries:
//! - 2xx: acknowledged, no retry
//! - 4xx: rejected, no retry
//! - 5xx: server error, the gateway will redeliver

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
///
/// A missing local record or an unhandled event type is not an error; those
/// are reported as [`super::WebhookOutcome`] values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// No `x-razorpay-signature` header on the request.
    #[error("Missing signature")]
    MissingSignature,

    /// Signature did not match the body.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The webhook secret is not configured on this server.
    #[error("Webhook secret not configured")]
    SecretNotConfigured,

    /// Body is not the expected JSON envelope.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A field the event needs is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Ledger read or write failed.
    #[error("Storage error: {0}")]
    Store(String),
}

impl WebhookError {
    /// True if the gateway should redeliver the event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Store(_))
    }

    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::MissingSignature
            | WebhookError::InvalidSignature
            | WebhookError::Parse(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            WebhookError::SecretNotConfigured | WebhookError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
