//! Subscription lifecycle errors.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound / PaymentNotFound / InstallationNotFound | 404 |
//! | Forbidden | 403 |
//! | InvalidTransition | 409 |
//! | ConcurrentModification | 409 |
//! | Validation | 400 |
//! | InstallationNotCompleted | 400 |
//! | Gateway | 502 |
//! | Store | 500 |

use axum::http::StatusCode;
use thiserror::Error;

use super::SubscriptionStatus;
use crate::domain::foundation::{
    DomainError, ErrorCode, InstallationRequestId, PaymentId, SubscriptionId, ValidationError,
};

/// Errors raised by the subscription lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    #[error("Subscription not found: {0}")]
    NotFound(SubscriptionId),

    #[error("Payment not found: {0}")]
    PaymentNotFound(PaymentId),

    #[error("Installation request not found: {0}")]
    InstallationNotFound(InstallationRequestId),

    #[error("Installation request {0} is not completed")]
    InstallationNotCompleted(InstallationRequestId),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Cannot {action} subscription in status {current}")]
    InvalidTransition {
        action: &'static str,
        current: SubscriptionStatus,
    },

    #[error("Subscription {0} was modified concurrently")]
    ConcurrentModification(SubscriptionId),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Storage error: {0}")]
    Store(String),
}

impl SubscriptionError {
    pub fn invalid_transition(action: &'static str, current: SubscriptionStatus) -> Self {
        SubscriptionError::InvalidTransition { action, current }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        SubscriptionError::Forbidden(reason.into())
    }

    /// Returns the foundation error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) => ErrorCode::SubscriptionNotFound,
            SubscriptionError::PaymentNotFound(_) => ErrorCode::PaymentNotFound,
            SubscriptionError::InstallationNotFound(_) => ErrorCode::InstallationNotFound,
            SubscriptionError::InstallationNotCompleted(_) => ErrorCode::InstallationNotCompleted,
            SubscriptionError::Forbidden(_) => ErrorCode::Forbidden,
            SubscriptionError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::ConcurrentModification(_) => ErrorCode::ConcurrentModification,
            SubscriptionError::Validation(_) => ErrorCode::ValidationFailed,
            SubscriptionError::Gateway(_) => ErrorCode::PaymentGatewayError,
            SubscriptionError::Store(_) => ErrorCode::DatabaseError,
        }
    }

    /// Maps the error to an HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::NotFound(_)
            | SubscriptionError::PaymentNotFound(_)
            | SubscriptionError::InstallationNotFound(_) => StatusCode::NOT_FOUND,
            SubscriptionError::Forbidden(_) => StatusCode::FORBIDDEN,
            SubscriptionError::InvalidTransition { .. }
            | SubscriptionError::ConcurrentModification(_) => StatusCode::CONFLICT,
            SubscriptionError::Validation(_) | SubscriptionError::InstallationNotCompleted(_) => {
                StatusCode::BAD_REQUEST
            }
            SubscriptionError::Gateway(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_is_conflict() {
        let err = SubscriptionError::invalid_transition("resume", SubscriptionStatus::Active);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Cannot resume subscription in status ACTIVE");
    }

    #[test]
    fn validation_and_installation_state_are_bad_request() {
        let err: SubscriptionError = ValidationError::empty_field("plan_name").into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = SubscriptionError::InstallationNotCompleted(InstallationRequestId::new());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn existence_and_authorization_are_distinguished() {
        assert_eq!(
            SubscriptionError::NotFound(SubscriptionId::new()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SubscriptionError::forbidden("not yours").status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn gateway_failure_is_bad_gateway() {
        let err = SubscriptionError::Gateway("timeout".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.code(), ErrorCode::PaymentGatewayError);
    }

    #[test]
    fn store_failure_is_server_error() {
        let err = SubscriptionError::Store("connection reset".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
