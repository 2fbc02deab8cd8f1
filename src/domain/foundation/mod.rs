//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the rental ledger.

mod auth;
mod errors;
mod ids;
mod money;
mod state_machine;
mod timestamp;

pub use auth::{AuthenticatedUser, UserRole};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{
    ActionHistoryId, FranchiseId, InstallationRequestId, PaymentId, ProductId, SubscriptionId,
    UserId,
};
pub use money::Money;
pub use state_machine::{StateMachine, TransitionRejected};
pub use timestamp::Timestamp;
