//! Application handlers.
//!
//! Command handlers that orchestrate domain operations over the ports.
//!
//! - `webhook` - Razorpay event reconciliation
//! - `subscription` - Authenticated subscription lifecycle commands

pub mod subscription;
pub mod webhook;

/// Reload-and-retry bound for a unit rejected by the version check.
pub const MAX_COMMIT_ATTEMPTS: u32 = 3;

pub use subscription::{
    CreateSubscriptionCommand, GetSubscriptionResult, MarkPaymentCompletedCommand,
    MarkPaymentCompletedResult, SubscriptionLifecycleService, TerminateSubscriptionCommand,
    UpdateSubscriptionCommand, UpdateSubscriptionResult,
};
pub use webhook::WebhookDispatcher;
