//! Application layer - command handlers, settlement and notification fan-out.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Both entry points (gateway webhooks and authenticated API calls) end in
//! the same ledger units built by [`settlement`].

pub mod handlers;
pub mod notifier;
pub mod settlement;

pub use handlers::{
    CreateSubscriptionCommand, GetSubscriptionResult, MarkPaymentCompletedCommand,
    MarkPaymentCompletedResult, SubscriptionLifecycleService, TerminateSubscriptionCommand,
    UpdateSubscriptionCommand, UpdateSubscriptionResult, WebhookDispatcher, MAX_COMMIT_ATTEMPTS,
};
pub use notifier::{LedgerNotifier, NotificationKind, NotificationReport};
pub use settlement::{settle_existing_payment, settle_new_charge, Charge, Settlement};
