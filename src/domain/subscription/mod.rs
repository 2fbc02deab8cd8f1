//! Subscription domain - rental subscriptions and their billing periods.

mod aggregate;
mod billing;
mod connect_id;
mod errors;
mod status;

pub use aggregate::{
    GatewayTransition, NewSubscription, StatusChange, Subscription, SubscriptionChanges,
};
pub use billing::{BillingPeriod, BILLING_INTERVAL_MONTHS};
pub use connect_id::ConnectId;
pub use errors::SubscriptionError;
pub use status::SubscriptionStatus;

#[cfg(test)]
pub(crate) use aggregate::test_support;
