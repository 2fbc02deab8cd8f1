//! Razorpay webhook reconciliation.
//!
//! Each verified event is reconciled against the ledger inside a
//! reload-and-retry loop: read current state, decide, commit one unit, and
//! on a version conflict start over from the read.

mod charges;
mod dispatcher;
mod subscription_status;

pub use dispatcher::WebhookDispatcher;
