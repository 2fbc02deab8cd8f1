//! Audit domain - the append-only action history.
//!
//! Every status change on a subscription or payment is documented by exactly
//! one [`ActionHistory`] row written in the same ledger unit as the change.

mod action_history;

pub use action_history::{ActionHistory, ActionType, Actor, SYSTEM_ACTOR};
