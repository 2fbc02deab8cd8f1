//! Rental Ledger - Subscription and payment ledger for rental plans
//!
//! Keeps subscriptions, payments and their audit trail consistent with
//! Razorpay, whether a change arrives as a signed webhook or through the
//! authenticated management API.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
