//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, enums, errors)
//! - `subscription` - Subscription aggregate, status table and billing periods
//! - `payment` - Payment rows and their settlement status
//! - `audit` - Append-only action history
//! - `webhook` - Razorpay event parsing and signature verification
//! - `installation` - Installation request read model

pub mod audit;
pub mod foundation;
pub mod installation;
pub mod payment;
pub mod subscription;
pub mod webhook;
