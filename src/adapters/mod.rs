//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `memory` - In-memory ledger and lookups (tests, dev mode)
//! - `postgres` - sqlx-backed ledger, installation and recipient lookups
//! - `razorpay` - Gateway REST client and mock
//! - `push` - Expo push sender and logging sender
//! - `http` - axum routes

pub mod http;
pub mod memory;
pub mod postgres;
pub mod push;
pub mod razorpay;
