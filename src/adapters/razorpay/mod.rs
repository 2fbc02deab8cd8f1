//! Razorpay payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for autopay provisioning:
//! - Creating recurring subscriptions against a plan
//! - Cancelling them when the local subscription is terminated
//!
//! Webhook verification lives in the domain (`RazorpaySignatureVerifier`)
//! since it needs no I/O.

mod client;
mod mock_gateway;

pub use client::{RazorpayClient, RazorpayConfig};
pub use mock_gateway::MockPaymentGateway;
