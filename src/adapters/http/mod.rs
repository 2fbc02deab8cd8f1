//! HTTP adapters - REST API implementations.
//!
//! - `subscription` - Authenticated lifecycle endpoints under `/api/subscriptions`
//! - `webhook` - `POST /razorpay`, authenticated by signature
//! - `middleware` - Caller identity extraction
//! - `extract` - Body and path extractors with JSON rejections
//! - `router` - Top-level router with tracing, timeout, CORS and request ids

pub mod error;
pub mod extract;
pub mod middleware;
pub mod subscription;
pub mod webhook;

mod router;

pub use error::{ApiError, ErrorResponse};
pub use router::{app_router, HttpOptions};
pub use subscription::SubscriptionAppState;
pub use webhook::{WebhookAppState, WebhookResponse};
