//! HTTP adapter for Razorpay webhooks.

mod handlers;
mod routes;

pub use handlers::{WebhookAppState, WebhookResponse};
pub use routes::webhook_routes;
