//! Axum router configuration for the webhook endpoint.

use axum::{routing::post, Router};

use super::handlers::{handle_razorpay_webhook, WebhookAppState};

/// `POST /razorpay`. No user auth; the signature authenticates the caller.
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/razorpay", post(handle_razorpay_webhook))
}
