//! Axum router configuration for subscription endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_subscription, get_subscription, mark_payment_completed, pause_subscription,
    resume_subscription, terminate_subscription, update_subscription, SubscriptionAppState,
};

/// Create the subscription API router, mounted at `/api/subscriptions`.
///
/// # Routes
///
/// - `POST /` - Create from a completed installation (ADMIN, FRANCHISE_OWNER)
/// - `GET /:id` - Subscription with payments and history (customers: own only)
/// - `PATCH /:id` - Edit fields and optionally status (ADMIN, FRANCHISE_OWNER)
/// - `POST /:id/pause`, `/:id/resume`, `/:id/terminate` (ADMIN, FRANCHISE_OWNER)
/// - `POST /:id/payments` - Record a manual payment (also SERVICE_AGENT)
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", post(create_subscription))
        .route("/:id", get(get_subscription).patch(update_subscription))
        .route("/:id/pause", post(pause_subscription))
        .route("/:id/resume", post(resume_subscription))
        .route("/:id/terminate", post(terminate_subscription))
        .route("/:id/payments", post(mark_payment_completed))
}
