//! HTTP adapter for the subscription lifecycle endpoints.

mod dto;
mod handlers;
mod routes;

pub use dto::*;
pub use handlers::SubscriptionAppState;
pub use routes::subscription_routes;
