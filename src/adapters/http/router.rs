//! Top-level router: routes, state and the tower-http middleware stack.

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::middleware::{USER_ID_HEADER, USER_ROLE_HEADER};
use super::subscription::{subscription_routes, SubscriptionAppState};
use super::webhook::{webhook_routes, WebhookAppState};

/// Options for the middleware stack.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub request_timeout: Duration,
    /// Allowed CORS origins; empty or `*` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
        }
    }
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(USER_ID_HEADER),
            HeaderName::from_static(USER_ROLE_HEADER),
        ])
        .allow_origin(allow_origin)
}

/// Builds the full application router.
///
/// # Routes
///
/// - `GET /health`
/// - `POST /razorpay`
/// - `/api/subscriptions/...`
pub fn app_router(
    subscriptions: SubscriptionAppState,
    webhooks: WebhookAppState,
    options: &HttpOptions,
) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health))
        .nest(
            "/api/subscriptions",
            subscription_routes().with_state(subscriptions),
        )
        .merge(webhook_routes().with_state(webhooks))
        .layer(TimeoutLayer::new(options.request_timeout))
        .layer(cors_layer(&options.cors_origins))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}
