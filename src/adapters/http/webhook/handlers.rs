//! HTTP handler for Razorpay webhook deliveries.
//!
//! The body is taken as raw bytes so the signature is checked against
//! exactly what the gateway sent.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::handlers::WebhookDispatcher;
use crate::domain::webhook::{WebhookError, SIGNATURE_HEADER};

/// Shared state for the webhook route.
#[derive(Clone)]
pub struct WebhookAppState {
    pub dispatcher: Arc<WebhookDispatcher>,
}

impl WebhookAppState {
    pub fn new(dispatcher: Arc<WebhookDispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Body of every webhook response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
}

/// POST /razorpay
pub async fn handle_razorpay_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.dispatcher.handle(&body, signature).await {
        Ok(outcome) => Json(WebhookResponse {
            status: "ok".to_string(),
            message: outcome.as_str().to_string(),
        })
        .into_response(),
        Err(err) => webhook_error_response(&err),
    }
}

fn webhook_error_response(err: &WebhookError) -> Response {
    let body = WebhookResponse {
        status: "error".to_string(),
        message: err.to_string(),
    };
    (err.status_code(), Json(body)).into_response()
}
