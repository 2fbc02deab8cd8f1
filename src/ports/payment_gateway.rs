//! Payment gateway port for autopay provisioning.
//!
//! Webhooks flow the other way and are handled by the reconcilers; this
//! port only covers the calls this service makes to the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Request to create a recurring gateway subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateGatewaySubscription {
    pub plan_id: String,
    /// Number of billing cycles to authorise.
    pub total_count: u32,
    pub customer_notify: bool,
    /// Free-form notes stored on the gateway object.
    pub notes: BTreeMap<String, String>,
}

/// Gateway-side subscription as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewaySubscription {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub short_url: Option<String>,
}

/// Errors from the gateway API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentGatewayError {
    #[error("payment gateway credentials are not configured")]
    NotConfigured,

    #[error("payment gateway rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment gateway unreachable: {0}")]
    Transport(String),
}

/// Port for calls into the payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_subscription(
        &self,
        request: CreateGatewaySubscription,
    ) -> Result<GatewaySubscription, PaymentGatewayError>;

    /// Cancels the gateway subscription immediately.
    async fn cancel_subscription(
        &self,
        gateway_id: &str,
    ) -> Result<GatewaySubscription, PaymentGatewayError>;
}
