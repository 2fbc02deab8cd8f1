//! Push notification port.
//!
//! Delivery is best-effort. Callers log failures and move on; nothing in
//! the ledger depends on a notification arriving.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A single push message to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub push_token: String,
    pub title: String,
    pub message: String,
    pub data: BTreeMap<String, String>,
}

/// Errors from the push provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("push provider rejected notification: {0}")]
    Rejected(String),

    #[error("push transport failed: {0}")]
    Transport(String),

    #[error("push notification timed out")]
    Timeout,
}

/// Port for sending push notifications.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_single_push_notification(
        &self,
        notification: PushNotification,
    ) -> Result<(), NotificationError>;
}
