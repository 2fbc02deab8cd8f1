//! Push sender that only logs.

use async_trait::async_trait;

use crate::ports::{NotificationError, NotificationGateway, PushNotification};

/// Logs each notification at info level and reports success.
#[derive(Debug, Default, Clone)]
pub struct LoggingPushSender;

impl LoggingPushSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationGateway for LoggingPushSender {
    async fn send_single_push_notification(
        &self,
        notification: PushNotification,
    ) -> Result<(), NotificationError> {
        tracing::info!(
            title = %notification.title,
            kind = notification.data.get("type").map(String::as_str).unwrap_or(""),
            "Push notification (not sent)"
        );
        Ok(())
    }
}
