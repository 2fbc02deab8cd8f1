//! Expo push API sender.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ports::{NotificationError, NotificationGateway, PushNotification};

/// Message body accepted by the Expo push endpoint.
#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a BTreeMap<String, String>,
    sound: &'static str,
}

#[derive(Debug, Deserialize)]
struct ExpoResponse {
    data: ExpoTicket,
}

#[derive(Debug, Deserialize)]
struct ExpoTicket {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Sends single push notifications through Expo.
pub struct ExpoPushSender {
    endpoint: String,
    http_client: reqwest::Client,
}

impl ExpoPushSender {
    /// `timeout` bounds each request independently of the notifier's wait.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }
}

#[async_trait]
impl NotificationGateway for ExpoPushSender {
    async fn send_single_push_notification(
        &self,
        notification: PushNotification,
    ) -> Result<(), NotificationError> {
        let message = ExpoMessage {
            to: &notification.push_token,
            title: &notification.title,
            body: &notification.message,
            data: &notification.data,
            sound: "default",
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&message)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout
                } else {
                    NotificationError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected(format!("{}: {}", status, body)));
        }

        let parsed: ExpoResponse = response
            .json()
            .await
            .map_err(|e| NotificationError::Transport(format!("Invalid Expo response: {}", e)))?;
        ticket_result(parsed.data)
    }
}

fn ticket_result(ticket: ExpoTicket) -> Result<(), NotificationError> {
    if ticket.status == "ok" {
        Ok(())
    } else {
        Err(NotificationError::Rejected(
            ticket.message.unwrap_or(ticket.status),
        ))
    }
}
