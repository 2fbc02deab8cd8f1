//! Razorpay REST client.
//!
//! Authenticates with HTTP basic auth (`key_id:key_secret`) and speaks JSON.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::ports::{
    CreateGatewaySubscription, GatewaySubscription, PaymentGateway, PaymentGatewayError,
};

const DEFAULT_API_BASE: &str = "https://api.razorpay.com/v1";

/// Razorpay API credentials and endpoint.
#[derive(Clone)]
pub struct RazorpayConfig {
    key_id: String,
    key_secret: SecretString,
    api_base_url: String,
}

impl RazorpayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: SecretString) -> Self {
        Self {
            key_id: key_id.into(),
            key_secret,
            api_base_url: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn is_configured(&self) -> bool {
        !self.key_id.trim().is_empty() && !self.key_secret.expose_secret().trim().is_empty()
    }
}

/// Error envelope returned by the Razorpay API.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Razorpay implementation of `PaymentGateway`.
pub struct RazorpayClient {
    config: RazorpayConfig,
    http_client: reqwest::Client,
}

impl RazorpayClient {
    pub fn new(config: RazorpayConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, PaymentGatewayError> {
        if !self.config.is_configured() {
            return Err(PaymentGatewayError::NotConfigured);
        }
        let url = format!("{}{}", self.config.api_base_url, path);
        Ok(self.http_client.post(url).basic_auth(
            &self.config.key_id,
            Some(self.config.key_secret.expose_secret()),
        ))
    }

    async fn read_subscription(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<GatewaySubscription, PaymentGatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = rejection_message(&body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                error = %message,
                "Razorpay request rejected"
            );
            return Err(PaymentGatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(|e| {
            PaymentGatewayError::Transport(format!("Failed to parse Razorpay response: {}", e))
        })
    }
}

fn rejection_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match (envelope.error.code, envelope.error.description) {
            (Some(code), Some(description)) => format!("{}: {}", code, description),
            (_, Some(description)) => description,
            (Some(code), None) => code,
            (None, None) => body.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_subscription(
        &self,
        request: CreateGatewaySubscription,
    ) -> Result<GatewaySubscription, PaymentGatewayError> {
        let response = self
            .post("/subscriptions")?
            .json(&request)
            .send()
            .await
            .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

        let subscription = Self::read_subscription(response, "create_subscription").await?;
        tracing::info!(
            gateway_subscription_id = %subscription.id,
            plan_id = %request.plan_id,
            "Razorpay subscription created"
        );
        Ok(subscription)
    }

    async fn cancel_subscription(
        &self,
        gateway_id: &str,
    ) -> Result<GatewaySubscription, PaymentGatewayError> {
        let response = self
            .post(&format!("/subscriptions/{}/cancel", gateway_id))?
            .json(&serde_json::json!({ "cancel_at_cycle_end": 0 }))
            .send()
            .await
            .map_err(|e| PaymentGatewayError::Transport(e.to_string()))?;

        let subscription = Self::read_subscription(response, "cancel_subscription").await?;
        tracing::info!(gateway_subscription_id = %gateway_id, "Razorpay subscription cancelled");
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn config(key_id: &str, secret: &str) -> RazorpayConfig {
        RazorpayConfig::new(key_id, SecretString::new(secret.to_string()))
    }

    #[test]
    fn config_defaults_to_live_api() {
        let config = config("rzp_test_key", "secret");
        assert_eq!(config.api_base_url, "https://api.razorpay.com/v1");
        assert!(config.is_configured());
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = config("k", "s").with_base_url("http://localhost:9000/v1/");
        assert_eq!(config.api_base_url, "http://localhost:9000/v1");
    }

    #[test]
    fn rejection_message_prefers_gateway_description() {
        let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"The id provided does not exist"}}"#;
        assert_eq!(
            rejection_message(body),
            "BAD_REQUEST_ERROR: The id provided does not exist"
        );
        assert_eq!(rejection_message("gateway down"), "gateway down");
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let client = RazorpayClient::new(config("", ""));

        let result = client
            .create_subscription(CreateGatewaySubscription {
                plan_id: "plan_1".into(),
                total_count: 12,
                customer_notify: true,
                notes: BTreeMap::new(),
            })
            .await;

        assert_eq!(result.unwrap_err(), PaymentGatewayError::NotConfigured);
    }
}
