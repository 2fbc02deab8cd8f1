//! Payment gateway configuration (Razorpay)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Razorpay credentials and webhook secret.
///
/// The webhook secret may be absent at load time. Webhooks are then refused
/// per request with a 500 rather than accepted unverified.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Razorpay key id (`rzp_test_...` or `rzp_live_...`)
    #[serde(default)]
    pub razorpay_key_id: String,

    /// Razorpay key secret
    pub razorpay_key_secret: Option<SecretString>,

    /// Webhook shared secret
    pub razorpay_webhook_secret: Option<SecretString>,

    /// Razorpay REST base URL
    #[serde(default = "default_api_base")]
    pub razorpay_api_base: String,

    /// Plan used for autopay when the request names none
    pub default_plan_id: Option<String>,
}

impl PaymentConfig {
    /// True when API credentials are present.
    pub fn has_api_credentials(&self) -> bool {
        !self.razorpay_key_id.trim().is_empty()
            && self
                .razorpay_key_secret
                .as_ref()
                .is_some_and(|s| !s.expose_secret().trim().is_empty())
    }

    pub fn has_webhook_secret(&self) -> bool {
        self.razorpay_webhook_secret
            .as_ref()
            .is_some_and(|s| !s.expose_secret().trim().is_empty())
    }

    /// Check if using Razorpay test mode
    pub fn is_test_mode(&self) -> bool {
        self.razorpay_key_id.starts_with("rzp_test_")
    }

    /// Validate payment configuration.
    ///
    /// Missing secrets fail in production and only warn elsewhere.
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        let production = environment == Environment::Production;

        if !self.has_webhook_secret() {
            if production {
                return Err(ValidationError::MissingRequired("PAYMENT__RAZORPAY_WEBHOOK_SECRET"));
            }
            tracing::warn!("Razorpay webhook secret not set; webhooks will be refused");
        }

        if !self.has_api_credentials() {
            if production {
                return Err(ValidationError::MissingRequired("PAYMENT__RAZORPAY_KEY_ID"));
            }
            tracing::warn!("Razorpay API credentials not set; autopay provisioning is mocked");
        } else if !self.razorpay_key_id.starts_with("rzp_") {
            return Err(ValidationError::InvalidRazorpayKey);
        }

        if production && !self.razorpay_api_base.starts_with("https://") {
            return Err(ValidationError::ApiBaseMustBeHttps);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            razorpay_key_id: String::new(),
            razorpay_key_secret: None,
            razorpay_webhook_secret: None,
            razorpay_api_base: default_api_base(),
            default_plan_id: None,
        }
    }
}

fn default_api_base() -> String {
    "https://api.razorpay.com/v1".to_string()
}
