//! Push notification configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Push notification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Expo-compatible push endpoint
    #[serde(default = "default_push_endpoint")]
    pub push_endpoint: String,

    /// Upper bound on waiting for one notification fan-out, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// When false, notifications are logged instead of sent
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_ms == 0 || self.timeout_ms > 30_000 {
            return Err(ValidationError::InvalidNotificationTimeout);
        }
        if self.enabled && self.push_endpoint.trim().is_empty() {
            return Err(ValidationError::MissingRequired("NOTIFICATION__PUSH_ENDPOINT"));
        }
        Ok(())
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            push_endpoint: default_push_endpoint(),
            timeout_ms: default_timeout_ms(),
            enabled: default_enabled(),
        }
    }
}

fn default_push_endpoint() -> String {
    "https://exp.host/--/api/v2/push/send".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotificationConfig::default();
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert!(config.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let config = NotificationConfig {
            timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidNotificationTimeout)
        );
    }

    #[test]
    fn test_disabled_push_needs_no_endpoint() {
        let config = NotificationConfig {
            enabled: false,
            push_endpoint: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
