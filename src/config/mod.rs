//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `RENTAL_LEDGER` prefix
//! and `__` between nesting levels.
//!
//! # Example
//!
//! ```no_run
//! use rental_ledger::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod notification;
mod payment;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use notification::NotificationConfig;
pub use payment::PaymentConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration; empty URL means in-memory ledger
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Razorpay configuration
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Push notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with the `RENTAL_LEDGER` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `RENTAL_LEDGER__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `RENTAL_LEDGER__PAYMENT__RAZORPAY_WEBHOOK_SECRET=...` -> `payment.razorpay_webhook_secret`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("RENTAL_LEDGER")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        let environment = self.server.environment;
        self.server.validate()?;
        self.database.validate(environment)?;
        self.payment.validate(environment)?;
        self.notification.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
