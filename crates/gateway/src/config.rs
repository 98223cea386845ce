//! Gateway configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GATEWAY_DATABASE_URL` - `PostgreSQL` connection string
//! - `GATEWAY_BASE_URL` - Public URL for the gateway (used for processor callbacks)
//! - `PAYPAL_CLIENT_ID` - PayPal REST API client ID
//! - `PAYPAL_CLIENT_SECRET` - PayPal REST API client secret
//!
//! ## Optional
//! - `GATEWAY_HOST` - Bind address (default: 127.0.0.1)
//! - `GATEWAY_PORT` - Listen port (default: 5000)
//! - `PAYPAL_API_BASE_URL` - Processor base URL (default: sandbox)
//! - `PAYPAL_PRICE` - Subscription price in the configured currency (default: 7.00)
//! - `PAYPAL_CURRENCY` - ISO 4217 currency code (default: USD)
//! - `PAYPAL_TIMEOUT_SECS` - Outbound call timeout in seconds (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use planora_core::{CurrencyCode, Price};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

/// PayPal sandbox environment, used unless `PAYPAL_API_BASE_URL` is set.
pub const PAYPAL_SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Gateway application configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build the processor return/cancel callbacks
    pub base_url: String,
    /// PayPal REST API configuration
    pub paypal: PayPalConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// PayPal REST API configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct PayPalConfig {
    /// OAuth2 client ID for the client-credentials exchange
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: SecretString,
    /// Processor API base URL (sandbox or live)
    pub api_base_url: String,
    /// Price spec for the subscription SKU
    pub price: Price,
    /// Timeout applied to every outbound processor call
    pub timeout: Duration,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("price", &self.price)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GATEWAY_DATABASE_URL")?;
        let host = get_env_or_default("GATEWAY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GATEWAY_PORT", "5000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GATEWAY_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_env("GATEWAY_BASE_URL")?
            .trim_end_matches('/')
            .to_string();

        let paypal = PayPalConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            paypal,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Processor redirect target after payer approval.
    #[must_use]
    pub fn return_url(&self) -> String {
        format!("{}/paypal-success", self.base_url)
    }

    /// Processor redirect target after payer cancellation.
    #[must_use]
    pub fn cancel_url(&self) -> String {
        format!("{}/paypal-cancel", self.base_url)
    }
}

impl PayPalConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let price_value = get_env_or_default("PAYPAL_PRICE", "7.00")
            .parse::<Decimal>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYPAL_PRICE".to_string(), e.to_string()))?;
        let currency = get_env_or_default("PAYPAL_CURRENCY", "USD")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("PAYPAL_CURRENCY".to_string(), e))?;
        let timeout_secs = get_env_or_default("PAYPAL_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("PAYPAL_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            client_id: get_required_env("PAYPAL_CLIENT_ID")?,
            client_secret: get_required_secret("PAYPAL_CLIENT_SECRET")?,
            api_base_url: get_env_or_default("PAYPAL_API_BASE_URL", PAYPAL_SANDBOX_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            price: Price::new(price_value, currency),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "http://localhost:5000".to_string(),
            paypal: PayPalConfig {
                client_id: "client_id".to_string(),
                client_secret: SecretString::from("client_secret"),
                api_base_url: PAYPAL_SANDBOX_BASE_URL.to_string(),
                price: Price::new(dec!(7.00), CurrencyCode::USD),
                timeout: Duration::from_secs(10),
            },
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 5000);
    }

    #[test]
    fn test_callback_urls() {
        let config = test_config();
        assert_eq!(config.return_url(), "http://localhost:5000/paypal-success");
        assert_eq!(config.cancel_url(), "http://localhost:5000/paypal-cancel");
    }

    #[test]
    fn test_paypal_config_debug_redacts_secret() {
        let config = test_config();
        let debug_output = format!("{:?}", config.paypal);

        assert!(debug_output.contains("client_id"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("client_secret_value"));
    }
}
