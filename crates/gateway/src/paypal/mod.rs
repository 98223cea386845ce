//! PayPal REST API client.
//!
//! Covers the three processor calls the checkout flow needs:
//!
//! - OAuth2 client-credentials exchange (`/v1/oauth2/token`)
//! - Order creation (`/v2/checkout/orders`)
//! - Order capture (`/v2/checkout/orders/{id}/capture`)
//!
//! Every call carries an explicit timeout (configured via
//! `PAYPAL_TIMEOUT_SECS`); a timed-out call fails closed like any other
//! transport failure. Order creation sends a fresh `PayPal-Request-Id`
//! idempotency key; capture derives the key from the order id so client
//! retries collapse to one processor-side capture.

pub mod types;

use planora_core::{OrderId, Price};
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use uuid::Uuid;

use crate::config::PayPalConfig;

pub use types::{AccessToken, CaptureResult, ProcessorOrder};

use types::{AccessTokenResponse, OrderSummary};

/// Errors that can occur when interacting with the PayPal API.
#[derive(Debug, Error)]
pub enum PayPalError {
    /// Transport failure, including timeouts.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token endpoint rejected the client credentials.
    #[error("auth error: {status} - {message}")]
    Auth { status: u16, message: String },

    /// Order or capture endpoint returned an error response.
    /// `message` carries the raw upstream body for diagnostics.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a processor response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl PayPalError {
    /// Raw upstream detail for the handler boundary, if any.
    #[must_use]
    pub fn upstream_detail(&self) -> Option<&str> {
        match self {
            Self::Auth { message, .. } | Self::Api { message, .. } => Some(message),
            Self::Http(_) | Self::Parse(_) => None,
        }
    }
}

/// PayPal REST API client.
#[derive(Clone)]
pub struct PayPalClient {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: secrecy::SecretString,
}

impl PayPalClient {
    /// Create a new PayPal API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &PayPalConfig) -> Result<Self, PayPalError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    /// Obtain a bearer token via the client-credentials exchange.
    ///
    /// Fetched once per flow invocation; callers must not proceed to order
    /// or capture calls without a token.
    ///
    /// # Errors
    ///
    /// Returns `PayPalError::Auth` on a non-2xx response and
    /// `PayPalError::Http` on transport failure or timeout.
    pub async fn fetch_access_token(&self) -> Result<AccessToken, PayPalError> {
        let url = format!("{}/v1/oauth2/token", self.base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.client_id, Some(self.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PayPalError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| PayPalError::Parse(e.to_string()))?;

        Ok(AccessToken::new(token))
    }

    /// Create a capture-intent order for the given price spec.
    ///
    /// Returns the processor's order representation unmodified (the gateway
    /// does not interpret approval-link contents). No local state is created;
    /// the order handle is caller-held until capture.
    ///
    /// # Errors
    ///
    /// Returns `PayPalError::Api` with the raw upstream body on a non-2xx
    /// response.
    pub async fn create_order(
        &self,
        price: &Price,
        return_url: &str,
        cancel_url: &str,
    ) -> Result<ProcessorOrder, PayPalError> {
        let token = self.fetch_access_token().await?;
        let url = format!("{}/v2/checkout/orders", self.base_url);

        let body = serde_json::json!({
            "intent": "CAPTURE",
            "purchase_units": [
                {
                    "amount": {
                        "currency_code": price.currency_code.code(),
                        "value": price.amount_string(),
                    },
                }
            ],
            "application_context": {
                "return_url": return_url,
                "cancel_url": cancel_url,
            },
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .header("PayPal-Request-Id", Uuid::new_v4().to_string())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PayPalError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PayPalError::Parse(e.to_string()))?;
        let summary: OrderSummary = serde_json::from_value(raw.clone())
            .map_err(|e| PayPalError::Parse(format!("order payload missing id/status: {e}")))?;

        Ok(ProcessorOrder {
            id: summary.id,
            status: summary.status,
            raw,
        })
    }

    /// Capture the funds for a previously approved order.
    ///
    /// The idempotency key is derived from the order id, so a client retry
    /// of the same order replays as the same processor-side request instead
    /// of double-capturing.
    ///
    /// # Errors
    ///
    /// Returns `PayPalError::Api` with the raw upstream body on a non-2xx
    /// response (unapproved order, already-captured order, processor outage).
    pub async fn capture_order(&self, order_id: &OrderId) -> Result<CaptureResult, PayPalError> {
        let token = self.fetch_access_token().await?;
        let url = format!("{}/v2/checkout/orders/{}/capture", self.base_url, order_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token.as_str())
            .header("PayPal-Request-Id", format!("capture-{order_id}"))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PayPalError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PayPalError::Parse(e.to_string()))?;

        Ok(CaptureResult {
            order_id: order_id.clone(),
            raw,
            captured_at: chrono::Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl crate::services::checkout::PaymentProcessor for PayPalClient {
    async fn capture_order(&self, order_id: &OrderId) -> Result<CaptureResult, PayPalError> {
        Self::capture_order(self, order_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_detail_only_for_api_errors() {
        let err = PayPalError::Api {
            status: 422,
            message: "{\"name\":\"UNPROCESSABLE_ENTITY\"}".to_string(),
        };
        assert_eq!(err.upstream_detail(), Some("{\"name\":\"UNPROCESSABLE_ENTITY\"}"));

        let err = PayPalError::Parse("bad json".to_string());
        assert_eq!(err.upstream_detail(), None);
    }
}
