//! Wire types for the PayPal REST API.
//!
//! Only the fields the gateway acts on are typed (order id, status). The
//! full processor payload is carried alongside as raw JSON and surfaced to
//! the caller unmodified - the gateway does not interpret approval links.

use chrono::{DateTime, Utc};
use planora_core::{OrderId, OrderStatus};
use serde::Deserialize;

/// Response from the OAuth2 client-credentials token endpoint.
#[derive(Debug, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
}

/// A bearer credential for the processor API.
///
/// Never persisted; re-fetched per flow invocation rather than cached.
#[derive(Clone)]
pub struct AccessToken {
    value: String,
    issued_at: DateTime<Utc>,
    expires_in: u64,
}

impl AccessToken {
    pub(crate) fn new(response: AccessTokenResponse) -> Self {
        Self {
            value: response.access_token,
            issued_at: Utc::now(),
            expires_in: response.expires_in,
        }
    }

    /// The bearer token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// When the token was obtained.
    #[must_use]
    pub const fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Advertised lifetime in seconds.
    #[must_use]
    pub const fn expires_in(&self) -> u64 {
        self.expires_in
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Typed slice of an order payload (id and status only).
#[derive(Debug, Deserialize)]
pub(crate) struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatus,
}

/// An order as returned by the processor's order-creation endpoint.
///
/// Caller-held state between creation and capture; never persisted locally.
#[derive(Debug, Clone)]
pub struct ProcessorOrder {
    /// Processor-assigned order id.
    pub id: OrderId,
    /// Processor-side order status.
    pub status: OrderStatus,
    /// Full processor payload, surfaced to the caller unmodified.
    pub raw: serde_json::Value,
}

/// Result of a successful capture call.
#[derive(Debug, Clone)]
pub struct CaptureResult {
    /// The captured order.
    pub order_id: OrderId,
    /// Full processor payload from the capture endpoint.
    pub raw: serde_json::Value,
    /// When the gateway observed the successful capture.
    pub captured_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_redacts_value() {
        let token = AccessToken::new(AccessTokenResponse {
            access_token: "A21AAF-secret-token".to_string(),
            expires_in: 32400,
        });
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("A21AAF"));
    }

    #[test]
    fn test_order_summary_parses_processor_payload() {
        let payload = serde_json::json!({
            "id": "5O190127TN364715T",
            "status": "CREATED",
            "links": [{"href": "https://example.test/approve", "rel": "approve"}]
        });
        let summary: OrderSummary = serde_json::from_value(payload).expect("parse");
        assert_eq!(summary.id.as_str(), "5O190127TN364715T");
        assert_eq!(summary.status, OrderStatus::Created);
    }
}
