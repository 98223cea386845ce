//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`.
//!
//! External-call failures are translated to a client-visible JSON error
//! carrying a generic message plus the raw upstream payload for diagnosis -
//! never silently swallowed. The one differentiated case is the
//! capture-then-grant partial failure, which must be distinguishable by
//! field (`paymentCaptured` / `entitlementGranted`), not collapsed into an
//! undifferentiated 500.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::paypal::PayPalError;
use crate::services::CheckoutError;

/// Application-level error type for the gateway.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Order creation failed upstream.
    #[error("Order creation error: {0}")]
    OrderCreation(PayPalError),

    /// The capture-then-grant flow failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client (missing or invalid fields).
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side failures to Sentry
        if matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::OrderCreation(_)
                | Self::Checkout(
                    CheckoutError::Capture(_)
                        | CheckoutError::GrantFailed { .. }
                        | CheckoutError::Store(_)
                )
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let (status, body) = match &self {
            Self::Database(RepositoryError::NotFound) => (
                StatusCode::NOT_FOUND,
                json!({ "error": "Record not found" }),
            ),
            Self::Database(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal server error" }),
            ),
            Self::OrderCreation(e) => (
                StatusCode::BAD_GATEWAY,
                json!({
                    "error": "Failed to create the payment order",
                    "details": upstream_details(e),
                }),
            ),
            Self::Checkout(e) => return checkout_error_response(e),
            Self::NotFound(what) => (
                StatusCode::NOT_FOUND,
                json!({ "error": format!("Not found: {what}") }),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

/// Map a checkout failure onto the wire contract.
fn checkout_error_response(error: &CheckoutError) -> Response {
    let (status, body) = match error {
        CheckoutError::CaptureInFlight(order_id) => (
            StatusCode::CONFLICT,
            json!({
                "error": "A capture for this order is already in progress",
                "orderID": order_id,
            }),
        ),
        CheckoutError::DuplicateCapture { order_id, phase } => (
            StatusCode::CONFLICT,
            json!({
                "error": "This order has already been processed",
                "orderID": order_id,
                "phase": phase,
            }),
        ),
        CheckoutError::UserMismatch(order_id) => (
            StatusCode::CONFLICT,
            json!({
                "error": "This order belongs to a different user",
                "orderID": order_id,
            }),
        ),
        CheckoutError::Capture(e) => (
            StatusCode::BAD_GATEWAY,
            json!({
                "error": "Failed to capture the payment",
                "paymentCaptured": false,
                "entitlementGranted": false,
                "details": upstream_details(e),
            }),
        ),
        // Partial failure: money moved, entitlement did not. Reported
        // distinctly so operators can reconcile (grant retry only).
        CheckoutError::GrantFailed { capture, source } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Payment captured but the subscription was not activated",
                "paymentCaptured": true,
                "entitlementGranted": false,
                "orderID": capture.order_id,
                "paymentInfo": capture.raw,
                "details": source.to_string(),
            }),
        ),
        CheckoutError::Store(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Internal server error",
                "details": e.to_string(),
            }),
        ),
    };

    (status, Json(body)).into_response()
}

/// Raw upstream payload if the processor returned one, else the transport
/// error text.
fn upstream_details(error: &PayPalError) -> serde_json::Value {
    match error.upstream_detail() {
        Some(detail) => serde_json::from_str(detail)
            .unwrap_or_else(|_| serde_json::Value::String(detail.to_owned())),
        None => serde_json::Value::String(error.to_string()),
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paypal::CaptureResult;
    use planora_core::OrderId;

    #[test]
    fn test_status_codes() {
        fn get_status(err: AppError) -> StatusCode {
            err.into_response().status()
        }

        assert_eq!(
            get_status(AppError::NotFound("note".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::BadRequest("missing orderID".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("boom".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::OrderCreation(PayPalError::Parse(
                "bad".to_string()
            ))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Checkout(CheckoutError::CaptureInFlight(
                OrderId::new("o-1")
            ))),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_grant_failed_body_reports_partial_failure() {
        let err = AppError::Checkout(CheckoutError::GrantFailed {
            capture: CaptureResult {
                order_id: OrderId::new("5O190127TN364715T"),
                raw: json!({"id": "5O190127TN364715T", "status": "COMPLETED"}),
                captured_at: chrono::Utc::now(),
            },
            source: RepositoryError::NotFound,
        });

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json body");

        // The partial failure is distinguishable by field, not a bare 500.
        assert_eq!(body["paymentCaptured"], true);
        assert_eq!(body["entitlementGranted"], false);
        assert_eq!(body["orderID"], "5O190127TN364715T");
        assert_eq!(body["paymentInfo"]["status"], "COMPLETED");
    }

    #[test]
    fn test_upstream_details_parses_json_bodies() {
        let err = PayPalError::Api {
            status: 422,
            message: "{\"name\":\"ORDER_NOT_APPROVED\"}".to_string(),
        };
        let details = upstream_details(&err);
        assert_eq!(details["name"], "ORDER_NOT_APPROVED");
    }
}
