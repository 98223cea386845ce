//! Checkout route handlers.
//!
//! The flow is split across two requests: the client first creates an order
//! and sends the payer through the processor's approval UI using the links
//! in the response, then posts the approved order id back for capture. The
//! two static pages are redirect targets only and carry no state-transition
//! responsibility.

use askama::Template;
use askama_web::WebTemplate;
use axum::{Json, extract::State};
use planora_core::{CurrencyCode, OrderId, Price, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Optional price override for order creation.
///
/// Falls back to the configured price spec when absent (the common case for
/// the subscription SKU).
#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    pub value: Option<Decimal>,
    pub currency: Option<String>,
}

/// Capture request: the approved order handle plus the user to entitle.
#[derive(Debug, Deserialize)]
pub struct CaptureOrderRequest {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

/// Create a processor order for the subscription price.
///
/// Returns the processor's order object unmodified (id, status, approval
/// links); the client drives payer approval from the links.
#[instrument(skip(state, request))]
pub async fn create_order(
    State(state): State<AppState>,
    request: Option<Json<CreateOrderRequest>>,
) -> Result<Json<serde_json::Value>> {
    let Json(request) = request.unwrap_or_default();
    let price = resolve_price(&state, &request)?;

    let order = state
        .paypal()
        .create_order(
            &price,
            &state.config().return_url(),
            &state.config().cancel_url(),
        )
        .await
        .map_err(AppError::OrderCreation)?;

    tracing::info!(
        order_id = %order.id,
        status = ?order.status,
        price = %price,
        "processor order created"
    );

    Ok(Json(order.raw))
}

/// Capture an approved order and grant the subscription entitlement.
#[instrument(skip(state), fields(order_id = %request.order_id, user_id = %request.user_id))]
pub async fn capture_order(
    State(state): State<AppState>,
    Json(request): Json<CaptureOrderRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.order_id.trim().is_empty() {
        return Err(AppError::BadRequest("orderID is required".to_string()));
    }
    if request.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }

    let order_id = OrderId::new(request.order_id);
    let user_id = UserId::new(request.user_id);

    let outcome = state.checkout().capture_and_grant(&order_id, &user_id).await?;

    Ok(Json(json!({
        "success": true,
        "paymentInfo": outcome.payment.raw,
        "db": outcome.entitlement,
    })))
}

/// Resolve the effective price spec for an order-creation request.
fn resolve_price(state: &AppState, request: &CreateOrderRequest) -> Result<Price> {
    let configured = state.config().paypal.price;

    let amount = match request.value {
        Some(value) if value <= Decimal::ZERO => {
            return Err(AppError::BadRequest(
                "value must be a positive amount".to_string(),
            ));
        }
        Some(value) => value,
        None => configured.amount,
    };

    let currency = match &request.currency {
        Some(code) => code
            .parse::<CurrencyCode>()
            .map_err(AppError::BadRequest)?,
        None => configured.currency_code,
    };

    Ok(Price::new(amount, currency))
}

/// Payment confirmation page (processor redirect target).
#[derive(Template, WebTemplate)]
#[template(path = "paypal/success.html")]
pub struct SuccessPageTemplate;

/// Payment failure page (processor redirect target).
#[derive(Template, WebTemplate)]
#[template(path = "paypal/cancel.html")]
pub struct CancelPageTemplate;

/// Render the static payment-success page.
pub async fn success_page() -> SuccessPageTemplate {
    SuccessPageTemplate
}

/// Render the static payment-cancelled page.
pub async fn cancel_page() -> CancelPageTemplate {
    CancelPageTemplate
}
