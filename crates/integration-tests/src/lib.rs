//! Shared test harness: an in-process stub of the payment processor.
//!
//! The stub speaks just enough of the PayPal REST API for the gateway's
//! client: the OAuth2 token endpoint, order creation, and order capture.
//! Behavior toggles and recorded requests let tests assert on what the
//! gateway actually sent (bearer tokens, idempotency keys) and simulate
//! processor-side rejections.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

/// Order id the stub assigns to every created order.
pub const STUB_ORDER_ID: &str = "STUB-5O190127TN364715T";

/// Bearer token the stub issues.
pub const STUB_ACCESS_TOKEN: &str = "stub-access-token-A21AA";

/// Shared, inspectable state of a running stub.
#[derive(Default)]
pub struct ProcessorStubState {
    /// When false, capture responds 422 ORDER_NOT_APPROVED.
    pub approve_captures: AtomicBool,
    /// When true, the token endpoint rejects the credentials.
    pub reject_credentials: AtomicBool,
    pub token_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub capture_calls: AtomicUsize,
    /// `PayPal-Request-Id` values observed, in arrival order.
    pub request_ids: Mutex<Vec<String>>,
    /// Last JSON body posted to the order-creation endpoint.
    pub last_order_body: Mutex<Option<Value>>,
}

impl ProcessorStubState {
    fn record_request_id(&self, headers: &HeaderMap) {
        if let Some(id) = headers
            .get("PayPal-Request-Id")
            .and_then(|v| v.to_str().ok())
        {
            self.request_ids
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(id.to_owned());
        }
    }

    /// Recorded idempotency keys.
    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// A running processor stub bound to a local port.
pub struct ProcessorStub {
    pub base_url: String,
    pub state: Arc<ProcessorStubState>,
}

impl ProcessorStub {
    /// Start a stub that approves captures.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(ProcessorStubState::default());
        state.approve_captures.store(true, Ordering::SeqCst);

        let app = Router::new()
            .route("/v1/oauth2/token", post(token))
            .route("/v2/checkout/orders", post(create_order))
            .route("/v2/checkout/orders/{id}/capture", post(capture_order))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .expect("bind stub listener");
        let addr = listener.local_addr().expect("stub local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

async fn token(
    State(state): State<Arc<ProcessorStubState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.token_calls.fetch_add(1, Ordering::SeqCst);

    let has_basic_auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));

    if !has_basic_auth || state.reject_credentials.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "access_token": STUB_ACCESS_TOKEN,
            "token_type": "Bearer",
            "expires_in": 32400,
        })),
    )
}

fn bearer_ok(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {STUB_ACCESS_TOKEN}"))
}

async fn create_order(
    State(state): State<Arc<ProcessorStubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.create_calls.fetch_add(1, Ordering::SeqCst);
    state.record_request_id(&headers);

    if !bearer_ok(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"name": "UNAUTHORIZED"})),
        );
    }

    *state
        .last_order_body
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(body);

    (
        StatusCode::CREATED,
        Json(json!({
            "id": STUB_ORDER_ID,
            "status": "CREATED",
            "links": [
                {
                    "href": format!("https://stub.test/checkoutnow?token={STUB_ORDER_ID}"),
                    "rel": "approve",
                    "method": "GET",
                },
            ],
        })),
    )
}

async fn capture_order(
    State(state): State<Arc<ProcessorStubState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.capture_calls.fetch_add(1, Ordering::SeqCst);
    state.record_request_id(&headers);

    if !bearer_ok(&headers) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"name": "UNAUTHORIZED"})),
        );
    }

    if !state.approve_captures.load(Ordering::SeqCst) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "name": "UNPROCESSABLE_ENTITY",
                "details": [{"issue": "ORDER_NOT_APPROVED"}],
            })),
        );
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "id": id,
            "status": "COMPLETED",
            "purchase_units": [{
                "payments": {
                    "captures": [{"id": "CAP-1", "status": "COMPLETED"}],
                },
            }],
        })),
    )
}
