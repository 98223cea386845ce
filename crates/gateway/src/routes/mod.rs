//! HTTP route handlers for the gateway.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                     - Liveness check
//! GET  /health/ready               - Readiness check (database)
//!
//! # Checkout
//! POST /api/paypal/create-order    - Create a processor order
//! POST /api/paypal/capture-order   - Capture an approved order + grant entitlement
//! GET  /paypal-success             - Static confirmation page (processor redirect)
//! GET  /paypal-cancel              - Static failure page (processor redirect)
//!
//! # User data sync
//! GET    /data/{uuid}              - Events and notes for a user
//! POST   /note                     - Create a note
//! PUT    /note                     - Update a note
//! DELETE /note                     - Delete a note
//! POST   /event                    - Create an event
//! DELETE /event                    - Delete an event
//! ```

pub mod data;
pub mod events;
pub mod notes;
pub mod paypal;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the checkout routes router.
pub fn paypal_routes() -> Router<AppState> {
    Router::new()
        .route("/api/paypal/create-order", post(paypal::create_order))
        .route("/api/paypal/capture-order", post(paypal::capture_order))
        .route("/paypal-success", get(paypal::success_page))
        .route("/paypal-cancel", get(paypal::cancel_page))
}

/// Create the user data sync routes router.
pub fn sync_routes() -> Router<AppState> {
    Router::new()
        .route("/data/{uuid}", get(data::user_data))
        .route(
            "/note",
            post(notes::create).put(notes::update).delete(notes::remove),
        )
        .route("/event", post(events::create).delete(events::remove))
}

/// Create all routes for the gateway.
pub fn routes() -> Router<AppState> {
    Router::new().merge(paypal_routes()).merge(sync_routes())
}
