//! Planora Gateway - backend HTTP gateway library.
//!
//! Exposes the router and its building blocks so the binary stays thin and
//! the integration-tests crate can assemble an app against test doubles.
//!
//! # Architecture
//!
//! - Axum web framework, JSON API plus two static Askama pages
//! - PayPal REST API for the checkout flow (order create, capture)
//! - `PostgreSQL` for entitlements, notes, events, and the capture log
//!
//! The core subsystem is the capture coordinator in [`services::checkout`]:
//! the two-phase capture-then-grant workflow with its per-order guard and
//! durable capture log.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod paypal;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the full application router.
#[must_use]
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        // The mobile client is served from a different origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
