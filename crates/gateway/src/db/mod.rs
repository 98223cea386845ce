//! Database operations for the gateway `PostgreSQL` store.
//!
//! # Tables
//!
//! - `users` - Entitlement record per user (`subs`, `subs_expires_at`);
//!   rows are created by the external auth flow, this service only reads
//!   and updates them
//! - `notes` - User notes
//! - `events` - User calendar events
//! - `capture_log` - Durable two-phase record per checkout attempt, keyed
//!   by processor order id
//!
//! # Migrations
//!
//! Migrations are stored in `crates/gateway/migrations/` and run via:
//! ```bash
//! sqlx migrate run --source crates/gateway/migrations
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod captures;
pub mod events;
pub mod notes;
pub mod users;

pub use captures::{BeginCapture, CaptureLogEntry, CaptureLogRepository};
pub use events::EventRepository;
pub use notes::NoteRepository;
pub use users::EntitlementRepository;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// `PostgreSQL`-backed entitlement store for the capture coordinator.
///
/// Thin adapter that delegates to [`EntitlementRepository`] and
/// [`CaptureLogRepository`]; the coordinator itself only sees the
/// `EntitlementStore` trait so its invariants are testable against doubles.
#[derive(Clone)]
pub struct PgEntitlementStore {
    pool: PgPool,
}

impl PgEntitlementStore {
    /// Create a new store over the shared pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl crate::services::checkout::EntitlementStore for PgEntitlementStore {
    async fn begin_capture(
        &self,
        order_id: &planora_core::OrderId,
        user_id: &planora_core::UserId,
    ) -> Result<BeginCapture, RepositoryError> {
        CaptureLogRepository::new(&self.pool)
            .begin(order_id, user_id)
            .await
    }

    async fn capture_log(
        &self,
        order_id: &planora_core::OrderId,
    ) -> Result<Option<CaptureLogEntry>, RepositoryError> {
        CaptureLogRepository::new(&self.pool).get(order_id).await
    }

    async fn mark_captured(
        &self,
        order_id: &planora_core::OrderId,
        payload: &serde_json::Value,
        captured_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), RepositoryError> {
        CaptureLogRepository::new(&self.pool)
            .mark_captured(order_id, payload, captured_at)
            .await
    }

    async fn mark_granted(
        &self,
        order_id: &planora_core::OrderId,
    ) -> Result<(), RepositoryError> {
        CaptureLogRepository::new(&self.pool)
            .mark_granted(order_id)
            .await
    }

    async fn mark_capture_failed(
        &self,
        order_id: &planora_core::OrderId,
    ) -> Result<(), RepositoryError> {
        CaptureLogRepository::new(&self.pool)
            .mark_capture_failed(order_id)
            .await
    }

    async fn grant_subscription(
        &self,
        user_id: &planora_core::UserId,
        expires_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<planora_core::UserEntitlement, RepositoryError> {
        EntitlementRepository::new(&self.pool)
            .grant_subscription(user_id, expires_at)
            .await
    }
}
