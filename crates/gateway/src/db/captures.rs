//! Durable capture log, keyed by processor order id.
//!
//! The checkout flow has no transaction spanning the processor call and the
//! entitlement update, so each attempt writes a row here before the capture
//! call and advances it after capture and after grant. The row is both the
//! dedup record for repeat submissions of one order id and the resumption
//! point for reconciling a "captured but not granted" attempt.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use planora_core::{CapturePhase, OrderId, UserId};

use super::RepositoryError;

/// A row in the `capture_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CaptureLogEntry {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub phase: CapturePhase,
    /// Raw processor capture payload, recorded once the capture succeeds.
    pub processor_payload: Option<serde_json::Value>,
    pub captured_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of attempting to start a capture attempt for an order id.
#[derive(Debug)]
pub enum BeginCapture {
    /// This request owns the attempt and may call the processor.
    Started,
    /// A row for this order id already exists in the given phase.
    AlreadyRecorded(CapturePhase),
}

/// Repository for the capture log.
pub struct CaptureLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CaptureLogRepository<'a> {
    /// Create a new capture log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record the start of a capture attempt.
    ///
    /// Inserts a `capture_requested` row. An existing `capture_failed` row is
    /// reclaimed: no money moved for that attempt, so the row returns to
    /// `capture_requested` re-bound to the new submitter (a stale `user_id`
    /// would strand the grant if a different user retries and pays). Any
    /// other existing row is reported back by phase so the caller can decide
    /// whether the submission is a duplicate or a grant retry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn begin(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<BeginCapture, RepositoryError> {
        let inserted = sqlx::query_scalar::<_, String>(
            r"
            INSERT INTO capture_log (order_id, user_id, phase)
            VALUES ($1, $2, 'capture_requested')
            ON CONFLICT (order_id) DO NOTHING
            RETURNING order_id
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(BeginCapture::Started);
        }

        // The phase guard makes the reclaim atomic against a concurrent
        // attempt on the same order id.
        let reclaimed = sqlx::query_scalar::<_, String>(
            r"
            UPDATE capture_log
            SET phase = 'capture_requested',
                user_id = $2,
                updated_at = NOW()
            WHERE order_id = $1 AND phase = 'capture_failed'
            RETURNING order_id
            ",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        if reclaimed.is_some() {
            return Ok(BeginCapture::Started);
        }

        let phase = sqlx::query_scalar::<_, CapturePhase>(
            r"
            SELECT phase FROM capture_log WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_one(self.pool)
        .await?;

        Ok(BeginCapture::AlreadyRecorded(phase))
    }

    /// Advance an attempt to `captured_grant_pending` with the processor payload.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row exists for the order.
    pub async fn mark_captured(
        &self,
        order_id: &OrderId,
        payload: &serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.set_phase(
            order_id,
            CapturePhase::CapturedGrantPending,
            Some(payload),
            Some(captured_at),
        )
        .await
    }

    /// Advance an attempt to the terminal `entitlement_granted` phase.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row exists for the order.
    pub async fn mark_granted(&self, order_id: &OrderId) -> Result<(), RepositoryError> {
        self.set_phase(order_id, CapturePhase::EntitlementGranted, None, None)
            .await
    }

    /// Record a processor-side capture failure. No money moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row exists for the order.
    pub async fn mark_capture_failed(&self, order_id: &OrderId) -> Result<(), RepositoryError> {
        self.set_phase(order_id, CapturePhase::CaptureFailed, None, None)
            .await
    }

    /// Fetch the log entry for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<CaptureLogEntry>, RepositoryError> {
        let row = sqlx::query_as::<_, CaptureLogEntry>(
            r"
            SELECT order_id, user_id, phase, processor_payload,
                   captured_at, created_at, updated_at
            FROM capture_log
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    async fn set_phase(
        &self,
        order_id: &OrderId,
        phase: CapturePhase,
        payload: Option<&serde_json::Value>,
        captured_at: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE capture_log
            SET phase = $2,
                processor_payload = COALESCE($3, processor_payload),
                captured_at = COALESCE($4, captured_at),
                updated_at = NOW()
            WHERE order_id = $1
            ",
        )
        .bind(order_id)
        .bind(phase)
        .bind(payload)
        .bind(captured_at)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
