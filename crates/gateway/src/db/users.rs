//! Entitlement store adapter.
//!
//! The `users` table is owned by the external auth flow; this repository
//! only reads the entitlement columns and performs the single-row grant
//! update. Queries use the runtime sqlx API with `FromRow` models.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use planora_core::{UserEntitlement, UserId};

use super::RepositoryError;

/// Repository for user entitlement operations.
pub struct EntitlementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EntitlementRepository<'a> {
    /// Create a new entitlement repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a user's entitlement record by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserEntitlement>, RepositoryError> {
        let row = sqlx::query_as::<_, UserEntitlement>(
            r"
            SELECT id, subs, subs_expires_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Mark a user's subscription active and record the period end.
    ///
    /// Idempotent by user id: granting a user whose subscription is already
    /// active leaves the record unchanged (the existing expiry is kept) and
    /// returns it as-is rather than erroring.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no row exists for the user and
    /// `RepositoryError::Database` for other failures.
    pub async fn grant_subscription(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<UserEntitlement, RepositoryError> {
        let row = sqlx::query_as::<_, UserEntitlement>(
            r"
            UPDATE users
            SET subs = TRUE,
                subs_expires_at = CASE
                    WHEN subs THEN subs_expires_at
                    ELSE $2
                END
            WHERE id = $1
            RETURNING id, subs, subs_expires_at
            ",
        )
        .bind(user_id)
        .bind(expires_at)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row)
    }
}
