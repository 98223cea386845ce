//! Note repository.

use sqlx::PgPool;

use planora_core::{RowId, UserId};

use super::RepositoryError;
use crate::models::Note;

/// Repository for note operations, scoped by owning user where listed.
pub struct NoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NoteRepository<'a> {
    /// Create a new note repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's notes, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Note>, RepositoryError> {
        let rows = sqlx::query_as::<_, Note>(
            r"
            SELECT id, user_id, title, content, created_at
            FROM notes
            WHERE user_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert a note and return the created row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        user_id: &UserId,
        title: &str,
        content: Option<&str>,
    ) -> Result<Note, RepositoryError> {
        let row = sqlx::query_as::<_, Note>(
            r"
            INSERT INTO notes (user_id, title, content)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, content, created_at
            ",
        )
        .bind(user_id)
        .bind(title)
        .bind(content)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Update a note's title and content, returning the updated row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the note doesn't exist.
    pub async fn update(
        &self,
        id: RowId,
        title: &str,
        content: Option<&str>,
    ) -> Result<Note, RepositoryError> {
        let row = sqlx::query_as::<_, Note>(
            r"
            UPDATE notes
            SET title = $2, content = $3
            WHERE id = $1
            RETURNING id, user_id, title, content, created_at
            ",
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row)
    }

    /// Delete a note, returning the deleted row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the note doesn't exist.
    pub async fn delete(&self, id: RowId) -> Result<Note, RepositoryError> {
        let row = sqlx::query_as::<_, Note>(
            r"
            DELETE FROM notes
            WHERE id = $1
            RETURNING id, user_id, title, content, created_at
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row)
    }
}
