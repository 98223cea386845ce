//! Calendar event repository.

use chrono::NaiveDate;
use sqlx::PgPool;

use planora_core::{RowId, UserId};

use super::RepositoryError;
use crate::models::Event;

const EVENT_COLUMNS: &str = "id, user_id, title, time_start, time_end, date, \
     invited, online_event, reminder, repeat, color, created_at";

/// Fields accepted when creating an event.
#[derive(Debug, Clone)]
pub struct NewEvent<'a> {
    pub user_id: &'a UserId,
    pub title: &'a str,
    pub time_start: Option<&'a str>,
    pub time_end: Option<&'a str>,
    pub date: Option<NaiveDate>,
    pub invited: Option<&'a serde_json::Value>,
    pub online_event: bool,
    pub reminder: Option<&'a str>,
    pub repeat: Option<&'a str>,
    pub color: Option<&'a str>,
}

/// Repository for calendar event operations.
pub struct EventRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> EventRepository<'a> {
    /// Create a new event repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's events.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Event>, RepositoryError> {
        let rows = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 ORDER BY date, time_start"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// Insert an event and return the created row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(&self, event: NewEvent<'_>) -> Result<Event, RepositoryError> {
        let row = sqlx::query_as::<_, Event>(&format!(
            r"
            INSERT INTO events
                (user_id, title, time_start, time_end, date,
                 invited, online_event, reminder, repeat, color)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {EVENT_COLUMNS}
            "
        ))
        .bind(event.user_id)
        .bind(event.title)
        .bind(event.time_start)
        .bind(event.time_end)
        .bind(event.date)
        .bind(event.invited)
        .bind(event.online_event)
        .bind(event.reminder)
        .bind(event.repeat)
        .bind(event.color)
        .fetch_one(self.pool)
        .await?;

        Ok(row)
    }

    /// Delete an event.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the event doesn't exist.
    pub async fn delete(&self, id: RowId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
