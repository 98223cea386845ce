//! Note row model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use planora_core::{RowId, UserId};

/// A user note.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Note {
    pub id: RowId,
    /// Owning user, foreign to the external auth provider.
    #[serde(rename = "uuid")]
    #[sqlx(rename = "user_id")]
    pub user_id: UserId,
    pub title: String,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}
