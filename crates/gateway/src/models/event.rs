//! Calendar event row model.
//!
//! Field serialization matches the JSON contract the mobile client already
//! speaks (`timeStart`, `timeEnd`, `online_event`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use planora_core::{RowId, UserId};

/// A calendar event.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: RowId,
    /// Owning user, foreign to the external auth provider.
    #[serde(rename = "uuid")]
    #[sqlx(rename = "user_id")]
    pub user_id: UserId,
    pub title: String,
    #[serde(rename = "timeStart")]
    #[sqlx(rename = "time_start")]
    pub time_start: Option<String>,
    #[serde(rename = "timeEnd")]
    #[sqlx(rename = "time_end")]
    pub time_end: Option<String>,
    pub date: Option<NaiveDate>,
    /// Invited participants, stored as the client sends them.
    pub invited: Option<serde_json::Value>,
    pub online_event: bool,
    pub reminder: Option<String>,
    pub repeat: Option<String>,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
}
