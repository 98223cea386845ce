//! Combined user data fetch.

use axum::{
    Json,
    extract::{Path, State},
};
use planora_core::UserId;
use serde_json::json;
use tracing::instrument;

use crate::db::{EventRepository, NoteRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Fetch a user's events and notes in one round trip.
#[instrument(skip(state))]
pub async fn user_data(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<serde_json::Value>> {
    if uuid.trim().is_empty() {
        return Err(AppError::BadRequest("User ID is required.".to_string()));
    }

    let user_id = UserId::new(uuid);
    let events = EventRepository::new(state.pool())
        .list_for_user(&user_id)
        .await?;
    let notes = NoteRepository::new(state.pool())
        .list_for_user(&user_id)
        .await?;

    Ok(Json(json!({
        "events": events,
        "notes": notes,
    })))
}
