//! Calendar event route handlers.

use axum::{Json, extract::State};
use chrono::NaiveDate;
use planora_core::{RowId, UserId};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::{EventRepository, events::NewEvent};
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub uuid: String,
    #[serde(rename = "timeStart")]
    pub time_start: Option<String>,
    #[serde(rename = "timeEnd")]
    pub time_end: Option<String>,
    pub date: Option<NaiveDate>,
    pub invited: Option<serde_json::Value>,
    #[serde(default)]
    pub online_event: bool,
    pub reminder: Option<String>,
    pub repeat: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEventRequest {
    pub id: i64,
}

/// Create an event.
#[instrument(skip(state, request), fields(user_id = %request.uuid))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateEventRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.uuid.trim().is_empty() {
        return Err(AppError::BadRequest("uuid is required".to_string()));
    }

    let user_id = UserId::new(request.uuid.clone());
    let event = EventRepository::new(state.pool())
        .create(NewEvent {
            user_id: &user_id,
            title: &request.title,
            time_start: request.time_start.as_deref(),
            time_end: request.time_end.as_deref(),
            date: request.date,
            invited: request.invited.as_ref(),
            online_event: request.online_event,
            reminder: request.reminder.as_deref(),
            repeat: request.repeat.as_deref(),
            color: request.color.as_deref(),
        })
        .await?;

    Ok(Json(json!({
        "message": "Event created successfully.",
        "event": event,
    })))
}

/// Delete an event.
#[instrument(skip(state), fields(event_id = request.id))]
pub async fn remove(
    State(state): State<AppState>,
    Json(request): Json<DeleteEventRequest>,
) -> Result<Json<serde_json::Value>> {
    EventRepository::new(state.pool())
        .delete(RowId::new(request.id))
        .await?;

    Ok(Json(json!({
        "message": "Event deleted successfully.",
    })))
}
