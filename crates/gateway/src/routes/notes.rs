//! Note route handlers.
//!
//! Simple table-scoped CRUD; field names on the wire match what the client
//! already sends (`uuid` for the owning user).

use axum::{Json, extract::State};
use planora_core::{RowId, UserId};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use crate::db::NoteRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub title: String,
    pub content: Option<String>,
    pub uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNoteRequest {
    pub id: i64,
}

/// Create a note.
#[instrument(skip(state, request))]
pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateNoteRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.uuid.trim().is_empty() {
        return Err(AppError::BadRequest("uuid is required".to_string()));
    }

    let note = NoteRepository::new(state.pool())
        .create(
            &UserId::new(request.uuid),
            &request.title,
            request.content.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "message": "Note created successfully.",
        "note": note,
    })))
}

/// Update a note's title and content.
#[instrument(skip(state, request), fields(note_id = request.id))]
pub async fn update(
    State(state): State<AppState>,
    Json(request): Json<UpdateNoteRequest>,
) -> Result<Json<serde_json::Value>> {
    let note = NoteRepository::new(state.pool())
        .update(
            RowId::new(request.id),
            &request.title,
            request.content.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "message": "Note updated successfully.",
        "note": note,
    })))
}

/// Delete a note.
#[instrument(skip(state), fields(note_id = request.id))]
pub async fn remove(
    State(state): State<AppState>,
    Json(request): Json<DeleteNoteRequest>,
) -> Result<Json<serde_json::Value>> {
    let note = NoteRepository::new(state.pool())
        .delete(RowId::new(request.id))
        .await?;

    Ok(Json(json!({
        "message": "Note deleted successfully.",
        "note": note,
    })))
}
