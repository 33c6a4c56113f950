//! Session lifecycle, viewport, undo/reset and image export handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::RoomstageError;
use crate::placement::Size;

use super::super::state::{AppState, SessionEntry};
use super::{ApiError, ApiResult, SessionView, with_session};

/// Request body for the viewport endpoint.
#[derive(Debug, Deserialize)]
pub struct ViewportRequest {
    pub width: f64,
    pub height: f64,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions = state.sessions.read().await.len();
    Json(serde_json::json!({
        "status": "ok",
        "boot_time": state.boot_time,
        "sessions": sessions,
    }))
}

/// POST /api/sessions - Start a new, empty session.
pub async fn create(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    let id = Uuid::new_v4();
    let entry = SessionEntry::new();
    let view = SessionView::new(id, &entry);
    state.sessions.write().await.insert(id, entry);
    info!(%id, "Session created");
    Json(view)
}

/// GET /api/sessions/:id
pub async fn show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |_| Ok(())).await
}

/// PUT /api/sessions/:id/viewport - Report the displayed room size.
pub async fn viewport(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ViewportRequest>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry
            .session
            .set_display_size(Size::new(req.width, req.height))
    })
    .await
}

/// POST /api/sessions/:id/undo
pub async fn undo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| entry.session.undo()).await
}

/// POST /api/sessions/:id/reset
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry.controller.pointer_up();
        entry.session.reset();
        Ok(())
    })
    .await
}

/// GET /api/sessions/:id/image - Current display image.
pub async fn image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let image = {
        let mut sessions = state.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.touch();
        entry
            .session
            .display_image()
            .cloned()
            .ok_or(RoomstageError::NoRoom)?
    };

    Ok((
        [(header::CONTENT_TYPE, image.mime_type().to_string())],
        image.bytes().to_vec(),
    ))
}

/// GET /api/sessions/:id/download - Current display image as an attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let download = {
        let mut sessions = state.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.touch();
        entry.session.download()?
    };

    Ok((
        [
            (
                header::CONTENT_TYPE,
                download.image.mime_type().to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", download.filename),
            ),
        ],
        download.image.bytes().to_vec(),
    ))
}
