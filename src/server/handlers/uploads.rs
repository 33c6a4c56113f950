//! Room and product upload handlers.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::catalog;
use crate::media::ImageData;

use super::super::state::AppState;
use super::{ApiError, ApiResult, SessionView, with_session};

/// Collect every file in `field_name` from a multipart body.
pub async fn read_images(
    multipart: &mut Multipart,
    field_name: &str,
) -> ApiResult<Vec<ImageData>> {
    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(field_name) {
            continue;
        }
        let filename = field.file_name().unwrap_or("unknown").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", filename, e)))?;
        images.push(ImageData::sniff(bytes.to_vec()));
    }
    Ok(images)
}

/// POST /api/sessions/:id/room - Upload the room photograph.
///
/// Replaces any previous room and discards all placements.
pub async fn upload_room(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionView>> {
    let image = read_images(&mut multipart, "image")
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::BadRequest("No image field found".to_string()))?;

    info!(%id, bytes = image.len(), mime = image.mime_type(), "Room upload");
    with_session(&state, id, |entry| {
        entry.controller.pointer_up();
        entry.session.load_room(image)
    })
    .await
}

/// POST /api/sessions/:id/products - Upload product images.
///
/// Descriptions are fetched before the session is touched; the batch is
/// appended only if every description succeeded.
pub async fn upload_products(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<Json<SessionView>> {
    if !state.sessions.read().await.contains_key(&id) {
        return Err(ApiError::SessionNotFound);
    }

    let uploads = read_images(&mut multipart, "images").await?;
    if uploads.is_empty() {
        return Err(ApiError::BadRequest("No images field found".to_string()));
    }
    info!(%id, count = uploads.len(), "Product upload");

    let outcome = catalog::describe_batch(state.describer.clone(), uploads).await;

    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
    entry.touch();
    match outcome {
        Ok(entries) => {
            entry.session.add_products(entries);
            Ok(Json(SessionView::new(id, entry)))
        }
        Err(e) => {
            entry.session.set_error(&e);
            Err(e.into())
        }
    }
}
