//! Placement, selection and pointer-gesture handlers.
//!
//! Pointer endpoints forward to the session's [`InteractionController`], one
//! request per pointer event.
//!
//! [`InteractionController`]: crate::interaction::InteractionController

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::ProductId;
use crate::interaction::DragMode;
use crate::placement::{PlacementId, Point};

use super::super::state::AppState;
use super::{ApiResult, SessionView, with_session};

/// Request body for dropping a product.
#[derive(Debug, Deserialize)]
pub struct DropRequest {
    pub product: ProductId,
    pub x: f64,
    pub y: f64,
}

/// A pointer position.
#[derive(Debug, Deserialize)]
pub struct PointerRequest {
    pub x: f64,
    pub y: f64,
}

/// Request body for pointer-down.
///
/// With `placement` set the gesture targets it directly (the client already
/// knows what was pressed); otherwise the server hit-tests the position.
#[derive(Debug, Deserialize)]
pub struct PointerDownRequest {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub placement: Option<PlacementId>,
    #[serde(default = "default_mode")]
    pub mode: DragMode,
}

fn default_mode() -> DragMode {
    DragMode::Move
}

/// POST /api/sessions/:id/placements - Drop a product onto the room.
pub async fn add(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DropRequest>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry
            .session
            .add_placement(req.product, Point::new(req.x, req.y))
            .map(|_| ())
    })
    .await
}

/// DELETE /api/sessions/:id/placements/:pid
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path((id, placement)): Path<(Uuid, u64)>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry.controller.pointer_up();
        entry.session.remove_placement(PlacementId(placement))
    })
    .await
}

/// DELETE /api/sessions/:id/placements
pub async fn remove_all(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry.controller.pointer_up();
        entry.session.remove_all_placements()
    })
    .await
}

/// POST /api/sessions/:id/click - Select under the pointer, or clear.
pub async fn click(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PointerRequest>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry.session.click(Point::new(req.x, req.y));
        Ok(())
    })
    .await
}

/// POST /api/sessions/:id/pointer/down
pub async fn pointer_down(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PointerDownRequest>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        let pointer = Point::new(req.x, req.y);
        match req.placement {
            Some(target) => {
                entry
                    .controller
                    .pointer_down(&mut entry.session, target, req.mode, pointer)?;
            }
            None => {
                entry.controller.pointer_down_at(&mut entry.session, pointer)?;
            }
        }
        Ok(())
    })
    .await
}

/// POST /api/sessions/:id/pointer/move
pub async fn pointer_move(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<PointerRequest>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry
            .controller
            .pointer_move(&mut entry.session, Point::new(req.x, req.y))
    })
    .await
}

/// POST /api/sessions/:id/pointer/up
pub async fn pointer_up(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionView>> {
    with_session(&state, id, |entry| {
        entry.controller.pointer_up();
        Ok(())
    })
    .await
}
