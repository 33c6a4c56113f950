//! HTTP handlers for the server.
//!
//! Every mutating endpoint answers with the updated [`SessionView`], so a
//! client can re-render from a single response.

pub mod harmonize;
pub mod placements;
pub mod session;
pub mod uploads;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::RoomstageError;
use crate::placement::{PlacementId, Size};
use crate::session::{Session, SessionState};

use super::state::{AppState, SessionEntry};

/// Error response: `{"success": false, "error": "<user message>"}`.
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound,
    BadRequest(String),
    Domain(RoomstageError),
}

impl From<RoomstageError> for ApiError {
    fn from(e: RoomstageError) -> Self {
        ApiError::Domain(e)
    }
}

fn status_for(e: &RoomstageError) -> StatusCode {
    match e {
        RoomstageError::NoRoom
        | RoomstageError::NoPlacements
        | RoomstageError::HarmonizeInFlight
        | RoomstageError::NothingToUndo => StatusCode::CONFLICT,
        RoomstageError::PlacementNotFound(_) | RoomstageError::ProductNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        RoomstageError::InputUnavailable(_) | RoomstageError::Image(_) => StatusCode::BAD_REQUEST,
        RoomstageError::Description(_)
        | RoomstageError::NoImageReturned
        | RoomstageError::Service(_) => StatusCode::BAD_GATEWAY,
        RoomstageError::Config(_) | RoomstageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::SessionNotFound => (
                StatusCode::NOT_FOUND,
                "Session not found or expired".to_string(),
            ),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Domain(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!("Request failed: {}", e);
                } else {
                    warn!("Request rejected: {}", e);
                }
                (status, e.user_message().to_string())
            }
        };
        (
            status,
            Json(serde_json::json!({ "success": false, "error": message })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct PlacementView {
    pub id: PlacementId,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: usize,
    pub description: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// JSON view of a session.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,
    pub display_size: Option<Size>,
    pub placements: Vec<PlacementView>,
    pub selected: Option<PlacementId>,
    pub products: Vec<ProductView>,
    pub can_harmonize: bool,
    pub undo_available: bool,
    pub dragging: bool,
    pub error: Option<String>,
}

impl SessionView {
    pub fn new(id: Uuid, entry: &SessionEntry) -> Self {
        let session: &Session = &entry.session;
        Self {
            id,
            state: session.state(),
            display_size: session.display_size(),
            placements: session
                .placements()
                .iter()
                .map(|p| PlacementView {
                    id: p.id,
                    x: p.position.x,
                    y: p.position.y,
                    width: p.size.width,
                    height: p.size.height,
                    aspect_ratio: p.aspect_ratio,
                    description: p.description.clone(),
                })
                .collect(),
            selected: session.selected(),
            products: session
                .catalog()
                .entries()
                .iter()
                .enumerate()
                .map(|(i, e)| ProductView {
                    id: i,
                    description: e.description.clone(),
                    width: e.natural_size.map(|(w, _)| w),
                    height: e.natural_size.map(|(_, h)| h),
                })
                .collect(),
            can_harmonize: session.can_harmonize(),
            undo_available: session.undo_available(),
            dragging: entry.controller.is_tracking(),
            error: session.last_error().map(str::to_string),
        }
    }
}

/// Run `f` against a session under the registry's write lock and answer
/// with the resulting view.
pub async fn with_session<F>(state: &AppState, id: Uuid, f: F) -> ApiResult<Json<SessionView>>
where
    F: FnOnce(&mut SessionEntry) -> Result<(), RoomstageError>,
{
    let mut sessions = state.sessions.write().await;
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
    entry.touch();
    f(entry)?;
    Ok(Json(SessionView::new(id, entry)))
}
