//! Harmonize handler.
//!
//! The registry lock is released while the composite is built and the
//! generation service is called; the session's `Harmonizing` state keeps a
//! second request from starting in the meantime.
//!
//! The run and the write-back happen on a spawned task. If the client goes
//! away the handler future is dropped, but the task still applies the outcome
//! so the session always leaves `Harmonizing`.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::RoomstageError;

use super::super::state::AppState;
use super::{ApiError, ApiResult, SessionView};

/// Request body for harmonize. An empty body means no instructions.
#[derive(Debug, Default, Deserialize)]
pub struct HarmonizeRequest {
    #[serde(default)]
    pub instructions: Option<String>,
}

impl HarmonizeRequest {
    fn parse(body: &[u8]) -> ApiResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid harmonize request: {}", e)))
    }
}

/// POST /api/sessions/:id/harmonize
pub async fn harmonize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult<Json<SessionView>> {
    let req = HarmonizeRequest::parse(&body)?;

    let ticket = {
        let mut sessions = state.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.touch();
        entry.controller.pointer_up();
        entry.session.begin_harmonize(req.instructions.as_deref())?
    };

    info!(%id, placements = ticket.placements().len(), "Harmonize started");
    let task_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        let outcome = ticket.run(&task_state.harmonizer).await;

        let mut sessions = task_state.sessions.write().await;
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.touch();
        entry.session.finish_harmonize(ticket, outcome)?;
        Ok::<_, ApiError>(SessionView::new(id, entry))
    });

    match task.await {
        Ok(view) => view.map(Json),
        Err(e) => {
            error!(%id, "Harmonize task failed: {}", e);
            Err(RoomstageError::Service(format!("Harmonize task failed: {}", e)).into())
        }
    }
}
