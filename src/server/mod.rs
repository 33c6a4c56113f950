//! # HTTP Server for Room Staging
//!
//! Exposes sessions over a JSON API. A client uploads a room photo and
//! product images, drags products around with pointer events, and asks for a
//! harmonized result.
//!
//! ## Usage
//!
//! ```bash
//! GEMINI_API_KEY=... roomstage serve --listen 0.0.0.0:8080
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Action |
//! |--------|------|--------|
//! | GET | `/health` | Liveness |
//! | POST | `/api/sessions` | Create a session |
//! | GET | `/api/sessions/:id` | Session view |
//! | POST | `/api/sessions/:id/room` | Upload room (`image`) |
//! | PUT | `/api/sessions/:id/viewport` | Report displayed size |
//! | POST | `/api/sessions/:id/products` | Upload products (`images`) |
//! | POST | `/api/sessions/:id/placements` | Drop a product |
//! | DELETE | `/api/sessions/:id/placements` | Remove all placements |
//! | DELETE | `/api/sessions/:id/placements/:pid` | Remove one placement |
//! | POST | `/api/sessions/:id/click` | Select / clear selection |
//! | POST | `/api/sessions/:id/pointer/{down,move,up}` | Drag gesture |
//! | POST | `/api/sessions/:id/harmonize` | Harmonize |
//! | POST | `/api/sessions/:id/undo` | Undo last harmonize |
//! | POST | `/api/sessions/:id/reset` | Back to the original room |
//! | GET | `/api/sessions/:id/image` | Current display image |
//! | GET | `/api/sessions/:id/download` | Current image as attachment |

mod handlers;
mod state;

pub use handlers::{PlacementView, ProductView, SessionView};
pub use state::{AppState, SessionEntry};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::RoomstageError;

/// Build the API router over shared state.
pub fn router(app_state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(app_state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(handlers::session::health))
        // Sessions
        .route("/api/sessions", post(handlers::session::create))
        .route("/api/sessions/:id", get(handlers::session::show))
        .route(
            "/api/sessions/:id/viewport",
            put(handlers::session::viewport),
        )
        .route("/api/sessions/:id/undo", post(handlers::session::undo))
        .route("/api/sessions/:id/reset", post(handlers::session::reset))
        .route("/api/sessions/:id/image", get(handlers::session::image))
        .route(
            "/api/sessions/:id/download",
            get(handlers::session::download),
        )
        // Uploads
        .route(
            "/api/sessions/:id/room",
            post(handlers::uploads::upload_room).layer(upload_limit.clone()),
        )
        .route(
            "/api/sessions/:id/products",
            post(handlers::uploads::upload_products).layer(upload_limit),
        )
        // Placements
        .route(
            "/api/sessions/:id/placements",
            post(handlers::placements::add).delete(handlers::placements::remove_all),
        )
        .route(
            "/api/sessions/:id/placements/:pid",
            delete(handlers::placements::remove),
        )
        .route("/api/sessions/:id/click", post(handlers::placements::click))
        .route(
            "/api/sessions/:id/pointer/down",
            post(handlers::placements::pointer_down),
        )
        .route(
            "/api/sessions/:id/pointer/move",
            post(handlers::placements::pointer_move),
        )
        .route(
            "/api/sessions/:id/pointer/up",
            post(handlers::placements::pointer_up),
        )
        // Harmonize
        .route(
            "/api/sessions/:id/harmonize",
            post(handlers::harmonize::harmonize),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use roomstage::config::{ServerConfig, ServiceConfig};
/// use roomstage::server::{serve, AppState};
/// use roomstage::service::GeminiClient;
///
/// # async fn example() -> Result<(), roomstage::RoomstageError> {
/// let client = Arc::new(GeminiClient::new(ServiceConfig::new("api-key"))?);
/// let state = AppState::new(ServerConfig::default(), client.clone(), client);
/// serve(state).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(app_state: AppState) -> Result<(), RoomstageError> {
    let config: ServerConfig = app_state.config.clone();
    let app_state = Arc::new(app_state);

    // Spawn background session cleanup task
    tokio::spawn(cleanup_sessions(app_state.clone()));

    let app = router(app_state);

    info!(listen = %config.listen_addr, "Roomstage HTTP server starting");

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            RoomstageError::Config(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Background task to drop expired sessions.
async fn cleanup_sessions(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));

    loop {
        interval.tick().await;
        let removed = state.expire_sessions().await;
        if removed > 0 {
            let remaining = state.sessions.read().await.len();
            info!(removed, remaining, "Cleaned up expired sessions");
        }
    }
}
