//! Server state and session registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::harmonize::Harmonizer;
use crate::interaction::InteractionController;
use crate::service::{DescriptionService, GenerationService};
use crate::session::Session;

/// One browser session: its state plus its in-progress gesture.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Session,
    pub controller: InteractionController,
    pub last_accessed: Instant,
}

impl SessionEntry {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
            controller: InteractionController::new(),
            last_accessed: Instant::now(),
        }
    }

    /// Mark the session as used now.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    /// True if the session has been idle for at least `ttl`.
    pub fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_accessed) >= ttl
    }
}

impl Default for SessionEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    /// Unix timestamp of server boot.
    pub boot_time: u64,
    pub sessions: RwLock<HashMap<Uuid, SessionEntry>>,
    pub describer: Arc<dyn DescriptionService>,
    pub harmonizer: Harmonizer,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        describer: Arc<dyn DescriptionService>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        let boot_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            config,
            boot_time,
            sessions: RwLock::new(HashMap::new()),
            describer,
            harmonizer: Harmonizer::new(generator),
        }
    }

    /// Drop sessions idle for longer than the configured TTL.
    ///
    /// Returns how many were removed.
    pub async fn expire_sessions(&self) -> usize {
        let now = Instant::now();
        let ttl = self.config.session_ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !entry.is_expired(now, ttl));
        before - sessions.len()
    }
}
