//! # Configuration
//!
//! Settings for the generation API client and for the HTTP server.
//!
//! Both structs can be built directly (tests, library use) or filled from the
//! command line; see `main.rs` for the flags and their environment fallbacks.
//!
//! | Setting | Default |
//! |---------|---------|
//! | API base URL | `https://generativelanguage.googleapis.com` |
//! | Description model | `gemini-2.5-flash` |
//! | Image model | `gemini-2.5-flash-image-preview` |
//! | Request timeout | 120 s |
//! | Listen address | `127.0.0.1:8080` |
//! | Upload limit | 50 MB |
//! | Session TTL | 3600 s |

use std::time::Duration;

use crate::error::{Result, RoomstageError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_DESCRIPTION_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Generation API client configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// API key sent with every request
    pub api_key: String,
    /// Scheme and host of the API (no trailing slash)
    pub base_url: String,
    /// Model used for product descriptions
    pub description_model: String,
    /// Model used for image harmonization
    pub image_model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl ServiceConfig {
    /// Configuration with default endpoint and models.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            description_model: DEFAULT_DESCRIPTION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Reject configurations that cannot possibly reach the API.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RoomstageError::Config(
                "API key is empty (set GEMINI_API_KEY or pass --api-key)".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RoomstageError::Config(format!(
                "Base URL must be http(s): {}",
                self.base_url
            )));
        }
        Ok(())
    }

    /// `generateContent` endpoint for a model.
    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model
        )
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Maximum accepted upload body in bytes
    pub max_upload_bytes: usize,
    /// Idle time after which a session is dropped
    pub session_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            max_upload_bytes: 50 * 1024 * 1024,
            session_ttl: Duration::from_secs(3600),
        }
    }
}
