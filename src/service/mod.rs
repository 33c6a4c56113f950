//! # External Services
//!
//! Traits for the two remote collaborators: a description service that turns
//! a product photo into a short phrase, and a generation service that takes an
//! image plus an instruction and returns content parts.
//!
//! ## Available Backends
//!
//! - [`gemini`]: Google Generative Language REST API
//!
//! Tests provide their own implementations of these traits.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::media::ImageData;

pub use gemini::GeminiClient;

/// Response modalities a generation request may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Image,
    Text,
}

/// One generation call: an input image and an instruction.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub image: ImageData,
    pub instruction: String,
    pub modalities: Vec<Modality>,
}

/// A single part of a generation response.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineData(ImageData),
}

/// Describes a product image in a short phrase.
#[async_trait]
pub trait DescriptionService: Send + Sync {
    async fn describe(&self, image: &ImageData, instruction: &str) -> Result<String>;
}

/// Produces content from an image and an instruction.
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Vec<ContentPart>>;
}
