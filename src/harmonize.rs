//! # Harmonization Client
//!
//! Sends a flattened composite plus a natural-language instruction to the
//! generation service and extracts the resulting image.
//!
//! The instruction always asks the model to blend the listed products into
//! the scene. It then branches on whether the user typed anything:
//!
//! | User instructions | Extra constraint |
//! |-------------------|------------------|
//! | present | quote them; orientation/perspective may change, approximate size and position kept |
//! | absent | size, position and aspect ratio are frozen; only light, shadow, color and slight perspective |

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, RoomstageError};
use crate::media::ImageData;
use crate::service::{ContentPart, GenerationRequest, GenerationService, Modality};

/// Build the instruction text for a harmonize request.
pub fn build_instruction(descriptions: &[String], user_instructions: Option<&str>) -> String {
    let products = if descriptions.is_empty() {
        "the placed products".to_string()
    } else {
        descriptions.join("; ")
    };

    let mut instruction = format!(
        "This photo of a room has had the following products composited into it: {}. \
         Integrate these products naturally into the scene by matching the room's lighting, \
         shadows, reflections and color grading. Preserve the rest of the room exactly as it is \
         and do not add any new products or objects.",
        products
    );

    match user_instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(user) => {
            instruction.push_str(&format!(
                " The user has also asked for the following: \"{}\". Follow this request. You may \
                 change the orientation or perspective of the products to satisfy it, but respect \
                 the approximate size and position the user gave each product.",
                user
            ));
        }
        None => {
            instruction.push_str(
                " Do not change the size, position or aspect ratio of any placed product. Only \
                 adjust lighting, shadows and color, and apply at most a minor perspective \
                 correction so each product sits naturally in the room.",
            );
        }
    }

    instruction
}

/// Pick the first inline image out of a generation response.
pub fn extract_image(parts: Vec<ContentPart>) -> Result<ImageData> {
    let mut image = None;
    for part in parts {
        match part {
            ContentPart::InlineData(data) if image.is_none() => image = Some(data),
            ContentPart::InlineData(_) => {}
            ContentPart::Text(text) => debug!("Generation text part: {}", text),
        }
    }
    image.ok_or(RoomstageError::NoImageReturned)
}

/// Client that turns composites into harmonized images.
#[derive(Clone)]
pub struct Harmonizer {
    service: Arc<dyn GenerationService>,
}

impl Harmonizer {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self { service }
    }

    /// Harmonize a composite image.
    pub async fn harmonize(
        &self,
        composite: ImageData,
        descriptions: &[String],
        user_instructions: Option<&str>,
    ) -> Result<ImageData> {
        let instruction = build_instruction(descriptions, user_instructions);
        info!(
            products = descriptions.len(),
            bytes = composite.len(),
            "Requesting harmonization"
        );

        let parts = self
            .service
            .generate(GenerationRequest {
                image: composite,
                instruction,
                modalities: vec![Modality::Image, Modality::Text],
            })
            .await?;

        let image = extract_image(parts)?;
        info!(bytes = image.len(), mime = image.mime_type(), "Harmonized image received");
        Ok(image)
    }
}
