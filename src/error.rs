//! # Error Types
//!
//! This module defines error types used throughout the roomstage library.
//!
//! The `Display` output carries technical detail and is meant for logs.
//! Anything shown to a user goes through [`RoomstageError::user_message`].

use thiserror::Error;

use crate::catalog::ProductId;
use crate::placement::PlacementId;

/// Main error type for roomstage operations
#[derive(Debug, Error)]
pub enum RoomstageError {
    /// A required input (base image, decoded pixels, viewport) is not ready
    #[error("Input unavailable: {0}")]
    InputUnavailable(String),

    /// Operation needs a room image and none is loaded
    #[error("No room image loaded")]
    NoRoom,

    /// Harmonize was requested with zero placements
    #[error("No placements to harmonize")]
    NoPlacements,

    /// A harmonize request is already in flight for this session
    #[error("Harmonize already in progress")]
    HarmonizeInFlight,

    #[error("Placement not found: {0}")]
    PlacementNotFound(PlacementId),

    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Undo requested without an armed snapshot
    #[error("Nothing to undo")]
    NothingToUndo,

    /// A product description request failed (fails the whole batch)
    #[error("Description batch failed: {0}")]
    Description(String),

    /// Generation response contained no inline image part
    #[error("Generation service returned no image")]
    NoImageReturned,

    /// External service transport or protocol error
    #[error("Service error: {0}")]
    Service(String),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RoomstageError {
    /// Short, non-technical message suitable for showing to a user.
    pub fn user_message(&self) -> &'static str {
        match self {
            RoomstageError::NoRoom => "Please upload a room image first.",
            RoomstageError::NoPlacements => "Please add a product first.",
            RoomstageError::HarmonizeInFlight => "Harmonization is already in progress.",
            RoomstageError::PlacementNotFound(_) | RoomstageError::ProductNotFound(_) => {
                "That item no longer exists."
            }
            RoomstageError::NothingToUndo => "There is nothing to undo.",
            RoomstageError::Description(_) => {
                "Failed to analyze product images. Please try again."
            }
            RoomstageError::NoImageReturned => "The AI did not return an image. Please try again.",
            RoomstageError::Service(_) => "Failed to harmonize the image. Please try again.",
            RoomstageError::InputUnavailable(_)
            | RoomstageError::Image(_)
            | RoomstageError::Config(_)
            | RoomstageError::Io(_) => "Something went wrong. Please try again.",
        }
    }
}

impl From<image::ImageError> for RoomstageError {
    fn from(e: image::ImageError) -> Self {
        RoomstageError::Image(e.to_string())
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, RoomstageError>;
