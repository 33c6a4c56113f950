//! # Roomstage - Product Staging for Room Photos
//!
//! Roomstage lets a client drop product images onto a photograph of a room,
//! move and resize them, and then ask a generative image API to blend them
//! into the scene. It provides:
//!
//! - **Placement model**: display-space geometry with a fixed aspect ratio
//! - **Interaction controller**: pointer drags mapped to moves and resizes
//! - **Compositing**: room + placements flattened at natural resolution
//! - **Harmonization**: prompt building and image extraction for the API
//! - **Sessions**: the state machine tying it together, with one-step undo
//! - **Server**: an HTTP/JSON surface over sessions
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use roomstage::{
//!     config::ServiceConfig,
//!     harmonize::Harmonizer,
//!     media::ImageData,
//!     placement::Point,
//!     service::GeminiClient,
//!     session::Session,
//! };
//!
//! # async fn example() -> Result<(), roomstage::RoomstageError> {
//! let client = Arc::new(GeminiClient::new(ServiceConfig::new("api-key"))?);
//!
//! let mut session = Session::new();
//! session.load_room(ImageData::sniff(std::fs::read("room.jpg")?))?;
//!
//! let products = session
//!     .ingest_products(client.clone(), vec![ImageData::sniff(std::fs::read("chair.png")?)])
//!     .await?;
//! session.add_placement(products[0], Point::new(320.0, 410.0))?;
//!
//! session.harmonize(&Harmonizer::new(client), None).await?;
//! std::fs::write("staged.png", session.display_image().unwrap().bytes())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`placement`] | Placement geometry |
//! | [`interaction`] | Drag gestures |
//! | [`catalog`] | Product images and descriptions |
//! | [`composite`] | Raster compositing |
//! | [`harmonize`] | Harmonization client |
//! | [`session`] | Session state machine |
//! | [`service`] | External service traits and the Gemini backend |
//! | [`server`] | HTTP API |
//! | [`config`] | Configuration |
//! | [`error`] | Error types |

pub mod catalog;
pub mod composite;
pub mod config;
pub mod error;
pub mod harmonize;
pub mod interaction;
pub mod media;
pub mod placement;
pub mod server;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use error::RoomstageError;
pub use interaction::InteractionController;
pub use session::Session;
