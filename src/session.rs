//! # Session State Machine
//!
//! A [`Session`] owns everything one user is working on: the room image, the
//! product catalog, the placements, the selection and the single-level undo
//! snapshot. Every UI event maps to one method call here.
//!
//! ## States
//!
//! ```text
//!            load_room                add_placement
//!   Empty ─────────────► RoomLoaded ◄──────────────► Placing
//!                            ▲     remove (last)        │
//!                            │                          │ begin_harmonize
//!                            │ add_placement            ▼
//!                       Harmonized ◄──── success ─── Harmonizing
//!                            │                          │
//!                            │ undo                     │ failure
//!                            ▼                          ▼
//!                          Placing                    Placing
//! ```
//!
//! `load_room` and `reset` are valid from every state.
//!
//! ## Harmonize in Three Steps
//!
//! The network call must not hold a borrow of the session (the server keeps
//! sessions behind a lock), so harmonizing is split:
//!
//! 1. [`Session::begin_harmonize`] checks preconditions, captures the undo
//!    snapshot and returns a [`HarmonizeTicket`].
//! 2. [`HarmonizeTicket::run`] builds the composite and calls the service.
//! 3. [`Session::finish_harmonize`] applies the outcome.
//!
//! [`Session::harmonize`] does all three for callers that own the session.
//! A ticket issued before a `load_room`/`reset` is stale and its result is
//! dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog::{self, Catalog, CatalogEntry, ProductId};
use crate::composite;
use crate::error::{Result, RoomstageError};
use crate::harmonize::Harmonizer;
use crate::media::ImageData;
use crate::placement::{Hit, Placement, PlacementId, Point, Size};
use crate::service::DescriptionService;

/// Coarse session state, derived from the session's fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No room image yet
    Empty,
    /// Room loaded, nothing placed
    RoomLoaded,
    /// At least one placement pending harmonization
    Placing,
    /// A harmonize request is in flight
    Harmonizing,
    /// Display image replaced by a harmonized result, undo available
    Harmonized,
}

/// Display image and placements captured right before a harmonize.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub display_image: ImageData,
    pub placements: Vec<Placement>,
}

/// Everything a harmonize request needs, detached from the session.
#[derive(Debug, Clone)]
pub struct HarmonizeTicket {
    epoch: u64,
    room: ImageData,
    display_size: Option<Size>,
    placements: Vec<Placement>,
    instructions: Option<String>,
}

impl HarmonizeTicket {
    /// Composite the placements and send them to the generation service.
    pub async fn run(&self, harmonizer: &Harmonizer) -> Result<ImageData> {
        let display = match self.display_size {
            Some(size) => size,
            None => {
                let (w, h) = self.room.dimensions().ok_or_else(|| {
                    RoomstageError::InputUnavailable("Room image has no readable size".to_string())
                })?;
                debug!("No viewport reported, compositing at natural size");
                Size::new(w as f64, h as f64)
            }
        };

        let composite = composite::build_composite(&self.room, display, &self.placements).await?;
        let descriptions: Vec<String> = self
            .placements
            .iter()
            .map(|p| p.description.clone())
            .collect();

        harmonizer
            .harmonize(composite, &descriptions, self.instructions.as_deref())
            .await
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }
}

/// A file ready to be saved by the user.
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub image: ImageData,
}

/// One user's in-memory working state.
#[derive(Debug, Default)]
pub struct Session {
    original_room: Option<ImageData>,
    display_image: Option<ImageData>,
    display_size: Option<Size>,
    placements: Vec<Placement>,
    selected: Option<PlacementId>,
    catalog: Catalog,
    undo: Option<Snapshot>,
    in_flight: Option<Snapshot>,
    epoch: u64,
    last_error: Option<String>,
    next_id: u64,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        if self.original_room.is_none() {
            SessionState::Empty
        } else if self.in_flight.is_some() {
            SessionState::Harmonizing
        } else if !self.placements.is_empty() {
            SessionState::Placing
        } else if self.undo.is_some() {
            SessionState::Harmonized
        } else {
            SessionState::RoomLoaded
        }
    }

    pub fn original_room(&self) -> Option<&ImageData> {
        self.original_room.as_ref()
    }

    pub fn display_image(&self) -> Option<&ImageData> {
        self.display_image.as_ref()
    }

    pub fn display_size(&self) -> Option<Size> {
        self.display_size
    }

    /// Placements in insertion (= z) order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn placement(&self, id: PlacementId) -> Option<&Placement> {
        self.placements.iter().find(|p| p.id == id)
    }

    pub fn selected(&self) -> Option<PlacementId> {
        self.selected
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn is_harmonizing(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True when harmonize may be triggered (room, placements, nothing in flight).
    pub fn can_harmonize(&self) -> bool {
        self.display_image.is_some() && !self.placements.is_empty() && self.in_flight.is_none()
    }

    /// True right after a successful harmonize, until the placements change.
    pub fn undo_available(&self) -> bool {
        self.undo.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Record a user-facing error.
    pub fn set_error(&mut self, error: &RoomstageError) {
        self.last_error = Some(error.user_message().to_string());
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Topmost placement under `point`, and which part was hit.
    pub fn hit_test(&self, point: Point) -> Option<(PlacementId, Hit)> {
        self.placements
            .iter()
            .rev()
            .find_map(|p| p.hit(point).map(|hit| (p.id, hit)))
    }

    // ------------------------------------------------------------------
    // Room
    // ------------------------------------------------------------------

    /// Replace the room. Discards placements, selection, undo and any
    /// in-flight harmonize.
    pub fn load_room(&mut self, image: ImageData) -> Result<()> {
        let (w, h) = image.dimensions().ok_or_else(|| {
            RoomstageError::Image(format!("Unreadable room image ({})", image.mime_type()))
        })?;
        info!(width = w, height = h, "Room loaded");

        self.original_room = Some(image.clone());
        self.display_image = Some(image);
        self.display_size = None;
        self.discard_work();
        Ok(())
    }

    /// Report the size the display image currently renders at.
    pub fn set_display_size(&mut self, size: Size) -> Result<()> {
        if !(size.width > 0.0 && size.height > 0.0) {
            return Err(RoomstageError::InputUnavailable(format!(
                "Invalid display size {}x{}",
                size.width, size.height
            )));
        }
        self.display_size = Some(size);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    /// Describe and append a batch of product uploads.
    ///
    /// On failure nothing is appended and one error is recorded.
    pub async fn ingest_products(
        &mut self,
        service: Arc<dyn DescriptionService>,
        uploads: Vec<ImageData>,
    ) -> Result<Vec<ProductId>> {
        match catalog::describe_batch(service, uploads).await {
            Ok(entries) => Ok(self.add_products(entries)),
            Err(e) => {
                self.set_error(&e);
                Err(e)
            }
        }
    }

    /// Append an already-described batch.
    pub fn add_products(&mut self, entries: Vec<CatalogEntry>) -> Vec<ProductId> {
        self.catalog.extend(entries)
    }

    // ------------------------------------------------------------------
    // Placements
    // ------------------------------------------------------------------

    /// Drop a catalog product centered at `drop_point`.
    ///
    /// Returns `Ok(None)` without changing anything if the product's natural
    /// size is unknown.
    pub fn add_placement(
        &mut self,
        product: ProductId,
        drop_point: Point,
    ) -> Result<Option<PlacementId>> {
        self.require_room()?;
        let entry = self
            .catalog
            .get(product)
            .ok_or(RoomstageError::ProductNotFound(product))?;

        let id = PlacementId(self.next_id);
        let Some(placement) = Placement::create(
            id,
            entry.image.clone(),
            entry.description.clone(),
            drop_point,
            entry.natural_size,
        ) else {
            debug!(%product, "Product has no natural size yet, drop ignored");
            return Ok(None);
        };

        self.next_id += 1;
        self.placements.push(placement);
        self.undo = None;
        debug!(%id, %product, "Placement added");
        Ok(Some(id))
    }

    pub fn remove_placement(&mut self, id: PlacementId) -> Result<()> {
        self.require_room()?;
        let index = self.index_of(id)?;
        self.placements.remove(index);
        if self.selected == Some(id) {
            self.selected = None;
        }
        self.undo = None;
        Ok(())
    }

    pub fn remove_all_placements(&mut self) -> Result<()> {
        self.require_room()?;
        if !self.placements.is_empty() {
            self.placements.clear();
            self.selected = None;
            self.undo = None;
        }
        Ok(())
    }

    /// Move a placement's top-left corner to `position`.
    pub fn move_placement(&mut self, id: PlacementId, position: Point) -> Result<()> {
        self.require_room()?;
        let index = self.index_of(id)?;
        self.placements[index] = self.placements[index].moved_to(position);
        self.undo = None;
        Ok(())
    }

    /// Set a placement's width; height follows its aspect ratio.
    pub fn resize_placement(&mut self, id: PlacementId, width: f64) -> Result<()> {
        self.require_room()?;
        let index = self.index_of(id)?;
        self.placements[index] = self.placements[index].with_width(width);
        self.undo = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    pub fn select(&mut self, id: PlacementId) -> Result<()> {
        self.index_of(id)?;
        self.selected = Some(id);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Click on the workspace: selects the topmost placement under the
    /// point, or clears the selection when the click hits empty space.
    pub fn click(&mut self, point: Point) -> Option<PlacementId> {
        self.selected = self.hit_test(point).map(|(id, _)| id);
        self.selected
    }

    // ------------------------------------------------------------------
    // Harmonize
    // ------------------------------------------------------------------

    /// Check preconditions, snapshot, and enter `Harmonizing`.
    pub fn begin_harmonize(&mut self, instructions: Option<&str>) -> Result<HarmonizeTicket> {
        if self.in_flight.is_some() {
            return Err(RoomstageError::HarmonizeInFlight);
        }
        if self.placements.is_empty() {
            let err = RoomstageError::NoPlacements;
            self.set_error(&err);
            return Err(err);
        }
        let room = self.display_image.clone().ok_or(RoomstageError::NoRoom)?;

        self.last_error = None;
        self.in_flight = Some(Snapshot {
            display_image: room.clone(),
            placements: self.placements.clone(),
        });

        Ok(HarmonizeTicket {
            epoch: self.epoch,
            room,
            display_size: self.display_size,
            placements: self.placements.clone(),
            instructions: instructions.map(str::to_string),
        })
    }

    /// Apply the outcome of a ticket.
    ///
    /// Success replaces the display image, clears placements and arms undo.
    /// Failure leaves display image and placements untouched and records the
    /// error. A stale ticket changes nothing.
    pub fn finish_harmonize(
        &mut self,
        ticket: HarmonizeTicket,
        outcome: Result<ImageData>,
    ) -> Result<()> {
        if ticket.epoch != self.epoch {
            warn!("Dropping harmonize result for a room that is no longer loaded");
            return Ok(());
        }
        let snapshot = self.in_flight.take();

        match outcome {
            Ok(image) => {
                self.display_image = Some(image);
                self.placements.clear();
                self.selected = None;
                self.undo = snapshot;
                info!("Harmonize complete");
                Ok(())
            }
            Err(e) => {
                warn!("Harmonize failed: {}", e);
                self.set_error(&e);
                Err(e)
            }
        }
    }

    /// Begin, run and finish a harmonize in one call.
    pub async fn harmonize(
        &mut self,
        harmonizer: &Harmonizer,
        instructions: Option<&str>,
    ) -> Result<()> {
        let ticket = self.begin_harmonize(instructions)?;
        let outcome = ticket.run(harmonizer).await;
        self.finish_harmonize(ticket, outcome)
    }

    // ------------------------------------------------------------------
    // Undo / reset / download
    // ------------------------------------------------------------------

    /// Restore the display image and placements from before the last
    /// harmonize.
    pub fn undo(&mut self) -> Result<()> {
        let snapshot = self.undo.take().ok_or(RoomstageError::NothingToUndo)?;
        self.display_image = Some(snapshot.display_image);
        self.placements = snapshot.placements;
        self.selected = None;
        Ok(())
    }

    /// Back to the original room with nothing placed.
    pub fn reset(&mut self) {
        self.display_image = self.original_room.clone();
        self.discard_work();
    }

    /// The current display image as a timestamp-named file.
    pub fn download(&self) -> Result<Download> {
        self.download_at(Utc::now())
    }

    pub fn download_at(&self, now: DateTime<Utc>) -> Result<Download> {
        let image = self.display_image.clone().ok_or(RoomstageError::NoRoom)?;
        Ok(Download {
            filename: format!("roomstage-{}.{}", now.timestamp_millis(), image.extension()),
            image,
        })
    }

    // ------------------------------------------------------------------

    fn require_room(&self) -> Result<()> {
        if self.original_room.is_none() {
            return Err(RoomstageError::NoRoom);
        }
        Ok(())
    }

    fn index_of(&self, id: PlacementId) -> Result<usize> {
        self.placements
            .iter()
            .position(|p| p.id == id)
            .ok_or(RoomstageError::PlacementNotFound(id))
    }

    fn discard_work(&mut self) {
        self.placements.clear();
        self.selected = None;
        self.undo = None;
        self.in_flight = None;
        self.last_error = None;
        self.epoch += 1;
    }
}
