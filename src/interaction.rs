//! # Interaction Controller
//!
//! Turns pointer drags into placement moves and resizes.
//!
//! ```text
//!          pointer_down (body)   ┌──────────────────┐
//!   Idle ──────────────────────► │ Dragging(Move)   │ ──┐
//!    ▲     pointer_down (handle) ├──────────────────┤   │ pointer_move
//!    │  ───────────────────────► │ Dragging(Resize) │ ◄─┘
//!    │                           └──────────────────┘
//!    └────────────── pointer_up ────────────┘
//! ```
//!
//! The gesture remembers the pointer position and the target placement as
//! they were on pointer-down. Every move event is applied relative to that
//! start state, never to the previous event.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RoomstageError};
use crate::placement::{Hit, Placement, PlacementId, Point};
use crate::session::Session;

/// What a drag does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DragMode {
    Move,
    Resize,
}

impl From<Hit> for DragMode {
    fn from(hit: Hit) -> Self {
        match hit {
            Hit::Body => DragMode::Move,
            Hit::Handle => DragMode::Resize,
        }
    }
}

/// Start state of an active gesture.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub mode: DragMode,
    pub target: PlacementId,
    pub start_pointer: Point,
    origin: Placement,
}

impl Interaction {
    /// The target placement as it was when the gesture began.
    pub fn origin(&self) -> &Placement {
        &self.origin
    }
}

#[derive(Debug, Clone, Default)]
enum InteractionState {
    #[default]
    Idle,
    Dragging(Interaction),
}

/// Owns at most one active gesture.
#[derive(Debug, Clone, Default)]
pub struct InteractionController {
    state: InteractionState,
}

impl InteractionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a gesture is active and pointer events must be tracked.
    pub fn is_tracking(&self) -> bool {
        matches!(self.state, InteractionState::Dragging(_))
    }

    pub fn active(&self) -> Option<&Interaction> {
        match &self.state {
            InteractionState::Dragging(interaction) => Some(interaction),
            InteractionState::Idle => None,
        }
    }

    /// Start a gesture on `target`.
    ///
    /// Returns `Ok(false)` and changes nothing if a gesture is already active.
    pub fn pointer_down(
        &mut self,
        session: &mut Session,
        target: PlacementId,
        mode: DragMode,
        pointer: Point,
    ) -> Result<bool> {
        if self.is_tracking() {
            debug!(placement = %target, "Ignoring pointer-down during an active gesture");
            return Ok(false);
        }
        if session.original_room().is_none() {
            return Err(RoomstageError::NoRoom);
        }
        let origin = session
            .placement(target)
            .cloned()
            .ok_or(RoomstageError::PlacementNotFound(target))?;

        session.select(target)?;
        self.state = InteractionState::Dragging(Interaction {
            mode,
            target,
            start_pointer: pointer,
            origin,
        });
        debug!(placement = %target, ?mode, "Gesture started");
        Ok(true)
    }

    /// Start a gesture on whatever is under the pointer.
    ///
    /// The resize handle of the topmost placement starts a resize, its body
    /// a move. Empty space clears the selection and starts nothing.
    pub fn pointer_down_at(&mut self, session: &mut Session, pointer: Point) -> Result<bool> {
        if self.is_tracking() {
            return Ok(false);
        }
        match session.hit_test(pointer) {
            Some((id, hit)) => self.pointer_down(session, id, hit.into(), pointer),
            None => {
                session.clear_selection();
                Ok(false)
            }
        }
    }

    /// Apply the cumulative pointer delta to the target. No-op when idle.
    pub fn pointer_move(&mut self, session: &mut Session, pointer: Point) -> Result<()> {
        let InteractionState::Dragging(interaction) = &self.state else {
            return Ok(());
        };

        let dx = pointer.x - interaction.start_pointer.x;
        let dy = pointer.y - interaction.start_pointer.y;
        let target = interaction.target;

        let applied = match interaction.mode {
            DragMode::Move => {
                let moved = interaction.origin.moved_by(dx, dy);
                session.move_placement(target, moved.position)
            }
            DragMode::Resize => {
                let resized = interaction.origin.resized_by(dx);
                session.resize_placement(target, resized.size.width)
            }
        };

        if let Err(e) = applied {
            // Target removed or room replaced mid-gesture.
            self.state = InteractionState::Idle;
            return Err(e);
        }
        Ok(())
    }

    /// End the gesture, wherever the pointer is.
    pub fn pointer_up(&mut self) {
        if let InteractionState::Dragging(interaction) = &self.state {
            debug!(placement = %interaction.target, "Gesture ended");
        }
        self.state = InteractionState::Idle;
    }
}
