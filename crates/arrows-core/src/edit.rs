//! Decoded edit intents and the queue that holds them between frames.
//!
//! Edits are submitted by the client (input handling, scripting, paste) and
//! applied as one batch by `Engine::apply_pending`, so the flat node order
//! is rebuilt once per batch rather than once per touched cell.

use serde::{Deserialize, Serialize};

use crate::cell::{LogicFn, Rotation};
use crate::id::ShapeId;

// ---------------------------------------------------------------------------
// Edit enum
// ---------------------------------------------------------------------------

/// A single edit to the raw grid, in world coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// Place a cell, replacing whatever occupied the position.
    Place {
        x: i32,
        y: i32,
        shape: ShapeId,
        rotation: Rotation,
        mirrored: bool,
        logic: LogicFn,
    },
    /// Clear a position. Clearing an empty position is a no-op.
    Remove { x: i32, y: i32 },
    /// Change the logic function of an existing cell.
    SetLogic { x: i32, y: i32, logic: LogicFn },
    /// Force a cell's current activation in the active model.
    SetActive { x: i32, y: i32, active: bool },
}

impl Edit {
    /// Place an unmirrored `Or` cell.
    pub fn place(x: i32, y: i32, shape: u8, rotation: Rotation) -> Self {
        Edit::Place {
            x,
            y,
            shape: ShapeId(shape),
            rotation,
            mirrored: false,
            logic: LogicFn::Or,
        }
    }

    /// World position the edit touches.
    pub fn position(&self) -> (i32, i32) {
        match *self {
            Edit::Place { x, y, .. }
            | Edit::Remove { x, y }
            | Edit::SetLogic { x, y, .. }
            | Edit::SetActive { x, y, .. } => (x, y),
        }
    }

    /// Whether the edit can change the graph's structure.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Edit::SetActive { .. })
    }
}

// ---------------------------------------------------------------------------
// EditQueue
// ---------------------------------------------------------------------------

/// Edits waiting for the next batch, plus an optional bounded history of
/// applied edits.
#[derive(Debug, Clone, Default)]
pub struct EditQueue {
    pending: Vec<Edit>,
    /// Applied edits: (tick, edit).
    history: Vec<(u64, Edit)>,
    /// Maximum history entries to retain. 0 = no history.
    max_history: usize,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue that retains up to `max_history` applied edits.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            max_history,
            ..Self::default()
        }
    }

    pub fn push(&mut self, edit: Edit) {
        self.pending.push(edit);
    }

    pub fn push_batch(&mut self, edits: impl IntoIterator<Item = Edit>) {
        self.pending.extend(edits);
    }

    /// Drain all pending edits in submission order.
    pub fn drain(&mut self) -> Vec<Edit> {
        std::mem::take(&mut self.pending)
    }

    /// Record edits that were applied at `tick`, trimming the oldest
    /// entries past the history limit.
    pub fn record(&mut self, tick: u64, edits: &[Edit]) {
        if self.max_history == 0 {
            return;
        }
        self.history
            .extend(edits.iter().map(|edit| (tick, edit.clone())));
        let excess = self.history.len().saturating_sub(self.max_history);
        if excess > 0 {
            self.history.drain(..excess);
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn history(&self) -> &[(u64, Edit)] {
        &self.history
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

// ===========================================================================
// Tests
// ===========================================================================
