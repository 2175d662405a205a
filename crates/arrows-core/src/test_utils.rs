//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::cell::{LogicFn, Rotation};
use crate::edit::Edit;
use crate::engine::Engine;
use crate::id::ShapeId;
use crate::sim::SimulationMode;

// ===========================================================================
// Edit constructors
// ===========================================================================

pub fn arrow(x: i32, y: i32, rotation: Rotation) -> Edit {
    Edit::place(x, y, 1, rotation)
}

pub fn cell(x: i32, y: i32, shape: u8, rotation: Rotation, logic: LogicFn) -> Edit {
    Edit::Place {
        x,
        y,
        shape: ShapeId(shape),
        rotation,
        mirrored: false,
        logic,
    }
}

pub fn activate(x: i32, y: i32) -> Edit {
    Edit::SetActive { x, y, active: true }
}

/// East-facing straight arrows on `y`, from `x0` for `len` cells.
pub fn east_row(x0: i32, y: i32, len: i32) -> Vec<Edit> {
    (x0..x0 + len)
        .map(|x| arrow(x, y, Rotation::Cw90))
        .collect()
}

/// A closed loop of `2 * (w + h)` arrows around the rectangle whose
/// top-left corner is `(x0, y0)`, travelling clockwise.
pub fn clockwise_loop(x0: i32, y0: i32, w: i32, h: i32) -> Vec<Edit> {
    let mut edits = Vec::new();
    for x in x0..x0 + w {
        edits.push(arrow(x, y0, Rotation::Cw90));
    }
    for y in y0..y0 + h {
        edits.push(arrow(x0 + w, y, Rotation::Cw180));
    }
    for x in (x0 + 1..=x0 + w).rev() {
        edits.push(arrow(x, y0 + h, Rotation::Cw270));
    }
    for y in (y0 + 1..=y0 + h).rev() {
        edits.push(arrow(x0, y, Rotation::None));
    }
    edits
}

// ===========================================================================
// Engine builders
// ===========================================================================

/// Engine in `mode` with `edits` applied. Panics if any edit fails.
pub fn engine_with(mode: SimulationMode, edits: &[Edit]) -> Engine {
    let mut engine = Engine::new(mode);
    engine
        .apply_edits(edits)
        .expect("test layout should apply cleanly");
    engine
}

/// A row of `len` arrows feeding one cell running `logic`, with the first
/// arrow pulsed. The logic cell sits at `(len, 0)`.
pub fn chain_into(mode: SimulationMode, len: i32, logic: LogicFn) -> Engine {
    let mut edits = east_row(0, 0, len);
    edits.push(cell(len, 0, 1, Rotation::Cw90, logic));
    edits.push(activate(0, 0));
    engine_with(mode, &edits)
}

/// A field of mixed shapes and logic functions, for benchmarks.
pub fn mesh(width: i32, height: i32) -> Vec<Edit> {
    let mut edits = Vec::new();
    for y in 0..height {
        for x in 0..width {
            let seed = (x * 31 + y * 17) as u32;
            let (shape, logic) = match seed % 11 {
                0 => (5, LogicFn::Xor),
                1 => (3, LogicFn::Or),
                2 => (2, LogicFn::Toggle),
                3 => (1, LogicFn::Not),
                _ => (1, LogicFn::Or),
            };
            let rotation = if y % 2 == 0 { Rotation::Cw90 } else { Rotation::Cw270 };
            edits.push(cell(x, y, shape, rotation, logic));
        }
    }
    edits
}
