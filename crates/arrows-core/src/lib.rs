//! Arrows Core -- a signal-propagation engine for grids of routing cells.
//!
//! Cells ("arrows") sit on a sparse, chunked plane. Each cell has a routing
//! shape that decides which nearby cells it signals to, and a logic
//! function that decides when it activates. The same circuit can be
//! simulated two ways:
//!
//! - **Cellular** ([`ca`]) -- every cell is evaluated every tick.
//! - **Compressed** ([`node_sim`]) -- chains of pass-through cells are
//!   contracted into delay-line nodes ([`node::LogicNode`]) by the
//!   [`compiler`], and only one logic evaluation plus a shift runs per node.
//!
//! Both models produce the same per-cell activation on every tick.
//!
//! # Editing
//!
//! Edits go through [`engine::Engine::apply_edits`]. Once the graph has been
//! compiled, each edit is mirrored into it by the [`restructure`] operations
//! (split, splice, insert, update, merge) so the graph never needs a full
//! recompile during play:
//!
//! ```rust,ignore
//! let mut engine = Engine::new(SimulationMode::Compressed);
//! engine.apply_edits(&[Edit::place(0, 0, 1, Rotation::Cw90)])?;
//! engine.advance();
//! ```
//!
//! # Key Types
//!
//! - [`engine::Engine`] -- Owns the grid and graph; entry point for ticks,
//!   edits and render queries.
//! - [`grid::Grid`] -- Chunked sparse cell storage.
//! - [`resolver`] -- Shape table and forward/reverse connectivity.
//! - [`node::NodeGraph`] -- Arena of compressed nodes.
//! - [`serialize`] -- Versioned grid snapshots via bitcode.
//! - [`validate`] -- Structural invariant checks.

pub mod ca;
pub mod cell;
pub mod compiler;
pub mod config;
pub mod edit;
pub mod engine;
pub mod grid;
pub mod id;
pub mod node;
pub mod node_sim;
pub mod resolver;
pub mod restructure;
pub mod serialize;
pub mod sim;
pub mod validate;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
