//! The simulation engine: owns the grid and the compressed graph, applies
//! edits to both, and steps whichever model is active.
//!
//! # Architecture
//!
//! The `Engine` owns:
//! - A [`Grid`] of cells, authoritative for what exists where
//! - A [`NodeGraph`] compiled from the grid, maintained incrementally once
//!   compiled
//! - A [`SimulationMode`] selecting the model `advance()` steps
//! - A [`SimState`] (tick counter)
//! - An [`EditQueue`] of edits waiting for the next batch
//!
//! # Model switching
//!
//! The graph is compiled the first time the engine enters
//! [`SimulationMode::Compressed`]. After that, each model keeps its own
//! history: switching modes never copies state between them. Call
//! [`Engine::sync_cells_from_nodes`] or [`Engine::compile`] to bring one
//! model in line with the other explicitly.

use std::collections::BTreeSet;

use tracing::{debug, error, trace, warn};

use crate::ca;
use crate::cell::{Arrow, LogicFn, Rotation};
use crate::compiler::CompileSummary;
use crate::config::EngineConfig;
use crate::edit::{Edit, EditQueue};
use crate::grid::{Grid, GridError};
use crate::id::{CellRef, ShapeId};
use crate::node::NodeGraph;
use crate::resolver;
use crate::restructure::RestructureError;
use crate::sim::{SimState, SimulationMode, StateHash, TickReport};
use crate::validate::{self, InvariantViolation};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an edit batch was aborted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("invalid cell: {0}")]
    Grid(#[from] GridError),
    #[error("no cell at ({x}, {y})")]
    EmptyCell { x: i32, y: i32 },
    #[error("restructuring failed: {0}")]
    Restructure(#[from] RestructureError),
    #[error("graph invariant broken: {0}")]
    Invariant(#[from] InvariantViolation),
}

// ---------------------------------------------------------------------------
// Render view
// ---------------------------------------------------------------------------

/// Read-only view of one cell for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub shape: ShapeId,
    pub rotation: Rotation,
    pub mirrored: bool,
    pub logic: LogicFn,
    /// Current activation in the active model.
    pub active: bool,
    /// Received a signal on the last tick. Under the compressed model only
    /// node heads are highlighted.
    pub highlighted: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Engine {
    /// Raw cells. Mutate through edits once the graph is compiled, or the
    /// graph goes stale.
    pub grid: Grid,

    pub(crate) graph: NodeGraph,

    pub(crate) mode: SimulationMode,

    pub sim_state: SimState,

    pub(crate) queue: EditQueue,

    pub(crate) config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::with_config(EngineConfig::default())
    }
}

impl Engine {
    /// Create an empty engine stepping `mode`, otherwise using default
    /// settings.
    pub fn new(mode: SimulationMode) -> Self {
        Self::with_config(EngineConfig {
            mode,
            ..EngineConfig::default()
        })
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut engine = Self {
            grid: Grid::new(),
            graph: NodeGraph::new(),
            mode: SimulationMode::Cellular,
            sim_state: SimState::new(),
            queue: EditQueue::with_max_history(config.edit_history),
            config,
        };
        engine.set_mode(engine.config.mode);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn queue(&self) -> &EditQueue {
        &self.queue
    }

    // -----------------------------------------------------------------------
    // Mode
    // -----------------------------------------------------------------------

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Select the model `advance()` steps. Entering the compressed model
    /// compiles the graph if it has never been compiled; histories are not
    /// resynchronized.
    pub fn set_mode(&mut self, mode: SimulationMode) {
        if mode == SimulationMode::Compressed && !self.graph.is_compiled() {
            self.compile();
        }
        if mode != self.mode {
            debug!(from = ?self.mode, to = ?mode, tick = self.sim_state.tick, "mode switched");
        }
        self.mode = mode;
    }

    /// Rebuild the graph from the grid, seeding node histories from the
    /// cells' cellular state.
    pub fn compile(&mut self) -> CompileSummary {
        self.graph.compile(&mut self.grid)
    }

    /// Copy node histories into the cells' cellular state.
    pub fn sync_cells_from_nodes(&mut self) {
        if self.graph.is_compiled() {
            self.graph.write_back(&mut self.grid);
        }
    }

    // -----------------------------------------------------------------------
    // Advance
    // -----------------------------------------------------------------------

    /// Run one tick of the active model.
    pub fn advance(&mut self) -> TickReport {
        let (deliveries, active) = match self.mode {
            SimulationMode::Cellular => {
                let stats = ca::step(&mut self.grid);
                (stats.deliveries, stats.active)
            }
            SimulationMode::Compressed => {
                let stats = self.graph.step();
                (stats.deliveries, stats.active_heads)
            }
        };
        self.sim_state.tick += 1;
        trace!(tick = self.sim_state.tick, mode = ?self.mode, deliveries, active, "tick");
        TickReport {
            tick: self.sim_state.tick,
            mode: self.mode,
            deliveries,
            active,
        }
    }

    /// Run `ticks` ticks.
    pub fn advance_by(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.advance();
        }
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    /// Queue an edit for the next [`apply_pending`](Self::apply_pending).
    pub fn submit(&mut self, edit: Edit) {
        self.queue.push(edit);
    }

    pub fn submit_batch(&mut self, edits: impl IntoIterator<Item = Edit>) {
        self.queue.push_batch(edits);
    }

    /// Apply every queued edit as one batch and record it in the history.
    pub fn apply_pending(&mut self) -> Result<usize, EditError> {
        let edits = self.queue.drain();
        let (applied, outcome) = self.apply_batch(&edits);
        self.queue.record(self.sim_state.tick, &edits[..applied]);
        outcome.map(|()| applied)
    }

    /// Apply a batch of edits in order. The first failing edit aborts the
    /// rest of the batch; edits before it stay applied. The flat node order
    /// is rebuilt once at the end. Returns the number of edits applied.
    pub fn apply_edits(&mut self, edits: &[Edit]) -> Result<usize, EditError> {
        let (applied, outcome) = self.apply_batch(edits);
        outcome.map(|()| applied)
    }

    fn apply_batch(&mut self, edits: &[Edit]) -> (usize, Result<(), EditError>) {
        let mut applied = 0;
        let mut structural = false;
        let mut outcome = Ok(());
        for edit in edits {
            if let Err(err) = self.apply_edit(edit) {
                let (x, y) = edit.position();
                match &err {
                    EditError::Grid(_) | EditError::EmptyCell { .. } => {
                        warn!(x, y, ?edit, %err, "edit rejected");
                    }
                    _ => error!(x, y, ?edit, %err, "edit aborted"),
                }
                outcome = Err(err);
                break;
            }
            structural |= edit.is_structural();
            applied += 1;
        }

        let finished = self.finish_batch(structural);
        if let Err(err) = &finished {
            error!(%err, "edit batch left the graph inconsistent");
        }
        if outcome.is_ok() {
            outcome = finished;
        }
        debug!(applied, nodes = self.graph.len(), "edit batch applied");
        (applied, outcome)
    }

    fn finish_batch(&mut self, structural: bool) -> Result<(), EditError> {
        if !self.graph.is_compiled() {
            return Ok(());
        }
        if self.graph.is_order_dirty() {
            self.graph.rebuild_order();
        }
        // Activation edits only touch histories.
        if structural && self.config.validate_edits {
            validate::check_invariants(&self.grid, &self.graph)?;
        }
        Ok(())
    }

    fn apply_edit(&mut self, edit: &Edit) -> Result<(), EditError> {
        match *edit {
            Edit::Place {
                x,
                y,
                shape,
                rotation,
                mirrored,
                logic,
            } => self.place(x, y, shape, rotation, mirrored, logic),
            Edit::Remove { x, y } => self.remove(x, y),
            Edit::SetLogic { x, y, logic } => self.set_logic(x, y, logic),
            Edit::SetActive { x, y, active } => self.set_active(x, y, active),
        }
    }

    fn place(
        &mut self,
        x: i32,
        y: i32,
        shape: ShapeId,
        rotation: Rotation,
        mirrored: bool,
        logic: LogicFn,
    ) -> Result<(), EditError> {
        if shape.is_empty() {
            return Err(GridError::EmptyShape.into());
        }
        if !resolver::is_known_shape(shape) {
            return Err(GridError::UnknownShape(shape.0).into());
        }
        if self.grid.get_arrow(x, y).is_some() {
            self.remove(x, y)?;
        }

        *self.grid.get_or_create_arrow(x, y) = Arrow {
            shape,
            rotation,
            mirrored,
            logic,
            ..Arrow::default()
        };
        if self.graph.is_compiled() {
            let cell = self.grid.locate_or_create(x, y);
            if let Err(err) = self.graph.place_cell(&mut self.grid, cell) {
                self.undo_place(x, y, cell);
                return Err(err.into());
            }
        }
        trace!(x, y, shape = shape.0, ?rotation, mirrored, ?logic, "cell placed");
        Ok(())
    }

    /// Take a half-placed cell back out of the graph and the grid.
    fn undo_place(&mut self, x: i32, y: i32, cell: CellRef) {
        if let Some((id, offset)) = self.graph.owner(&self.grid, cell) {
            if let Err(err) = self.graph.splice(&mut self.grid, id, offset) {
                error!(x, y, %err, "could not roll back placement");
            }
        }
        self.grid.remove_arrow(x, y);
    }

    fn remove(&mut self, x: i32, y: i32) -> Result<(), EditError> {
        let Some(cell) = self.occupied_cell(x, y) else {
            return Ok(());
        };
        if self.graph.is_compiled() {
            self.graph.remove_cell(&mut self.grid, cell)?;
        }
        self.grid.remove_arrow(x, y);
        trace!(x, y, "cell removed");
        Ok(())
    }

    fn set_logic(&mut self, x: i32, y: i32, logic: LogicFn) -> Result<(), EditError> {
        let cell = self
            .occupied_cell(x, y)
            .ok_or(EditError::EmptyCell { x, y })?;
        if self.graph.is_compiled() {
            self.graph.set_cell_logic(&mut self.grid, cell, logic)?;
        } else if let Some(arrow) = self.grid.arrow_mut(cell) {
            arrow.logic = logic;
        }
        trace!(x, y, ?logic, "logic changed");
        Ok(())
    }

    fn set_active(&mut self, x: i32, y: i32, active: bool) -> Result<(), EditError> {
        let cell = self
            .occupied_cell(x, y)
            .ok_or(EditError::EmptyCell { x, y })?;
        if let Some(arrow) = self.grid.arrow_mut(cell) {
            arrow.ca_active = active;
        }
        if self.graph.is_compiled() {
            self.graph.set_signal(&self.grid, cell, active)?;
        }
        Ok(())
    }

    fn occupied_cell(&self, x: i32, y: i32) -> Option<CellRef> {
        self.grid
            .locate(x, y)
            .filter(|&cell| self.grid.arrow(cell).is_some_and(|a| !a.is_empty()))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Render view of the cell at a world position, or `None` when empty.
    pub fn cell_view(&self, x: i32, y: i32) -> Option<CellView> {
        let cell = self.occupied_cell(x, y)?;
        let arrow = self.grid.arrow(cell)?;
        let (active, highlighted) = self.activity(cell, arrow);
        Some(CellView {
            shape: arrow.shape,
            rotation: arrow.rotation,
            mirrored: arrow.mirrored,
            logic: arrow.logic,
            active,
            highlighted,
        })
    }

    fn activity(&self, cell: CellRef, arrow: &Arrow) -> (bool, bool) {
        match self.mode {
            SimulationMode::Cellular => (arrow.ca_active, arrow.ca_last.signal_count > 0),
            SimulationMode::Compressed => {
                let Some((id, offset)) = self.graph.owner(&self.grid, cell) else {
                    return (false, false);
                };
                let Some(node) = self.graph.node(id) else {
                    return (false, false);
                };
                (
                    node.signal(offset).unwrap_or(false),
                    offset == 0 && node.last_signal_count > 0,
                )
            }
        }
    }

    /// World positions of every cell active in the active model.
    pub fn active_cells(&self) -> BTreeSet<(i32, i32)> {
        self.grid
            .occupied()
            .filter(|&(cell, arrow)| self.activity(cell, arrow).0)
            .filter_map(|(cell, _)| self.grid.world_position(cell))
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.grid.arrow_count()
    }

    /// Deterministic hash of the cells and their activation in the active
    /// model. Render highlights are not included.
    pub fn state_hash(&self) -> u64 {
        let mut hash = StateHash::new();
        hash.write_u64(self.sim_state.tick);
        hash.write_bool(self.mode == SimulationMode::Compressed);
        for (_, chunk) in self.grid.chunks() {
            for (x, y, arrow) in chunk.occupied() {
                hash.write_i32(chunk.coord.x);
                hash.write_i32(chunk.coord.y);
                hash.write(&[x, y, arrow.shape.0, arrow.rotation.quarter_turns()]);
                hash.write_bool(arrow.mirrored);
                hash.write(&[arrow.logic.id()]);
            }
        }
        for (cell, arrow) in self.grid.occupied() {
            hash.write_bool(self.activity(cell, arrow).0);
        }
        hash.finish()
    }
}
