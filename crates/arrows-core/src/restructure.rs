//! Incremental node restructuring.
//!
//! Every grid edit made while the compressed graph is live is mirrored here
//! so the graph never needs a full recompile. The primitive operations are:
//!
//! - [`split`](NodeGraph::split) -- cut a node in two at an offset.
//! - [`splice`](NodeGraph::splice) -- remove one cell from a node.
//! - [`insert_cell`](NodeGraph::insert_cell) -- add a new one-cell node, cutting
//!   neighbouring runs so its edges land on heads and tails.
//! - [`update_node`](NodeGraph::update_node) -- change a cell's logic
//!   function, isolating it into its own node first.
//! - [`merge`](NodeGraph::merge) / [`coalesce`](NodeGraph::coalesce) --
//!   re-fuse runs that became contractible after an edit.
//!
//! Histories move with their cells: every cell keeps its current value
//! across any restructuring, so in-flight signals survive edits.
//!
//! The cell-level procedures [`place_cell`](NodeGraph::place_cell),
//! [`remove_cell`](NodeGraph::remove_cell) and
//! [`set_cell_logic`](NodeGraph::set_cell_logic) compose the primitives.

use std::collections::VecDeque;
use tracing::trace;

use crate::cell::LogicFn;
use crate::grid::Grid;
use crate::id::{CellRef, NodeId};
use crate::node::{LogicNode, NodeGraph};
use crate::resolver;

/// Errors raised by restructuring. These indicate a sequencing bug in the
/// caller; the current edit is aborted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestructureError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("offset {offset} out of range for node {node:?} of size {size}")]
    OffsetOutOfRange {
        node: NodeId,
        offset: usize,
        size: usize,
    },
    #[error("cell {0:?} has no owning node")]
    Unowned(CellRef),
    #[error("cell {0:?} is empty")]
    EmptyCell(CellRef),
    #[error("node {back:?} cannot be merged into {front:?}")]
    InvalidMerge { front: NodeId, back: NodeId },
}

/// Pieces left after [`NodeGraph::splice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Splice {
    /// Node holding the cells before the removed one.
    pub front: Option<NodeId>,
    /// Node holding the cells after the removed one.
    pub back: Option<NodeId>,
}

impl NodeGraph {
    fn size_of(&self, id: NodeId) -> Result<usize, RestructureError> {
        self.nodes
            .get(id)
            .map(LogicNode::size)
            .ok_or(RestructureError::NodeNotFound(id))
    }

    fn owner_of(&self, grid: &Grid, cell: CellRef) -> Result<(NodeId, usize), RestructureError> {
        match grid.arrow(cell) {
            Some(arrow) if !arrow.is_empty() => {}
            _ => return Err(RestructureError::EmptyCell(cell)),
        }
        self.owner(grid, cell)
            .ok_or(RestructureError::Unowned(cell))
    }

    // -----------------------------------------------------------------------
    // Primitives
    // -----------------------------------------------------------------------

    /// Cut `id` so that it keeps cells `[0, offset)` and a new node takes
    /// `[offset, size)` together with the outgoing edges. Returns
    /// `(front, back)`. `offset` must be in `1..size`.
    pub fn split(
        &mut self,
        grid: &mut Grid,
        id: NodeId,
        offset: usize,
    ) -> Result<(NodeId, NodeId), RestructureError> {
        let size = self.size_of(id)?;
        if offset == 0 || offset >= size {
            return Err(RestructureError::OffsetOutOfRange {
                node: id,
                offset,
                size,
            });
        }

        let node = &mut self.nodes[id];
        let arrows = node.arrows.split_off(offset);
        let signals = node.signals.split_off(offset);
        let targets = std::mem::take(&mut node.targets);
        let logic = grid
            .arrow(arrows[0])
            .map(|a| a.logic)
            .unwrap_or_default();

        let back = self.insert(LogicNode {
            arrows,
            logic,
            ready: true,
            targets: targets.clone(),
            sources: Vec::new(),
            signals,
            signal_count: 0,
            last_signal: false,
            last_signal_count: 0,
        });
        self.redirect_sources(&targets, id, back);
        self.link(id, back);
        self.claim(grid, back);
        trace!(?id, ?back, offset, "node split");
        Ok((id, back))
    }

    /// Remove the cell at `offset` from `id`. Interior removal leaves two
    /// nodes; removing the sole cell deletes the node and every edge it had.
    /// The removed cell's ownership is cleared; the cell itself stays in
    /// the grid for the caller to reset.
    pub fn splice(
        &mut self,
        grid: &mut Grid,
        id: NodeId,
        offset: usize,
    ) -> Result<Splice, RestructureError> {
        let size = self.size_of(id)?;
        if offset >= size {
            return Err(RestructureError::OffsetOutOfRange {
                node: id,
                offset,
                size,
            });
        }

        if size == 1 {
            let node = self.remove(id).ok_or(RestructureError::NodeNotFound(id))?;
            for &t in &node.targets {
                self.unlink(id, t);
            }
            for &s in &node.sources {
                self.unlink(s, id);
            }
            release(grid, node.head());
            trace!(?id, "node deleted");
            return Ok(Splice::default());
        }

        if offset == 0 {
            let node = &mut self.nodes[id];
            let removed = node.arrows.remove(0);
            node.signals.pop_front();
            let sources = std::mem::take(&mut node.sources);
            let head = node.head();
            for s in sources {
                self.unlink(s, id);
            }
            self.nodes[id].logic = grid.arrow(head).map(|a| a.logic).unwrap_or_default();
            release(grid, removed);
            self.claim(grid, id);
            trace!(?id, "head spliced");
            return Ok(Splice {
                front: None,
                back: Some(id),
            });
        }

        if offset == size - 1 {
            let node = &mut self.nodes[id];
            let removed = node.arrows.pop();
            node.signals.pop_back();
            let targets = std::mem::take(&mut node.targets);
            for t in targets {
                self.unlink(id, t);
            }
            if let Some(cell) = removed {
                release(grid, cell);
            }
            trace!(?id, "tail spliced");
            return Ok(Splice {
                front: Some(id),
                back: None,
            });
        }

        let (front, rest) = self.split(grid, id, offset)?;
        let tail = self.splice(grid, rest, 0)?;
        Ok(Splice {
            front: Some(front),
            back: tail.back,
        })
    }

    /// Add a one-cell node for the occupied `cell`, linking it to the cells
    /// it signals to (`targets`) and the cells signalling into it
    /// (`sources`). Runs are cut first wherever an edge would otherwise land
    /// inside them.
    pub fn insert_cell(
        &mut self,
        grid: &mut Grid,
        cell: CellRef,
        targets: &[CellRef],
        sources: &[CellRef],
    ) -> Result<NodeId, RestructureError> {
        let arrow = grid
            .arrow(cell)
            .filter(|a| !a.is_empty())
            .ok_or(RestructureError::EmptyCell(cell))?;
        for &other in targets.iter().chain(sources) {
            self.owner_of(grid, other)?;
        }

        let mut node = LogicNode::single(cell, arrow.logic, arrow.ca_active);
        node.ready = true;
        let id = self.insert(node);
        self.claim(grid, id);

        for &target in targets {
            let head = self.cut_before(grid, target)?;
            self.link(id, head);
        }
        for &source in sources {
            let tail = self.cut_after(grid, source)?;
            self.link(tail, id);
        }
        trace!(?id, targets = targets.len(), sources = sources.len(), "node inserted");
        Ok(id)
    }

    /// Make `cell` the head of its node, splitting if needed. Returns the
    /// node it heads.
    fn cut_before(&mut self, grid: &mut Grid, cell: CellRef) -> Result<NodeId, RestructureError> {
        let (id, offset) = self.owner_of(grid, cell)?;
        if offset == 0 {
            return Ok(id);
        }
        Ok(self.split(grid, id, offset)?.1)
    }

    /// Make `cell` the tail of its node, splitting if needed. Returns the
    /// node it ends.
    fn cut_after(&mut self, grid: &mut Grid, cell: CellRef) -> Result<NodeId, RestructureError> {
        let (id, offset) = self.owner_of(grid, cell)?;
        if offset + 1 == self.size_of(id)? {
            return Ok(id);
        }
        Ok(self.split(grid, id, offset + 1)?.0)
    }

    /// Change a cell's logic function. The cell is isolated into its own
    /// node first, since a function change breaks chain transparency.
    pub fn update_node(
        &mut self,
        grid: &mut Grid,
        cell: CellRef,
        logic: LogicFn,
    ) -> Result<NodeId, RestructureError> {
        let (mut id, offset) = self.owner_of(grid, cell)?;
        if offset > 0 {
            id = self.split(grid, id, offset)?.1;
        }
        if self.size_of(id)? > 1 {
            self.split(grid, id, 1)?;
        }
        self.nodes[id].logic = logic;
        if let Some(arrow) = grid.arrow_mut(cell) {
            arrow.logic = logic;
        }
        trace!(?id, ?logic, "node logic updated");
        Ok(id)
    }

    /// Whether `back` can be appended to `front` without changing behaviour.
    pub fn can_merge(&self, front: NodeId, back: NodeId) -> bool {
        if front == back {
            return false;
        }
        let (Some(f), Some(b)) = (self.nodes.get(front), self.nodes.get(back)) else {
            return false;
        };
        f.targets.as_slice() == [back] && b.sources.as_slice() == [front] && b.logic == LogicFn::Or
    }

    /// Append `back`'s cells and history to `front`. Inverse of `split`.
    pub fn merge(
        &mut self,
        grid: &mut Grid,
        front: NodeId,
        back: NodeId,
    ) -> Result<NodeId, RestructureError> {
        if !self.can_merge(front, back) {
            return Err(RestructureError::InvalidMerge { front, back });
        }
        self.absorb(front, back);
        self.claim(grid, front);
        trace!(?front, ?back, "nodes merged");
        Ok(front)
    }

    /// Merge without validation or ownership rewrite. Callers check
    /// `can_merge` and claim the result themselves.
    pub(crate) fn absorb(&mut self, front: NodeId, back: NodeId) {
        let Some(absorbed) = self.remove(back) else {
            return;
        };
        let node = &mut self.nodes[front];
        node.arrows.extend(absorbed.arrows);
        node.signals.extend(absorbed.signals);
        node.targets = absorbed.targets.clone();
        self.redirect_sources(&absorbed.targets, back, front);
    }

    /// Greedily re-fuse `id` with its single source and single target while
    /// the links stay contractible. Returns the node now holding `id`'s cells.
    pub fn coalesce(&mut self, grid: &mut Grid, mut id: NodeId) -> Result<NodeId, RestructureError> {
        self.size_of(id)?;
        loop {
            if let [source] = self.nodes[id].sources.as_slice() {
                let source = *source;
                if self.can_merge(source, id) {
                    id = self.merge(grid, source, id)?;
                    continue;
                }
            }
            if let [target] = self.nodes[id].targets.as_slice() {
                let target = *target;
                if self.can_merge(id, target) {
                    self.merge(grid, id, target)?;
                    continue;
                }
            }
            return Ok(id);
        }
    }

    // -----------------------------------------------------------------------
    // Cell-level edits
    // -----------------------------------------------------------------------

    /// Mirror a placement. `cell` must already hold the new arrow.
    ///
    /// Cutting a loop to attach the new cell can leave its wrap-around link
    /// fusible again, so the pieces around every neighbour are coalesced
    /// too. Returns the node that ends up owning `cell`.
    pub fn place_cell(&mut self, grid: &mut Grid, cell: CellRef) -> Result<NodeId, RestructureError> {
        let targets = resolver::targets(grid, cell);
        let sources = resolver::sources(grid, cell);
        let id = self.insert_cell(grid, cell, &targets, &sources)?;

        let mut affected = vec![id];
        for &other in targets.iter().chain(&sources) {
            if let Some((owner, _)) = self.owner(grid, other) {
                affected.push(owner);
            }
        }
        for owner in affected {
            if self.contains(owner) {
                self.coalesce(grid, owner)?;
            }
        }
        self.owner_of(grid, cell).map(|(owner, _)| owner)
    }

    /// Mirror a removal. Call before the cell is cleared from the grid.
    pub fn remove_cell(&mut self, grid: &mut Grid, cell: CellRef) -> Result<(), RestructureError> {
        let (id, offset) = self.owner_of(grid, cell)?;
        let mut neighbours = resolver::targets(grid, cell);
        neighbours.extend(resolver::sources(grid, cell));

        let pieces = self.splice(grid, id, offset)?;
        let mut affected: Vec<NodeId> = pieces.front.into_iter().chain(pieces.back).collect();
        for other in neighbours {
            if other == cell {
                continue;
            }
            if let Some((owner, _)) = self.owner(grid, other) {
                affected.push(owner);
            }
        }
        for owner in affected {
            if self.contains(owner) {
                self.coalesce(grid, owner)?;
            }
        }
        Ok(())
    }

    /// Mirror a logic-function change.
    pub fn set_cell_logic(
        &mut self,
        grid: &mut Grid,
        cell: CellRef,
        logic: LogicFn,
    ) -> Result<NodeId, RestructureError> {
        let id = self.update_node(grid, cell, logic)?;
        self.coalesce(grid, id)
    }

    /// Overwrite the current value of a cell in its node's history.
    pub fn set_signal(
        &mut self,
        grid: &Grid,
        cell: CellRef,
        active: bool,
    ) -> Result<(), RestructureError> {
        let (id, offset) = self.owner_of(grid, cell)?;
        let signals: &mut VecDeque<bool> = &mut self.nodes[id].signals;
        match signals.get_mut(offset) {
            Some(slot) => {
                *slot = active;
                Ok(())
            }
            None => Err(RestructureError::OffsetOutOfRange {
                node: id,
                offset,
                size: signals.len(),
            }),
        }
    }
}

fn release(grid: &mut Grid, cell: CellRef) {
    if let Some(arrow) = grid.arrow_mut(cell) {
        arrow.node = None;
        arrow.offset = 0;
    }
}
