//! Compressed delay-line graph.
//!
//! A [`LogicNode`] stands in for a maximal run of cells `c0 .. c(size-1)`
//! where every interior link is the only edge in both directions and every
//! cell after the head uses [`LogicFn::Or`]. The head evaluates the node's
//! logic function; the rest of the run is a shift register.
//!
//! `signals[k]` holds the current value of the cell at offset `k`:
//! offset 0 is the newest write point (the head), offset `size - 1` is the
//! value delivered to downstream nodes.
//!
//! Nodes live in a [`SlotMap`] arena. `targets` and `sources` are handle
//! lists, never owning references, and the arena is the authoritative set
//! of live nodes. The flat iteration order used by the simulator is
//! recomputed lazily after structural changes.

use slotmap::SlotMap;
use std::collections::VecDeque;

use crate::cell::LogicFn;
use crate::grid::Grid;
use crate::id::{CellRef, NodeId};

// ---------------------------------------------------------------------------
// LogicNode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LogicNode {
    /// Owned cells, head first.
    pub arrows: Vec<CellRef>,
    /// Logic function of the head cell.
    pub logic: LogicFn,
    /// Set once the node has been through the compiler.
    pub ready: bool,
    pub targets: Vec<NodeId>,
    pub sources: Vec<NodeId>,
    /// Per-offset history; always `arrows.len()` long.
    pub signals: VecDeque<bool>,

    // -- Per-tick scratch --
    pub signal_count: u32,
    pub last_signal: bool,
    pub last_signal_count: u32,
}

impl LogicNode {
    /// A one-cell node carrying `active` as its only history entry.
    pub fn single(cell: CellRef, logic: LogicFn, active: bool) -> Self {
        Self {
            arrows: vec![cell],
            logic,
            ready: false,
            targets: Vec::new(),
            sources: Vec::new(),
            signals: VecDeque::from([active]),
            signal_count: 0,
            last_signal: false,
            last_signal_count: 0,
        }
    }

    /// Propagation delay in ticks.
    pub fn size(&self) -> usize {
        self.arrows.len()
    }

    pub fn head(&self) -> CellRef {
        self.arrows[0]
    }

    pub fn tail(&self) -> CellRef {
        self.arrows[self.arrows.len() - 1]
    }

    /// Value about to be delivered downstream.
    pub fn output(&self) -> bool {
        self.signals.back().copied().unwrap_or(false)
    }

    /// Shift a new head value in. The tail value drops off.
    pub fn push_signal(&mut self, active: bool) {
        self.signals.push_front(active);
        self.signals.truncate(self.arrows.len());
    }

    pub fn signal(&self, offset: usize) -> Option<bool> {
        self.signals.get(offset).copied()
    }
}

// ---------------------------------------------------------------------------
// NodeGraph
// ---------------------------------------------------------------------------

/// Arena of live nodes plus the cached flat iteration order.
#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    pub(crate) nodes: SlotMap<NodeId, LogicNode>,
    order: Vec<NodeId>,
    order_dirty: bool,
    compiled: bool,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the graph has been compiled and is being maintained.
    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub(crate) fn set_compiled(&mut self, compiled: bool) {
        self.compiled = compiled;
    }

    /// Drop every node. Cells keep stale ownership until the next compile.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.order_dirty = false;
        self.compiled = false;
    }

    // -- Queries --

    pub fn node(&self, id: NodeId) -> Option<&LogicNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut LogicNode> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over live nodes in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &LogicNode)> {
        self.nodes.iter()
    }

    /// Total number of cells owned by live nodes.
    pub fn total_size(&self) -> usize {
        self.nodes.values().map(LogicNode::size).sum()
    }

    /// Sorted list of node sizes, for comparing compilations.
    pub fn size_histogram(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self.nodes.values().map(LogicNode::size).collect();
        sizes.sort_unstable();
        sizes
    }

    // -- Flat order --

    /// Flat snapshot of the live set used by the simulator.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn is_order_dirty(&self) -> bool {
        self.order_dirty
    }

    pub(crate) fn mark_order_dirty(&mut self) {
        self.order_dirty = true;
    }

    /// Recompute the flat iteration order from the live set.
    pub fn rebuild_order(&mut self) {
        self.order.clear();
        self.order.extend(self.nodes.keys());
        self.order_dirty = false;
    }

    // -- Arena maintenance --

    pub(crate) fn insert(&mut self, node: LogicNode) -> NodeId {
        self.order_dirty = true;
        self.nodes.insert(node)
    }

    pub(crate) fn remove(&mut self, id: NodeId) -> Option<LogicNode> {
        self.order_dirty = true;
        self.nodes.remove(id)
    }

    /// Add a `from -> to` edge unless present.
    pub(crate) fn link(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.nodes.get_mut(from) {
            if !node.targets.contains(&to) {
                node.targets.push(to);
            }
        }
        if let Some(node) = self.nodes.get_mut(to) {
            if !node.sources.contains(&from) {
                node.sources.push(from);
            }
        }
    }

    /// Remove a `from -> to` edge if present.
    pub(crate) fn unlink(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.nodes.get_mut(from) {
            node.targets.retain(|&t| t != to);
        }
        if let Some(node) = self.nodes.get_mut(to) {
            node.sources.retain(|&s| s != from);
        }
    }

    /// Replace `old` with `new` in the source lists of `targets`. Used when
    /// a node's tail moves to another node.
    pub(crate) fn redirect_sources(&mut self, targets: &[NodeId], old: NodeId, new: NodeId) {
        for &t in targets {
            if let Some(node) = self.nodes.get_mut(t) {
                replace_edge(&mut node.sources, old, new);
            }
        }
    }

    /// Replace `old` with `new` in the target lists of `sources`. Used when
    /// a node's head moves to another node.
    pub(crate) fn redirect_targets(&mut self, sources: &[NodeId], old: NodeId, new: NodeId) {
        for &s in sources {
            if let Some(node) = self.nodes.get_mut(s) {
                replace_edge(&mut node.targets, old, new);
            }
        }
    }

    /// Write `(node, offset)` ownership into every cell of a node.
    pub(crate) fn claim(&self, grid: &mut Grid, id: NodeId) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        for (offset, &cell) in node.arrows.iter().enumerate() {
            if let Some(arrow) = grid.arrow_mut(cell) {
                arrow.node = Some(id);
                arrow.offset = offset as u32;
            }
        }
    }

    /// Owning node and offset of a cell, as recorded in the grid.
    pub fn owner(&self, grid: &Grid, cell: CellRef) -> Option<(NodeId, usize)> {
        let arrow = grid.arrow(cell)?;
        if arrow.is_empty() {
            return None;
        }
        let id = arrow.node?;
        self.nodes
            .contains_key(id)
            .then_some((id, arrow.offset as usize))
    }
}

fn replace_edge(edges: &mut Vec<NodeId>, old: NodeId, new: NodeId) {
    if edges.contains(&new) {
        edges.retain(|&e| e != old);
    } else {
        for e in edges.iter_mut() {
            if *e == old {
                *e = new;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::ShapeId;

    fn cell(grid: &mut Grid, x: i32) -> CellRef {
        grid.get_or_create_arrow(x, 0).shape = ShapeId(1);
        grid.locate(x, 0).unwrap()
    }

    #[test]
    fn push_signal_is_a_shift_register() {
        let mut grid = Grid::new();
        let mut node = LogicNode::single(cell(&mut grid, 0), LogicFn::Or, false);
        node.arrows.push(cell(&mut grid, 1));
        node.arrows.push(cell(&mut grid, 2));
        node.signals = VecDeque::from([false, false, false]);

        node.push_signal(true);
        assert_eq!(node.signals, [true, false, false]);
        assert!(!node.output());
        node.push_signal(false);
        node.push_signal(false);
        assert_eq!(node.signals, [false, false, true]);
        assert!(node.output());
        node.push_signal(false);
        assert!(!node.output());
        assert_eq!(node.signals.len(), node.size());
    }

    #[test]
    fn link_and_unlink_are_symmetric() {
        let mut grid = Grid::new();
        let mut graph = NodeGraph::new();
        let a = graph.insert(LogicNode::single(cell(&mut grid, 0), LogicFn::Or, false));
        let b = graph.insert(LogicNode::single(cell(&mut grid, 1), LogicFn::Or, false));

        graph.link(a, b);
        graph.link(a, b);
        assert_eq!(graph.node(a).unwrap().targets, vec![b]);
        assert_eq!(graph.node(b).unwrap().sources, vec![a]);

        graph.unlink(a, b);
        assert!(graph.node(a).unwrap().targets.is_empty());
        assert!(graph.node(b).unwrap().sources.is_empty());
    }

    #[test]
    fn order_tracks_live_set() {
        let mut grid = Grid::new();
        let mut graph = NodeGraph::new();
        let a = graph.insert(LogicNode::single(cell(&mut grid, 0), LogicFn::Or, false));
        let b = graph.insert(LogicNode::single(cell(&mut grid, 1), LogicFn::Or, false));
        assert!(graph.is_order_dirty());
        graph.rebuild_order();
        assert_eq!(graph.order(), &[a, b]);

        graph.remove(a);
        assert!(graph.is_order_dirty());
        graph.rebuild_order();
        assert_eq!(graph.order(), &[b]);
    }

    #[test]
    fn claim_writes_offsets() {
        let mut grid = Grid::new();
        let mut graph = NodeGraph::new();
        let c0 = cell(&mut grid, 0);
        let c1 = cell(&mut grid, 1);
        let mut node = LogicNode::single(c0, LogicFn::Or, false);
        node.arrows.push(c1);
        node.signals.push_back(false);
        let id = graph.insert(node);
        graph.claim(&mut grid, id);

        assert_eq!(graph.owner(&grid, c0), Some((id, 0)));
        assert_eq!(graph.owner(&grid, c1), Some((id, 1)));
    }
}
