//! One-time graph compilation.
//!
//! Compilation runs in two passes over the raw grid:
//!
//! 1. **Create nodes** -- every non-empty cell is wrapped in a one-cell
//!    node seeded with the cell's CA activation, and `targets`/`sources`
//!    are wired through the connectivity resolver.
//! 2. **Simplify** -- chains are contracted. A node absorbs its successor
//!    when it has exactly one target, the target has exactly one source,
//!    and the target's logic function is [`LogicFn::Or`]. Contraction walks
//!    forward from every chain head; nodes still unvisited afterwards sit on
//!    pure cycles and are walked from the first of them in arena order.
//!
//! A memo (raw node -> compiled node) records where every raw node ended
//! up so each raw node is contracted exactly once.
//!
//! [`LogicFn::Or`]: crate::cell::LogicFn::Or

use slotmap::SecondaryMap;
use std::collections::HashMap;
use tracing::debug;

use crate::grid::Grid;
use crate::id::{CellRef, NodeId};
use crate::node::{LogicNode, NodeGraph};
use crate::resolver;

/// Outcome of a compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompileSummary {
    /// Non-empty cells in the grid.
    pub cells: usize,
    /// Nodes left after contraction.
    pub nodes: usize,
    /// Size of the largest node.
    pub max_size: usize,
}

impl NodeGraph {
    /// Build the compressed graph from scratch. Every cell's ownership is
    /// rewritten and each node's history is seeded from its cells' CA state.
    pub fn compile(&mut self, grid: &mut Grid) -> CompileSummary {
        self.clear();
        let raw = self.create_nodes(grid);
        let memo = self.simplify(&raw);

        for node in self.nodes.values_mut() {
            node.ready = true;
        }
        let ids: Vec<NodeId> = self.nodes.keys().collect();
        for &id in &ids {
            self.claim(grid, id);
        }
        self.rebuild_sources();
        self.rebuild_order();
        self.set_compiled(true);

        let summary = CompileSummary {
            cells: memo.len(),
            nodes: self.len(),
            max_size: self.nodes.values().map(LogicNode::size).max().unwrap_or(0),
        };
        debug!(
            cells = summary.cells,
            nodes = summary.nodes,
            max_size = summary.max_size,
            "graph compiled"
        );
        summary
    }

    /// Wrap every non-empty cell in a one-cell node and wire raw adjacency.
    /// Returns raw node ids in creation order.
    fn create_nodes(&mut self, grid: &Grid) -> Vec<NodeId> {
        let mut by_cell: HashMap<CellRef, NodeId> = HashMap::new();
        let mut raw = Vec::new();
        for (cell, arrow) in grid.occupied() {
            let id = self.insert(LogicNode::single(cell, arrow.logic, arrow.ca_active));
            by_cell.insert(cell, id);
            raw.push(id);
        }

        for &id in &raw {
            let cell = self.nodes[id].head();
            for target in resolver::targets(grid, cell) {
                if let Some(&to) = by_cell.get(&target) {
                    self.link(id, to);
                }
            }
        }
        raw
    }

    /// Contract chains. Returns the raw -> compiled memo.
    fn simplify(&mut self, raw: &[NodeId]) -> SecondaryMap<NodeId, NodeId> {
        let mut memo: SecondaryMap<NodeId, NodeId> = SecondaryMap::new();

        let heads: Vec<NodeId> = raw
            .iter()
            .copied()
            .filter(|&id| !self.has_fusible_source(id))
            .collect();
        for head in heads {
            if !memo.contains_key(head) {
                self.contract_from(head, &mut memo);
            }
        }
        // Whatever is left lies on a cycle of fusible links.
        for &id in raw {
            if !memo.contains_key(id) {
                self.contract_from(id, &mut memo);
            }
        }
        memo
    }

    fn has_fusible_source(&self, id: NodeId) -> bool {
        match self.nodes[id].sources.as_slice() {
            [source] => self.can_merge(*source, id),
            _ => false,
        }
    }

    /// Absorb successors into `head` for as long as the link is fusible and
    /// the successor has not been compiled into another node yet.
    fn contract_from(&mut self, head: NodeId, memo: &mut SecondaryMap<NodeId, NodeId>) {
        memo.insert(head, head);
        loop {
            let next = match self.nodes[head].targets.as_slice() {
                [next] => *next,
                _ => break,
            };
            if memo.contains_key(next) || !self.can_merge(head, next) {
                break;
            }
            self.absorb(head, next);
            memo.insert(next, head);
        }
    }

    /// Rebuild every `sources` list from the `targets` lists.
    fn rebuild_sources(&mut self) {
        let edges: Vec<(NodeId, NodeId)> = self
            .nodes
            .iter()
            .flat_map(|(id, node)| node.targets.iter().map(move |&t| (id, t)))
            .collect();
        for node in self.nodes.values_mut() {
            node.sources.clear();
        }
        for (from, to) in edges {
            if let Some(node) = self.nodes.get_mut(to) {
                node.sources.push(from);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{LogicFn, Rotation};
    use crate::id::ShapeId;

    fn place(grid: &mut Grid, x: i32, y: i32, shape: u8, rotation: Rotation, logic: LogicFn) {
        let arrow = grid.get_or_create_arrow(x, y);
        arrow.shape = ShapeId(shape);
        arrow.rotation = rotation;
        arrow.logic = logic;
    }

    fn owner_of(graph: &NodeGraph, grid: &Grid, x: i32, y: i32) -> (NodeId, usize) {
        graph.owner(grid, grid.locate(x, y).unwrap()).unwrap()
    }

    #[test]
    fn straight_chain_fuses_into_one_node() {
        let mut grid = Grid::new();
        for x in 0..5 {
            place(&mut grid, x, 0, 1, Rotation::Cw90, LogicFn::Or);
        }
        let mut graph = NodeGraph::new();
        let summary = graph.compile(&mut grid);

        assert_eq!(summary.cells, 5);
        assert_eq!(summary.nodes, 1);
        assert_eq!(summary.max_size, 5);
        for x in 0..5 {
            assert_eq!(owner_of(&graph, &grid, x, 0).1, x as usize);
        }
        let (id, node) = graph.nodes().next().unwrap();
        assert!(node.ready);
        assert!(node.targets.is_empty());
        assert!(node.sources.is_empty());
        assert_eq!(graph.order(), &[id]);
    }

    #[test]
    fn logic_cell_starts_a_new_node() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 0, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 1, 0, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 2, 0, 1, Rotation::Cw90, LogicFn::Not);
        place(&mut grid, 3, 0, 1, Rotation::Cw90, LogicFn::Or);
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);

        assert_eq!(graph.size_histogram(), vec![2, 2]);
        let (front, _) = owner_of(&graph, &grid, 0, 0);
        let (back, offset) = owner_of(&graph, &grid, 2, 0);
        assert_eq!(offset, 0);
        assert_eq!(graph.node(back).unwrap().logic, LogicFn::Not);
        assert_eq!(graph.node(front).unwrap().targets, vec![back]);
        assert_eq!(graph.node(back).unwrap().sources, vec![front]);
    }

    #[test]
    fn branch_node_is_never_fused() {
        let mut grid = Grid::new();
        place(&mut grid, 5, 5, 5, Rotation::None, LogicFn::Or);
        place(&mut grid, 5, 4, 1, Rotation::None, LogicFn::Or);
        place(&mut grid, 6, 5, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 5, 6, 1, Rotation::Cw180, LogicFn::Or);
        place(&mut grid, 4, 5, 1, Rotation::Cw270, LogicFn::Or);
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);

        assert_eq!(graph.len(), 5);
        let (center, _) = owner_of(&graph, &grid, 5, 5);
        let node = graph.node(center).unwrap();
        assert_eq!(node.size(), 1);
        assert_eq!(node.targets.len(), 4);
    }

    #[test]
    fn merge_point_keeps_its_own_node() {
        let mut grid = Grid::new();
        // Two arrows pointing into (1,0) from the west and from the south.
        place(&mut grid, 0, 0, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 1, 1, 1, Rotation::None, LogicFn::Or);
        place(&mut grid, 1, 0, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 2, 0, 1, Rotation::Cw90, LogicFn::Or);
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);

        let (merge, offset) = owner_of(&graph, &grid, 1, 0);
        assert_eq!(offset, 0);
        assert_eq!(graph.node(merge).unwrap().size(), 2);
        assert_eq!(graph.node(merge).unwrap().sources.len(), 2);
    }

    #[test]
    fn pure_cycle_compiles_to_self_loop() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 0, 1, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 1, 0, 1, Rotation::Cw180, LogicFn::Or);
        place(&mut grid, 1, 1, 1, Rotation::Cw270, LogicFn::Or);
        place(&mut grid, 0, 1, 1, Rotation::None, LogicFn::Or);
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);

        assert_eq!(graph.len(), 1);
        let (id, node) = graph.nodes().next().unwrap();
        assert_eq!(node.size(), 4);
        assert_eq!(node.targets, vec![id]);
        assert_eq!(node.sources, vec![id]);
    }

    #[test]
    fn history_is_seeded_from_cells() {
        let mut grid = Grid::new();
        for x in 0..3 {
            place(&mut grid, x, 0, 1, Rotation::Cw90, LogicFn::Or);
        }
        grid.get_or_create_arrow(1, 0).ca_active = true;
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);

        let (_, node) = graph.nodes().next().unwrap();
        assert_eq!(node.signals, [false, true, false]);
    }

    #[test]
    fn compilation_is_deterministic() {
        let mut grid = Grid::new();
        for x in 0..6 {
            place(&mut grid, x, 0, 1, Rotation::Cw90, LogicFn::Or);
        }
        place(&mut grid, 6, 0, 5, Rotation::None, LogicFn::Xor);
        place(&mut grid, 6, -1, 1, Rotation::None, LogicFn::Or);
        place(&mut grid, 6, 1, 1, Rotation::Cw180, LogicFn::Or);

        let mut first = NodeGraph::new();
        first.compile(&mut grid);
        let mut second = NodeGraph::new();
        second.compile(&mut grid);
        assert_eq!(first.size_histogram(), second.size_histogram());
    }
}
