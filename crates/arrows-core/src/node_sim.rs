//! Compressed-model simulator.
//!
//! Each node is a shift register: the head evaluates the node's logic from
//! the signals delivered by upstream tails, and every other offset copies
//! the value one offset closer to the head. Two passes per tick, like the
//! cellular model: deliveries first, then evaluation.

use tracing::trace;

use crate::grid::Grid;
use crate::id::NodeId;
use crate::node::NodeGraph;

/// Counters from one node tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStepStats {
    pub nodes: usize,
    pub deliveries: usize,
    /// Heads active after evaluation.
    pub active_heads: usize,
}

impl NodeGraph {
    /// Advance the compressed model by one tick.
    pub fn step(&mut self) -> NodeStepStats {
        if self.is_order_dirty() {
            self.rebuild_order();
        }
        let order: Vec<NodeId> = self.order().to_vec();

        // Pass 1: latch the head value and deliver tail outputs.
        let mut deliveries: Vec<NodeId> = Vec::new();
        for &id in &order {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            node.last_signal = node.signals.front().copied().unwrap_or(false);
            if node.output() {
                deliveries.extend_from_slice(&node.targets);
            }
        }
        for &target in &deliveries {
            if let Some(node) = self.nodes.get_mut(target) {
                node.signal_count += 1;
            }
        }

        // Pass 2: evaluate heads and shift.
        let mut active_heads = 0;
        for &id in &order {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let active = node.logic.activate(node.signal_count, node.last_signal);
            node.push_signal(active);
            node.last_signal_count = node.signal_count;
            node.signal_count = 0;
            if active {
                active_heads += 1;
            }
        }

        let stats = NodeStepStats {
            nodes: order.len(),
            deliveries: deliveries.len(),
            active_heads,
        };
        trace!(
            nodes = stats.nodes,
            deliveries = stats.deliveries,
            active_heads = stats.active_heads,
            "node step"
        );
        stats
    }

    /// Copy every node's history back into its cells' `ca_active`, so the
    /// cellular model resumes from the compressed model's state.
    pub fn write_back(&self, grid: &mut Grid) {
        for node in self.nodes.values() {
            for (&cell, &active) in node.arrows.iter().zip(node.signals.iter()) {
                if let Some(arrow) = grid.arrow_mut(cell) {
                    arrow.ca_active = active;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cell::{LogicFn, Rotation};
    use crate::grid::Grid;
    use crate::id::ShapeId;
    use crate::node::NodeGraph;

    fn row(grid: &mut Grid, len: i32) {
        for x in 0..len {
            let arrow = grid.get_or_create_arrow(x, 0);
            arrow.shape = ShapeId(1);
            arrow.rotation = Rotation::Cw90;
        }
    }

    #[test]
    fn single_pulse_exits_after_size_ticks() {
        let mut grid = Grid::new();
        row(&mut grid, 4);
        grid.get_or_create_arrow(0, 0).ca_active = true;
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);
        let id = graph.order()[0];

        let mut outputs = Vec::new();
        for _ in 0..6 {
            outputs.push(graph.node(id).unwrap().output());
            graph.step();
        }
        // Written at offset 0 on tick 0, reaches offset 3 three ticks later.
        assert_eq!(outputs, [false, false, false, true, false, false]);
    }

    #[test]
    fn head_logic_sees_upstream_tail() {
        let mut grid = Grid::new();
        row(&mut grid, 3);
        grid.get_or_create_arrow(2, 0).logic = LogicFn::Toggle;
        grid.get_or_create_arrow(0, 0).ca_active = true;
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);
        assert_eq!(graph.size_histogram(), vec![1, 2]);

        let toggle = graph.owner(&grid, grid.locate(2, 0).unwrap()).unwrap().0;
        graph.step();
        assert_eq!(graph.node(toggle).unwrap().signals, [false]);
        let stats = graph.step();
        assert_eq!(stats.deliveries, 1);
        assert_eq!(graph.node(toggle).unwrap().signals, [true]);
        assert_eq!(graph.node(toggle).unwrap().last_signal_count, 1);
        graph.step();
        assert_eq!(graph.node(toggle).unwrap().signals, [true]);
    }

    #[test]
    fn write_back_copies_history_into_cells() {
        let mut grid = Grid::new();
        row(&mut grid, 3);
        grid.get_or_create_arrow(0, 0).ca_active = true;
        let mut graph = NodeGraph::new();
        graph.compile(&mut grid);
        graph.step();
        graph.write_back(&mut grid);

        let active: Vec<bool> = (0..3)
            .map(|x| grid.get_arrow(x, 0).unwrap().ca_active)
            .collect();
        assert_eq!(active, [false, true, false]);
    }
}
