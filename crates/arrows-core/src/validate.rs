//! Structural invariant checks for the compressed graph.
//!
//! [`check_invariants`] verifies that the node graph is a faithful
//! contraction of the raw grid: every occupied cell belongs to exactly one
//! live node, offsets are contiguous, histories match sizes, every interior
//! link is the only edge in both directions, and node edges mirror the raw
//! edges leaving each tail.

use std::collections::BTreeSet;

use crate::cell::LogicFn;
use crate::grid::Grid;
use crate::id::{CellRef, NodeId};
use crate::node::NodeGraph;
use crate::resolver;

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("node {0:?} owns no cells")]
    EmptyNode(NodeId),
    #[error("node {node:?} has {history} history entries for {size} cells")]
    HistoryLength {
        node: NodeId,
        size: usize,
        history: usize,
    },
    #[error("node {node:?} offset {offset} refers to an empty cell")]
    EmptyMember { node: NodeId, offset: usize },
    #[error("cell {cell:?} records the wrong owner or offset")]
    OwnerMismatch { cell: CellRef },
    #[error("occupied cell {0:?} has no live owner")]
    Unowned(CellRef),
    #[error("node {node:?} logic differs from its head cell")]
    HeadLogic { node: NodeId },
    #[error("node {node:?} offset {offset} is not transparent")]
    InteriorLogic { node: NodeId, offset: usize },
    #[error("node {node:?} chain breaks after offset {offset}")]
    BrokenChain { node: NodeId, offset: usize },
    #[error("node {node:?} targets do not match its tail's routing")]
    TargetMismatch { node: NodeId },
    #[error("node {node:?} sources do not mirror targets")]
    SourceMismatch { node: NodeId },
    #[error("nodes own {owned} cells but the grid holds {cells}")]
    SizeMismatch { owned: usize, cells: usize },
}

/// Check every structural invariant of `graph` against `grid`.
pub fn check_invariants(grid: &Grid, graph: &NodeGraph) -> Result<(), InvariantViolation> {
    for (id, node) in graph.nodes() {
        let size = node.size();
        if size == 0 {
            return Err(InvariantViolation::EmptyNode(id));
        }
        if node.signals.len() != size {
            return Err(InvariantViolation::HistoryLength {
                node: id,
                size,
                history: node.signals.len(),
            });
        }

        for (offset, &cell) in node.arrows.iter().enumerate() {
            let arrow = grid
                .arrow(cell)
                .filter(|a| !a.is_empty())
                .ok_or(InvariantViolation::EmptyMember { node: id, offset })?;
            if arrow.node != Some(id) || arrow.offset as usize != offset {
                return Err(InvariantViolation::OwnerMismatch { cell });
            }
            if offset == 0 && arrow.logic != node.logic {
                return Err(InvariantViolation::HeadLogic { node: id });
            }
            if offset > 0 && arrow.logic != LogicFn::Or {
                return Err(InvariantViolation::InteriorLogic { node: id, offset });
            }
            if offset + 1 < size {
                let next = node.arrows[offset + 1];
                if resolver::targets(grid, cell) != [next]
                    || resolver::sources(grid, next) != [cell]
                {
                    return Err(InvariantViolation::BrokenChain { node: id, offset });
                }
            }
        }

        let mut expected = BTreeSet::new();
        for target in resolver::targets(grid, node.tail()) {
            match graph.owner(grid, target) {
                Some((owner, 0)) => {
                    expected.insert(owner);
                }
                _ => return Err(InvariantViolation::TargetMismatch { node: id }),
            }
        }
        let actual: BTreeSet<NodeId> = node.targets.iter().copied().collect();
        if expected != actual || actual.len() != node.targets.len() {
            return Err(InvariantViolation::TargetMismatch { node: id });
        }

        let feeding: BTreeSet<NodeId> = graph
            .nodes()
            .filter(|(_, other)| other.targets.contains(&id))
            .map(|(other, _)| other)
            .collect();
        let sources: BTreeSet<NodeId> = node.sources.iter().copied().collect();
        if feeding != sources || sources.len() != node.sources.len() {
            return Err(InvariantViolation::SourceMismatch { node: id });
        }
    }

    for (cell, _) in grid.occupied() {
        if graph.owner(grid, cell).is_none() {
            return Err(InvariantViolation::Unowned(cell));
        }
    }

    let owned = graph.total_size();
    let cells = grid.arrow_count();
    if owned != cells {
        return Err(InvariantViolation::SizeMismatch { owned, cells });
    }
    Ok(())
}
