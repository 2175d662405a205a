//! Direct cellular-automaton simulator.
//!
//! Every tick runs two strictly separated passes over the non-empty cells:
//! the send pass counts incoming signals from every active cell, then the
//! activation pass evaluates each cell's logic function. No activation is
//! computed before all sends for the tick are done, so the result does not
//! depend on iteration order.

use tracing::trace;

use crate::cell::CaSnapshot;
use crate::grid::Grid;
use crate::id::CellRef;
use crate::resolver;

/// Counters from one CA tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaStepStats {
    /// Signals delivered during the send pass.
    pub deliveries: usize,
    /// Cells active after the activation pass.
    pub active: usize,
}

/// Advance the cellular model by one tick.
pub fn step(grid: &mut Grid) -> CaStepStats {
    // Pass 1: send.
    let mut deliveries: Vec<CellRef> = Vec::new();
    for (cell, arrow) in grid.occupied() {
        if arrow.ca_active {
            deliveries.extend(resolver::targets(grid, cell));
        }
    }
    for &target in &deliveries {
        if let Some(arrow) = grid.arrow_mut(target) {
            arrow.ca_signal_count += 1;
        }
    }

    // Pass 2: activate.
    let mut active = 0;
    for (_, arrow) in grid.occupied_mut() {
        let prev = arrow.ca_active;
        let count = arrow.ca_signal_count;
        arrow.ca_last = CaSnapshot {
            active: prev,
            signal_count: count,
        };
        arrow.ca_active = arrow.logic.activate(count, prev);
        arrow.ca_signal_count = 0;
        if arrow.ca_active {
            active += 1;
        }
    }

    let stats = CaStepStats {
        deliveries: deliveries.len(),
        active,
    };
    trace!(deliveries = stats.deliveries, active = stats.active, "ca step");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{LogicFn, Rotation};
    use crate::id::ShapeId;

    fn place(grid: &mut Grid, x: i32, y: i32, rotation: Rotation, logic: LogicFn) {
        let arrow = grid.get_or_create_arrow(x, y);
        arrow.shape = ShapeId(1);
        arrow.rotation = rotation;
        arrow.logic = logic;
    }

    fn active(grid: &Grid, x: i32, y: i32) -> bool {
        grid.get_arrow(x, y).is_some_and(|a| a.ca_active)
    }

    #[test]
    fn pulse_moves_one_cell_per_tick() {
        let mut grid = Grid::new();
        for x in 0..4 {
            place(&mut grid, x, 0, Rotation::Cw90, LogicFn::Or);
        }
        grid.get_or_create_arrow(0, 0).ca_active = true;

        for tick in 1..4 {
            step(&mut grid);
            for x in 0..4 {
                assert_eq!(active(&grid, x, 0), x == tick, "tick {tick} cell {x}");
            }
        }
        step(&mut grid);
        assert!((0..4).all(|x| !active(&grid, x, 0)));
    }

    #[test]
    fn sends_complete_before_activation() {
        let mut grid = Grid::new();
        // Two active cells in a row: both must shift, not collapse.
        for x in 0..3 {
            place(&mut grid, x, 0, Rotation::Cw90, LogicFn::Or);
        }
        grid.get_or_create_arrow(0, 0).ca_active = true;
        grid.get_or_create_arrow(1, 0).ca_active = true;

        let stats = step(&mut grid);
        assert_eq!(stats.deliveries, 2);
        assert!(!active(&grid, 0, 0));
        assert!(active(&grid, 1, 0));
        assert!(active(&grid, 2, 0));
    }

    #[test]
    fn snapshot_records_previous_state() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 0, Rotation::Cw90, LogicFn::Or);
        place(&mut grid, 1, 0, Rotation::Cw90, LogicFn::Not);
        grid.get_or_create_arrow(0, 0).ca_active = true;

        step(&mut grid);
        let receiver = grid.get_arrow(1, 0).unwrap();
        assert_eq!(
            receiver.ca_last,
            CaSnapshot {
                active: false,
                signal_count: 1
            }
        );
        assert!(!receiver.ca_active);
        assert_eq!(receiver.ca_signal_count, 0);
    }

    #[test]
    fn inverter_source_keeps_firing() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 0, Rotation::Cw90, LogicFn::Not);
        place(&mut grid, 1, 0, Rotation::Cw90, LogicFn::Or);

        step(&mut grid);
        assert!(active(&grid, 0, 0));
        assert!(!active(&grid, 1, 0));
        step(&mut grid);
        assert!(active(&grid, 1, 0));
    }
}
