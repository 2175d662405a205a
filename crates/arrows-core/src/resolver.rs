//! Connectivity resolver: which cells a cell signals to, and which cells
//! signal into it.
//!
//! Routing is data-driven. [`SHAPE_OFFSETS`] maps each shape id to its
//! relative target offsets for a north-facing, unmirrored cell. A concrete
//! offset is obtained by negating the lateral component when mirrored and
//! then rotating clockwise by the cell's quarter turns. Offsets that leave
//! the chunk are re-based into the matching neighbour chunk.
//!
//! A target that lands in a chunk which does not exist, or on an empty cell,
//! is simply not an edge.

use crate::cell::{Arrow, Rotation};
use crate::grid::{CHUNK_SIZE, Compass, Grid};
use crate::id::{CellRef, ShapeId};

/// Largest absolute offset component of any shape.
pub const MAX_REACH: i32 = 2;

/// Relative target offsets per shape id, facing north (`-y`), unmirrored.
/// Index 0 is the empty shape.
pub static SHAPE_OFFSETS: [&[(i32, i32)]; 14] = [
    &[],
    // 1: arrow
    &[(0, -1)],
    // 2: fork
    &[(0, -1), (1, 0)],
    // 3: split
    &[(-1, 0), (1, 0)],
    // 4: tee
    &[(0, -1), (-1, 0), (1, 0)],
    // 5: cross
    &[(0, -1), (1, 0), (0, 1), (-1, 0)],
    // 6: jump
    &[(0, -2)],
    // 7: diagonal
    &[(1, -1)],
    // 8: double
    &[(0, -1), (0, -2)],
    // 9: diagonal split
    &[(-1, -1), (1, -1)],
    // 10: knight
    &[(1, -2)],
    // 11: wide split
    &[(-2, 0), (2, 0)],
    // 12: combiner
    &[(0, -1), (1, -1)],
    // 13: bridge
    &[(0, -2), (2, 0), (0, 2), (-2, 0)],
];

/// Number of shape ids, including the empty shape.
pub const SHAPE_COUNT: u8 = SHAPE_OFFSETS.len() as u8;

/// Base offsets for a shape id. Unknown ids route nowhere.
pub fn shape_offsets(shape: ShapeId) -> &'static [(i32, i32)] {
    SHAPE_OFFSETS
        .get(shape.0 as usize)
        .copied()
        .unwrap_or(&[])
}

pub fn is_known_shape(shape: ShapeId) -> bool {
    shape.0 < SHAPE_COUNT
}

/// Apply mirroring and rotation to a base offset.
pub fn transform(offset: (i32, i32), rotation: Rotation, mirrored: bool) -> (i32, i32) {
    let (mut dx, mut dy) = offset;
    if mirrored {
        dx = -dx;
    }
    for _ in 0..rotation.quarter_turns() {
        (dx, dy) = (-dy, dx);
    }
    (dx, dy)
}

/// Concrete offsets for a cell's shape, rotation and mirror flag.
pub fn arrow_offsets(arrow: &Arrow) -> impl Iterator<Item = (i32, i32)> + '_ {
    shape_offsets(arrow.shape)
        .iter()
        .map(|&o| transform(o, arrow.rotation, arrow.mirrored))
}

/// Move from a cell slot by a small offset, crossing into a neighbour chunk
/// when the local coordinate overflows. Returns `None` when the required
/// neighbour chunk does not exist. The returned slot may be empty.
pub fn step(grid: &Grid, from: CellRef, dx: i32, dy: i32) -> Option<CellRef> {
    let chunk = grid.chunk(from.chunk)?;
    let lx = from.x as i32 + dx;
    let ly = from.y as i32 + dy;
    let ox = overflow(lx);
    let oy = overflow(ly);

    let target_chunk = match Compass::from_overflow(ox, oy) {
        None => from.chunk,
        Some(dir) => chunk.neighbor(dir)?,
    };
    Some(CellRef {
        chunk: target_chunk,
        x: (lx - ox * CHUNK_SIZE) as u8,
        y: (ly - oy * CHUNK_SIZE) as u8,
    })
}

fn overflow(v: i32) -> i32 {
    if v < 0 {
        -1
    } else if v >= CHUNK_SIZE {
        1
    } else {
        0
    }
}

/// Cell slots a cell's routing points at, occupied or not, in shape order.
fn reach(grid: &Grid, cell: CellRef) -> Vec<CellRef> {
    let Some(arrow) = grid.arrow(cell) else {
        return Vec::new();
    };
    arrow_offsets(arrow)
        .filter_map(|(dx, dy)| step(grid, cell, dx, dy))
        .collect()
}

/// Forward query: non-empty cells this cell signals to, in shape order.
pub fn targets(grid: &Grid, cell: CellRef) -> Vec<CellRef> {
    reach(grid, cell)
        .into_iter()
        .filter(|&t| grid.arrow(t).is_some_and(|a| !a.is_empty()))
        .collect()
}

/// Reverse query: non-empty cells whose routing points at `cell`, whether or
/// not `cell` itself is currently occupied. Scans every position within
/// [`MAX_REACH`] and keeps those whose forward resolution lands on `cell`.
pub fn sources(grid: &Grid, cell: CellRef) -> Vec<CellRef> {
    let mut result = Vec::new();
    for dy in -MAX_REACH..=MAX_REACH {
        for dx in -MAX_REACH..=MAX_REACH {
            if dx == 0 && dy == 0 {
                continue;
            }
            let Some(candidate) = step(grid, cell, dx, dy) else {
                continue;
            };
            if grid.arrow(candidate).is_none_or(Arrow::is_empty) {
                continue;
            }
            if reach(grid, candidate).contains(&cell) {
                result.push(candidate);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::LogicFn;

    fn place(grid: &mut Grid, x: i32, y: i32, shape: u8, rotation: Rotation, mirrored: bool) {
        let arrow = grid.get_or_create_arrow(x, y);
        arrow.shape = ShapeId(shape);
        arrow.rotation = rotation;
        arrow.mirrored = mirrored;
        arrow.logic = LogicFn::Or;
    }

    fn world(grid: &Grid, cells: &[CellRef]) -> Vec<(i32, i32)> {
        cells
            .iter()
            .map(|&c| grid.world_position(c).unwrap())
            .collect()
    }

    #[test]
    fn rotation_is_clockwise() {
        assert_eq!(transform((0, -1), Rotation::None, false), (0, -1));
        assert_eq!(transform((0, -1), Rotation::Cw90, false), (1, 0));
        assert_eq!(transform((0, -1), Rotation::Cw180, false), (0, 1));
        assert_eq!(transform((0, -1), Rotation::Cw270, false), (-1, 0));
    }

    #[test]
    fn mirror_negates_lateral_before_rotation() {
        assert_eq!(transform((1, 0), Rotation::None, true), (-1, 0));
        assert_eq!(transform((1, -1), Rotation::Cw90, true), (1, -1));
        assert_eq!(transform((1, -2), Rotation::Cw180, false), (-1, 2));
    }

    #[test]
    fn every_shape_has_offsets_within_reach() {
        assert!(shape_offsets(ShapeId::EMPTY).is_empty());
        for id in 1..SHAPE_COUNT {
            let offsets = shape_offsets(ShapeId(id));
            assert!(!offsets.is_empty(), "shape {id} routes nowhere");
            for &(dx, dy) in offsets {
                assert!(dx.abs() <= MAX_REACH && dy.abs() <= MAX_REACH);
                assert_ne!((dx, dy), (0, 0));
            }
        }
        assert!(shape_offsets(ShapeId(SHAPE_COUNT)).is_empty());
    }

    #[test]
    fn empty_targets_are_not_edges() {
        let mut grid = Grid::new();
        place(&mut grid, 4, 4, 5, Rotation::None, false);
        place(&mut grid, 4, 3, 1, Rotation::None, false);
        let cell = grid.locate(4, 4).unwrap();
        assert_eq!(world(&grid, &targets(&grid, cell)), vec![(4, 3)]);
    }

    #[test]
    fn forward_crosses_chunk_boundaries() {
        let mut grid = Grid::new();
        // East edge of chunk (0,0) pointing east into chunk (1,0).
        place(&mut grid, 15, 5, 1, Rotation::Cw90, false);
        place(&mut grid, 16, 5, 1, Rotation::None, false);
        let cell = grid.locate(15, 5).unwrap();
        assert_eq!(world(&grid, &targets(&grid, cell)), vec![(16, 5)]);
    }

    #[test]
    fn diagonal_overflow_picks_diagonal_chunk() {
        let mut grid = Grid::new();
        // Top-right corner of chunk (0,0), diagonal shape faces north-east.
        place(&mut grid, 15, 0, 7, Rotation::None, false);
        place(&mut grid, 16, -1, 1, Rotation::None, false);
        let cell = grid.locate(15, 0).unwrap();
        assert_eq!(world(&grid, &targets(&grid, cell)), vec![(16, -1)]);
    }

    #[test]
    fn missing_neighbor_chunk_is_no_edge() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 0, 1, Rotation::None, false);
        let cell = grid.locate(0, 0).unwrap();
        assert!(step(&grid, cell, 0, -1).is_none());
        assert!(targets(&grid, cell).is_empty());
    }

    #[test]
    fn distance_two_crosses_negative_boundary() {
        let mut grid = Grid::new();
        place(&mut grid, 0, 8, 6, Rotation::Cw270, false);
        place(&mut grid, -2, 8, 1, Rotation::None, false);
        let cell = grid.locate(0, 8).unwrap();
        assert_eq!(world(&grid, &targets(&grid, cell)), vec![(-2, 8)]);
    }

    #[test]
    fn reverse_finds_every_source() {
        let mut grid = Grid::new();
        place(&mut grid, 5, 5, 1, Rotation::None, false);
        // Points north into (5,5).
        place(&mut grid, 5, 6, 1, Rotation::None, false);
        // Jumps east two cells into (5,5).
        place(&mut grid, 3, 5, 6, Rotation::Cw90, false);
        // Points away from (5,5).
        place(&mut grid, 6, 5, 1, Rotation::Cw90, false);

        let cell = grid.locate(5, 5).unwrap();
        let mut found = world(&grid, &sources(&grid, cell));
        found.sort();
        assert_eq!(found, vec![(3, 5), (5, 6)]);
    }

    #[test]
    fn reverse_works_for_empty_cell() {
        let mut grid = Grid::new();
        place(&mut grid, 5, 6, 1, Rotation::None, false);
        let cell = grid.locate(5, 5).unwrap();
        assert_eq!(world(&grid, &sources(&grid, cell)), vec![(5, 6)]);
    }
}
