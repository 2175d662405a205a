//! Sparse chunked grid storage.
//!
//! The grid is an effectively infinite plane of cells, materialized in
//! fixed [`CHUNK_SIZE`]×[`CHUNK_SIZE`] chunks on first write. Each chunk
//! links to its eight compass neighbours so the connectivity resolver can
//! cross chunk boundaries without going back through the coordinate index.
//!
//! Chunks are never removed: clearing a cell resets it to empty in place.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::BTreeMap;

use crate::cell::{Arrow, UnknownLogicFn};
use crate::id::{CellRef, ChunkCoord, ChunkId};

/// Side length of a chunk, in cells.
pub const CHUNK_SIZE: i32 = 16;

const CHUNK_CELLS: usize = (CHUNK_SIZE * CHUNK_SIZE) as usize;

// ---------------------------------------------------------------------------
// Compass
// ---------------------------------------------------------------------------

/// The eight neighbour directions of a chunk. North is `-y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compass {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Compass {
    pub fn all() -> [Compass; 8] {
        [
            Compass::North,
            Compass::NorthEast,
            Compass::East,
            Compass::SouthEast,
            Compass::South,
            Compass::SouthWest,
            Compass::West,
            Compass::NorthWest,
        ]
    }

    /// Chunk-coordinate offset for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Compass::North => (0, -1),
            Compass::NorthEast => (1, -1),
            Compass::East => (1, 0),
            Compass::SouthEast => (1, 1),
            Compass::South => (0, 1),
            Compass::SouthWest => (-1, 1),
            Compass::West => (-1, 0),
            Compass::NorthWest => (-1, -1),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Compass::North => Compass::South,
            Compass::NorthEast => Compass::SouthWest,
            Compass::East => Compass::West,
            Compass::SouthEast => Compass::NorthWest,
            Compass::South => Compass::North,
            Compass::SouthWest => Compass::NorthEast,
            Compass::West => Compass::East,
            Compass::NorthWest => Compass::SouthEast,
        }
    }

    /// Direction for a per-axis overflow in `{-1, 0, 1}²`. `None` for `(0, 0)`.
    pub fn from_overflow(ox: i32, oy: i32) -> Option<Self> {
        Self::all().into_iter().find(|c| c.offset() == (ox, oy))
    }

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A fixed block of cells plus links to the eight neighbouring chunks.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub coord: ChunkCoord,
    cells: Vec<Arrow>,
    neighbors: [Option<ChunkId>; 8],
}

impl Chunk {
    fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            cells: vec![Arrow::default(); CHUNK_CELLS],
            neighbors: [None; 8],
        }
    }

    fn slot(x: u8, y: u8) -> usize {
        y as usize * CHUNK_SIZE as usize + x as usize
    }

    /// Cell at a local position. Local coordinates must be in `[0, CHUNK_SIZE)`.
    pub fn cell(&self, x: u8, y: u8) -> &Arrow {
        &self.cells[Self::slot(x, y)]
    }

    pub fn cell_mut(&mut self, x: u8, y: u8) -> &mut Arrow {
        &mut self.cells[Self::slot(x, y)]
    }

    pub fn neighbor(&self, dir: Compass) -> Option<ChunkId> {
        self.neighbors[dir.index()]
    }

    /// Iterate over non-empty cells with their local positions, row-major.
    pub fn occupied(&self) -> impl Iterator<Item = (u8, u8, &Arrow)> {
        self.cells.iter().enumerate().filter_map(|(i, arrow)| {
            if arrow.is_empty() {
                return None;
            }
            let x = (i % CHUNK_SIZE as usize) as u8;
            let y = (i / CHUNK_SIZE as usize) as u8;
            Some((x, y, arrow))
        })
    }

    pub fn occupied_mut(&mut self) -> impl Iterator<Item = (u8, u8, &mut Arrow)> {
        self.cells.iter_mut().enumerate().filter_map(|(i, arrow)| {
            if arrow.is_empty() {
                return None;
            }
            let x = (i % CHUNK_SIZE as usize) as u8;
            let y = (i / CHUNK_SIZE as usize) as u8;
            Some((x, y, arrow))
        })
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|a| !a.is_empty()).count()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Raw cell input that cannot be stored in the grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("unknown shape id {0}")]
    UnknownShape(u8),
    #[error("shape id 0 is the empty cell and cannot be placed")]
    EmptyShape,
    #[error(transparent)]
    UnknownLogic(#[from] UnknownLogicFn),
    #[error("rotation must be 0-3 quarter turns, got {0}")]
    InvalidRotation(u8),
}

// ---------------------------------------------------------------------------
// Grid
// ---------------------------------------------------------------------------

/// Sparse mapping from chunk coordinate to chunk.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    chunks: SlotMap<ChunkId, Chunk>,
    index: BTreeMap<ChunkCoord, ChunkId>,
}

/// Split a world coordinate into its chunk coordinate and local position.
pub fn split_world(x: i32, y: i32) -> (ChunkCoord, u8, u8) {
    let coord = ChunkCoord::new(x.div_euclid(CHUNK_SIZE), y.div_euclid(CHUNK_SIZE));
    (
        coord,
        x.rem_euclid(CHUNK_SIZE) as u8,
        y.rem_euclid(CHUNK_SIZE) as u8,
    )
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Chunks --

    pub fn chunk_id(&self, coord: ChunkCoord) -> Option<ChunkId> {
        self.index.get(&coord).copied()
    }

    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id)
    }

    /// Chunk at a chunk coordinate, if it has been materialized.
    pub fn get_chunk(&self, cx: i32, cy: i32) -> Option<&Chunk> {
        self.chunk_id(ChunkCoord::new(cx, cy))
            .and_then(|id| self.chunks.get(id))
    }

    /// Materialize the chunk at `coord`, linking it to existing neighbours.
    /// Idempotent.
    pub fn get_or_create_chunk(&mut self, coord: ChunkCoord) -> ChunkId {
        if let Some(id) = self.chunk_id(coord) {
            return id;
        }
        let id = self.chunks.insert(Chunk::new(coord));
        self.index.insert(coord, id);

        for dir in Compass::all() {
            let (dx, dy) = dir.offset();
            let Some(other) = self.chunk_id(ChunkCoord::new(coord.x + dx, coord.y + dy)) else {
                continue;
            };
            self.chunks[id].neighbors[dir.index()] = Some(other);
            self.chunks[other].neighbors[dir.opposite().index()] = Some(id);
        }
        id
    }

    /// Iterate over all chunks in coordinate order.
    pub fn chunks(&self) -> impl Iterator<Item = (ChunkId, &Chunk)> {
        self.index.values().map(|&id| (id, &self.chunks[id]))
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    // -- Cell references --

    /// Reference to the cell slot at a world position, if its chunk exists.
    pub fn locate(&self, x: i32, y: i32) -> Option<CellRef> {
        let (coord, lx, ly) = split_world(x, y);
        self.chunk_id(coord).map(|chunk| CellRef {
            chunk,
            x: lx,
            y: ly,
        })
    }

    /// Reference to the cell slot at a world position, creating its chunk.
    pub fn locate_or_create(&mut self, x: i32, y: i32) -> CellRef {
        let (coord, lx, ly) = split_world(x, y);
        CellRef {
            chunk: self.get_or_create_chunk(coord),
            x: lx,
            y: ly,
        }
    }

    /// World position of a cell reference.
    pub fn world_position(&self, cell: CellRef) -> Option<(i32, i32)> {
        let chunk = self.chunks.get(cell.chunk)?;
        Some((
            chunk.coord.x * CHUNK_SIZE + cell.x as i32,
            chunk.coord.y * CHUNK_SIZE + cell.y as i32,
        ))
    }

    pub fn arrow(&self, cell: CellRef) -> Option<&Arrow> {
        self.chunks.get(cell.chunk).map(|c| c.cell(cell.x, cell.y))
    }

    pub fn arrow_mut(&mut self, cell: CellRef) -> Option<&mut Arrow> {
        self.chunks
            .get_mut(cell.chunk)
            .map(|c| c.cell_mut(cell.x, cell.y))
    }

    // -- World-coordinate access --

    /// Non-empty cell at a world position.
    pub fn get_arrow(&self, x: i32, y: i32) -> Option<&Arrow> {
        self.locate(x, y)
            .and_then(|cell| self.arrow(cell))
            .filter(|a| !a.is_empty())
    }

    /// Cell slot at a world position, materializing its chunk on demand.
    pub fn get_or_create_arrow(&mut self, x: i32, y: i32) -> &mut Arrow {
        let (coord, lx, ly) = split_world(x, y);
        let id = self.get_or_create_chunk(coord);
        self.chunks[id].cell_mut(lx, ly)
    }

    /// Reset the cell at a world position to empty. Returns the previous
    /// record when the cell was occupied.
    pub fn remove_arrow(&mut self, x: i32, y: i32) -> Option<Arrow> {
        let cell = self.locate(x, y)?;
        let arrow = self.arrow_mut(cell)?;
        if arrow.is_empty() {
            return None;
        }
        Some(std::mem::take(arrow))
    }

    /// Iterate over every non-empty cell, chunk by chunk in coordinate order.
    pub fn occupied(&self) -> impl Iterator<Item = (CellRef, &Arrow)> {
        self.chunks().flat_map(|(id, chunk)| {
            chunk
                .occupied()
                .map(move |(x, y, arrow)| (CellRef { chunk: id, x, y }, arrow))
        })
    }

    /// Mutable iteration over every non-empty cell, in arena order.
    pub fn occupied_mut(&mut self) -> impl Iterator<Item = (CellRef, &mut Arrow)> {
        self.chunks.iter_mut().flat_map(|(id, chunk)| {
            chunk
                .occupied_mut()
                .map(move |(x, y, arrow)| (CellRef { chunk: id, x, y }, arrow))
        })
    }

    pub fn arrow_count(&self) -> usize {
        self.chunks.values().map(Chunk::occupied_count).sum()
    }
}
