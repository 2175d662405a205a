//! Binary snapshots of the raw grid.
//!
//! Snapshots carry every non-empty cell (routing, logic and cellular
//! activation) behind a versioned header, encoded with `bitcode`. The node
//! graph is never persisted: it is recompiled from the loaded cells.
//!
//! Loading decodes into a scratch grid first. The engine adopts the result
//! only when every record is valid, so a malformed snapshot leaves the
//! engine untouched.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cell::{Arrow, LogicFn, Rotation};
use crate::engine::Engine;
use crate::grid::{CHUNK_SIZE, Grid, GridError};
use crate::id::{ChunkCoord, ShapeId};
use crate::resolver;
use crate::sim::SimulationMode;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a grid snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xA770_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("malformed cell at local ({x}, {y}) in chunk ({}, {}): {source}", .chunk.x, .chunk.y)]
    MalformedCell {
        chunk: ChunkCoord,
        x: u8,
        y: u8,
        source: GridError,
    },
    #[error("cell position ({x}, {y}) outside its chunk")]
    OutOfChunk { x: u8, y: u8 },
}

// ---------------------------------------------------------------------------
// Snapshot header
// ---------------------------------------------------------------------------

/// Header prepended to every snapshot. Checked before the payload is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick count at the time the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One non-empty cell. Ids are kept raw so corrupt data surfaces as a
/// [`DeserializeError::MalformedCell`] instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRecord {
    pub x: u8,
    pub y: u8,
    pub shape: u8,
    pub rotation: u8,
    pub mirrored: bool,
    pub logic: u8,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub coord: ChunkCoord,
    pub cells: Vec<CellRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub header: SnapshotHeader,
    pub mode: SimulationMode,
    pub chunks: Vec<ChunkRecord>,
}

impl GridSnapshot {
    /// Capture every non-empty cell of `grid`, chunk by chunk.
    pub fn capture(grid: &Grid, tick: u64, mode: SimulationMode) -> Self {
        let chunks = grid
            .chunks()
            .map(|(_, chunk)| ChunkRecord {
                coord: chunk.coord,
                cells: chunk
                    .occupied()
                    .map(|(x, y, arrow)| CellRecord {
                        x,
                        y,
                        shape: arrow.shape.0,
                        rotation: arrow.rotation.quarter_turns(),
                        mirrored: arrow.mirrored,
                        logic: arrow.logic.id(),
                        active: arrow.ca_active,
                    })
                    .collect(),
            })
            .filter(|record| !record.cells.is_empty())
            .collect();
        Self {
            header: SnapshotHeader::new(tick),
            mode,
            chunks,
        }
    }

    /// Build a fresh grid from the records. Fails on the first invalid
    /// record.
    pub fn to_grid(&self) -> Result<Grid, DeserializeError> {
        let mut grid = Grid::new();
        for chunk in &self.chunks {
            for record in &chunk.cells {
                if record.x as i32 >= CHUNK_SIZE || record.y as i32 >= CHUNK_SIZE {
                    return Err(DeserializeError::OutOfChunk {
                        x: record.x,
                        y: record.y,
                    });
                }
                let arrow = decode_cell(record).map_err(|source| DeserializeError::MalformedCell {
                    chunk: chunk.coord,
                    x: record.x,
                    y: record.y,
                    source,
                })?;
                let x = chunk.coord.x * CHUNK_SIZE + record.x as i32;
                let y = chunk.coord.y * CHUNK_SIZE + record.y as i32;
                *grid.get_or_create_arrow(x, y) = arrow;
            }
        }
        Ok(grid)
    }
}

fn decode_cell(record: &CellRecord) -> Result<Arrow, GridError> {
    let shape = ShapeId(record.shape);
    if shape.is_empty() {
        return Err(GridError::EmptyShape);
    }
    if !resolver::is_known_shape(shape) {
        return Err(GridError::UnknownShape(record.shape));
    }
    if record.rotation > 3 {
        return Err(GridError::InvalidRotation(record.rotation));
    }
    Ok(Arrow {
        shape,
        rotation: Rotation::from_quarter_turns(record.rotation),
        mirrored: record.mirrored,
        logic: LogicFn::try_from(record.logic)?,
        ca_active: record.active,
        ..Arrow::default()
    })
}

/// Decode and validate a snapshot without touching any engine.
pub fn decode_snapshot(data: &[u8]) -> Result<GridSnapshot, DeserializeError> {
    let snapshot: GridSnapshot =
        bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
    snapshot.header.validate()?;
    Ok(snapshot)
}

// ---------------------------------------------------------------------------
// Engine integration
// ---------------------------------------------------------------------------

impl Engine {
    /// Snapshot the raw grid. In compressed mode the node histories are
    /// flattened into the snapshot's activation bits.
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = if self.mode == SimulationMode::Compressed {
            let mut flattened = self.grid.clone();
            self.graph.write_back(&mut flattened);
            GridSnapshot::capture(&flattened, self.sim_state.tick, self.mode)
        } else {
            GridSnapshot::capture(&self.grid, self.sim_state.tick, self.mode)
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Build a new engine from a snapshot, using default settings.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializeError> {
        let mut engine = Engine::new(SimulationMode::Cellular);
        engine.load(data)?;
        Ok(engine)
    }

    /// Replace this engine's grid with a snapshot. On error the engine is
    /// unchanged. On success the graph is recompiled if the snapshot was
    /// taken in compressed mode, and left uncompiled otherwise.
    pub fn load(&mut self, data: &[u8]) -> Result<(), DeserializeError> {
        let snapshot = decode_snapshot(data)
            .inspect_err(|err| warn!(%err, "snapshot rejected"))?;
        let grid = snapshot
            .to_grid()
            .inspect_err(|err| warn!(%err, "snapshot rejected"))?;

        self.grid = grid;
        self.graph.clear();
        self.sim_state.tick = snapshot.header.tick;
        self.mode = SimulationMode::Cellular;
        self.set_mode(snapshot.mode);
        debug!(
            tick = snapshot.header.tick,
            cells = self.grid.arrow_count(),
            "snapshot loaded"
        );
        Ok(())
    }
}
