use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a live logic node in the compressed graph.
    pub struct NodeId;

    /// Identifies a materialized chunk in grid storage.
    pub struct ChunkId;
}

/// Identifies a routing shape. `ShapeId(0)` is the empty cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ShapeId(pub u8);

impl ShapeId {
    pub const EMPTY: ShapeId = ShapeId(0);

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Integer coordinate of a chunk (world coordinate divided by the chunk size).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Stable reference to one cell slot: owning chunk plus local position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub chunk: ChunkId,
    pub x: u8,
    pub y: u8,
}
