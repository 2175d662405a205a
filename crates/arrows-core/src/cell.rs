//! Per-position cell record and the per-cell logic functions.

use serde::{Deserialize, Serialize};

use crate::id::{NodeId, ShapeId};

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Rotation applied to a cell's routing shape, in clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// Facing north.
    #[default]
    None,
    /// 90 degrees clockwise (facing east).
    Cw90,
    /// 180 degrees (facing south).
    Cw180,
    /// 270 degrees clockwise (facing west).
    Cw270,
}

impl Rotation {
    /// Build a rotation from a quarter-turn count. Wraps modulo 4.
    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Rotation::None,
            1 => Rotation::Cw90,
            2 => Rotation::Cw180,
            _ => Rotation::Cw270,
        }
    }

    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Logic functions
// ---------------------------------------------------------------------------

/// Activation rule of a cell (or of a node's head cell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LogicFn {
    /// Active when any input is active. Transparent when chained.
    #[default]
    Or,
    /// Always active.
    Constant,
    /// Active when no input is active.
    Not,
    /// Active when at least two inputs are active.
    And,
    /// Active when an odd number of inputs are active.
    Xor,
    /// Flips state whenever any input is active.
    Toggle,
    /// When any input is active, latches whether the input count is even.
    ParityLatch,
}

/// Raised when a numeric logic-function id is out of range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown logic function id {0}")]
pub struct UnknownLogicFn(pub u8);

impl LogicFn {
    /// Compute the next activation from this tick's input count and the
    /// previous activation.
    pub fn activate(self, signal_count: u32, prev: bool) -> bool {
        match self {
            LogicFn::Or => signal_count > 0,
            LogicFn::Constant => true,
            LogicFn::Not => signal_count == 0,
            LogicFn::And => signal_count >= 2,
            LogicFn::Xor => signal_count % 2 == 1,
            LogicFn::Toggle => {
                if signal_count > 0 {
                    !prev
                } else {
                    prev
                }
            }
            LogicFn::ParityLatch => {
                if signal_count > 0 {
                    signal_count % 2 == 0
                } else {
                    prev
                }
            }
        }
    }

    pub fn id(self) -> u8 {
        match self {
            LogicFn::Or => 0,
            LogicFn::Constant => 1,
            LogicFn::Not => 2,
            LogicFn::And => 3,
            LogicFn::Xor => 4,
            LogicFn::Toggle => 5,
            LogicFn::ParityLatch => 6,
        }
    }
}

impl TryFrom<u8> for LogicFn {
    type Error = UnknownLogicFn;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Ok(match id {
            0 => LogicFn::Or,
            1 => LogicFn::Constant,
            2 => LogicFn::Not,
            3 => LogicFn::And,
            4 => LogicFn::Xor,
            5 => LogicFn::Toggle,
            6 => LogicFn::ParityLatch,
            other => return Err(UnknownLogicFn(other)),
        })
    }
}

// ---------------------------------------------------------------------------
// Arrow
// ---------------------------------------------------------------------------

/// State of a cell as of the previous CA tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CaSnapshot {
    pub active: bool,
    pub signal_count: u32,
}

/// One grid position. A cell whose shape is empty carries no other
/// meaningful fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arrow {
    pub shape: ShapeId,
    pub rotation: Rotation,
    pub mirrored: bool,
    pub logic: LogicFn,

    // -- Cellular model --
    pub ca_active: bool,
    pub ca_signal_count: u32,
    pub ca_last: CaSnapshot,

    // -- Compressed model --
    /// Node owning this cell, when the graph has been compiled.
    pub node: Option<NodeId>,
    /// Position of this cell inside its owning node's run.
    pub offset: u32,
}

impl Arrow {
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Reset to the empty cell.
    pub fn clear(&mut self) {
        *self = Arrow::default();
    }
}
