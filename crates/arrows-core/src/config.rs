//! Engine construction settings.

use serde::{Deserialize, Serialize};

use crate::sim::SimulationMode;

/// Settings an [`Engine`](crate::engine::Engine) is built with. Every field
/// has a default so partial config files deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model stepped by `advance()` at startup.
    pub mode: SimulationMode,
    /// Applied edits retained in the queue history. 0 disables history.
    pub edit_history: usize,
    /// Run the full invariant check after every edit batch.
    pub validate_edits: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: SimulationMode::Cellular,
            edit_history: 256,
            validate_edits: cfg!(debug_assertions),
        }
    }
}
