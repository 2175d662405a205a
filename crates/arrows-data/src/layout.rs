//! Grid layouts from `layout.{ron,toml,json}`.
//!
//! A layout is a flat list of arrows with raw numeric ids, in the same
//! encoding the snapshot format uses. Ids are checked here so errors point at
//! the offending entry; the engine then places the arrows as one edit batch.

use serde::{Deserialize, Serialize};
use std::path::Path;

use arrows_core::cell::{LogicFn, Rotation};
use arrows_core::edit::Edit;
use arrows_core::engine::Engine;
use arrows_core::grid::GridError;
use arrows_core::id::ShapeId;
use arrows_core::resolver;
use tracing::{debug, warn};

use crate::config::load_config;
use crate::loader::{DataLoadError, deserialize_file, require_data_file, serialize_file};

/// Base name of the layout file.
pub const LAYOUT_FILE: &str = "layout";

// ===========================================================================
// Schema
// ===========================================================================

/// One arrow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowSpec {
    pub x: i32,
    pub y: i32,
    pub shape: u8,
    /// Clockwise quarter turns, 0-3.
    #[serde(default)]
    pub rotation: u8,
    #[serde(default)]
    pub mirrored: bool,
    /// Logic function id, 0 (or) by default.
    #[serde(default)]
    pub logic: u8,
    #[serde(default)]
    pub active: bool,
}

/// Top-level layout document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default)]
    pub arrows: Vec<ArrowSpec>,
}

impl ArrowSpec {
    /// Validate the raw ids and produce the place edit, plus an activation
    /// edit for initially active arrows.
    pub fn to_edits(&self) -> Result<Vec<Edit>, GridError> {
        let shape = ShapeId(self.shape);
        if shape.is_empty() {
            return Err(GridError::EmptyShape);
        }
        if !resolver::is_known_shape(shape) {
            return Err(GridError::UnknownShape(self.shape));
        }
        if self.rotation > 3 {
            return Err(GridError::InvalidRotation(self.rotation));
        }
        let mut edits = vec![Edit::Place {
            x: self.x,
            y: self.y,
            shape,
            rotation: Rotation::from_quarter_turns(self.rotation),
            mirrored: self.mirrored,
            logic: LogicFn::try_from(self.logic)?,
        }];
        if self.active {
            edits.push(Edit::SetActive {
                x: self.x,
                y: self.y,
                active: true,
            });
        }
        Ok(edits)
    }
}

impl LayoutFile {
    /// Capture every occupied cell of `engine`, with activity taken from the
    /// model the engine is currently stepping.
    pub fn capture(engine: &Engine) -> Self {
        let mut arrows: Vec<ArrowSpec> = engine
            .grid
            .occupied()
            .filter_map(|(cell, _)| engine.grid.world_position(cell))
            .filter_map(|(x, y)| {
                let view = engine.cell_view(x, y)?;
                Some(ArrowSpec {
                    x,
                    y,
                    shape: view.shape.0,
                    rotation: view.rotation.quarter_turns(),
                    mirrored: view.mirrored,
                    logic: view.logic.id(),
                    active: view.active,
                })
            })
            .collect();
        arrows.sort_by_key(|a| (a.y, a.x));
        Self { arrows }
    }

    /// All edits for this layout, in file order. Later entries at the same
    /// position replace earlier ones.
    pub fn to_edits(&self, file: &Path) -> Result<Vec<Edit>, DataLoadError> {
        let mut edits = Vec::with_capacity(self.arrows.len());
        for (index, spec) in self.arrows.iter().enumerate() {
            let spec_edits = spec.to_edits().map_err(|source| DataLoadError::InvalidArrow {
                file: file.to_path_buf(),
                index,
                source,
            })?;
            edits.extend(spec_edits);
        }
        Ok(edits)
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Read a layout file.
pub fn load_layout(path: &Path) -> Result<LayoutFile, DataLoadError> {
    deserialize_file(path)
}

/// Write a layout file in the format implied by the extension.
pub fn save_layout(path: &Path, layout: &LayoutFile) -> Result<(), DataLoadError> {
    serialize_file(path, layout)
}

/// Build an engine from `dir`: settings from the optional engine file,
/// cells from the required layout file.
pub fn load_engine(dir: &Path) -> Result<Engine, DataLoadError> {
    let config = load_config(dir)?;
    let path = require_data_file(dir, LAYOUT_FILE)?;
    let layout = load_layout(&path)?;
    let edits = layout.to_edits(&path)?;

    let mut engine = Engine::with_config(config);
    if let Err(err) = engine.apply_edits(&edits) {
        warn!(file = %path.display(), %err, "layout rejected by engine");
        return Err(err.into());
    }
    debug!(
        file = %path.display(),
        arrows = engine.cell_count(),
        nodes = engine.graph().len(),
        mode = ?engine.mode(),
        "engine loaded"
    );
    Ok(engine)
}

// ===========================================================================
// Tests
// ===========================================================================
