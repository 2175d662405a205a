//! Data-file front end for the arrows engine.
//!
//! Engine settings and grid layouts are plain serde documents in RON, TOML
//! or JSON, chosen by file extension. [`load_engine`] reads a directory
//! holding `engine.*` (optional) and `layout.*` (required) and returns a
//! ready [`Engine`](arrows_core::engine::Engine).

pub mod config;
pub mod layout;
pub mod loader;

pub use config::load_config;
pub use layout::{ArrowSpec, LayoutFile, load_engine};
pub use loader::{DataLoadError, Format};
