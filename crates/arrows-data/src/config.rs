//! Engine settings from `engine.{ron,toml,json}`.

use std::path::Path;

use arrows_core::config::EngineConfig;
use tracing::debug;

use crate::loader::{DataLoadError, deserialize_file, find_data_file};

/// Base name of the engine settings file.
pub const CONFIG_FILE: &str = "engine";

/// Load the engine settings in `dir`. A missing file yields the defaults;
/// missing fields in a present file take their default values.
pub fn load_config(dir: &Path) -> Result<EngineConfig, DataLoadError> {
    match find_data_file(dir, CONFIG_FILE)? {
        Some(path) => {
            let config: EngineConfig = deserialize_file(&path)?;
            debug!(file = %path.display(), ?config, "engine config loaded");
            Ok(config)
        }
        None => Ok(EngineConfig::default()),
    }
}
