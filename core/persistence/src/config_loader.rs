//! FILENAME: core/persistence/src/config_loader.rs

use crate::PersistenceError;
use std::fs;
use std::path::Path;
use template_engine::EditorConfig;

/// Reads an `EditorConfig` from a JSON file. Missing fields take their
/// defaults; an empty file gives the default config.
pub fn load_config(path: &Path) -> Result<EditorConfig, PersistenceError> {
    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(EditorConfig::default());
    }
    Ok(serde_json::from_str(&text)?)
}
