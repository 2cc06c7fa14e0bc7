//! FILENAME: core/engine/src/config.rs
//! PURPOSE: Editor configuration.
//! CONTEXT: Loaded from JSON by the persistence crate; every field has a
//! default so a partial (or empty) file is valid.

use serde::{Deserialize, Serialize};

/// Tunables for an editing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    /// Prefix for auto-generated row ids.
    pub row_id_prefix: String,
    /// Prefix for auto-generated column ids.
    pub column_id_prefix: String,
    /// Row limit given to new dynamic rows.
    pub default_dynamic_limit: u32,
    /// Maximum number of undo steps kept.
    pub history_limit: usize,
    /// Include variant referential checks in `EditorSession::validate`.
    pub validate_variant_references: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            row_id_prefix: "R__".to_string(),
            column_id_prefix: "col_".to_string(),
            default_dynamic_limit: 100,
            history_limit: 100,
            validate_variant_references: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: EditorConfig = serde_json::from_str(r#"{"rowIdPrefix": "row_"}"#).unwrap();
        assert_eq!(config.row_id_prefix, "row_");
        assert_eq!(config.column_id_prefix, "col_");
        assert_eq!(config.default_dynamic_limit, 100);
        assert!(!config.validate_variant_references);
    }
}
