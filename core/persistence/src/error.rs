//! FILENAME: core/persistence/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Please provide JSON content")]
    Empty,

    #[error("Invalid format: Missing template data")]
    MissingTemplate,

    #[error("Invalid template: Missing required section {0}")]
    MissingSection(String),

    #[error("Invalid template: {0}")]
    Schema(String),
}
