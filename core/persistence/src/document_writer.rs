//! FILENAME: core/persistence/src/document_writer.rs

use crate::PersistenceError;
use std::fs;
use std::path::Path;
use template_engine::logging::{log_info, CAT_IMPORT};
use template_engine::TemplateDocument;

/// Pretty JSON in the wrapped `{ template, variants }` form.
pub fn export_document(document: &TemplateDocument) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(document)?)
}

pub fn save_document(document: &TemplateDocument, path: &Path) -> Result<(), PersistenceError> {
    let text = export_document(document)?;
    fs::write(path, text)?;
    log_info!(
        CAT_IMPORT,
        "saved template {} to {}",
        document.template.template_meta.template_id,
        path.display()
    );
    Ok(())
}
