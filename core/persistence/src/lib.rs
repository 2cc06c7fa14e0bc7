//! FILENAME: core/persistence/src/lib.rs
//! Template Persistence Module
//!
//! Handles importing, exporting, loading and saving template documents as
//! JSON, the save API payloads, and the configuration files the editor reads.

mod api;
mod config_loader;
mod document_reader;
mod document_writer;
mod error;

pub use api::{
    parse_table_catalog, variants_path, SaveTemplateRequest, SaveTemplateResponse,
    SaveVariantsRequest, ALLOWED_TABLES_PATH, SAVE_TEMPLATE_PATH,
};
pub use config_loader::load_config;
pub use document_reader::{import_document, load_document};
pub use document_writer::{export_document, save_document};
pub use error::PersistenceError;

use template_engine::TemplateDocument;

// ============================================================================
// IMPORT PREVIEW
// ============================================================================

/// What an import is about to bring in, shown before the user accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// Report name, or the template id when the report is unnamed.
    pub name: String,
    pub columns: usize,
    pub rows: usize,
    pub variants: usize,
}

impl ImportSummary {
    pub fn of(document: &TemplateDocument) -> Self {
        let template = &document.template;
        let name = if template.report_meta.report_name.is_empty() {
            template.template_meta.template_id.clone()
        } else {
            template.report_meta.report_name.clone()
        };
        ImportSummary {
            name,
            columns: template.columns().len(),
            rows: template.rows().len(),
            variants: document.variants.len(),
        }
    }
}

/// Parses `text` and summarizes it without committing to anything.
pub fn preview_import(text: &str) -> Result<(TemplateDocument, ImportSummary), PersistenceError> {
    let document = import_document(text)?;
    let summary = ImportSummary::of(&document);
    Ok((document, summary))
}
