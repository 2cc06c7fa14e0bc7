//! FILENAME: core/persistence/src/document_reader.rs
//! PURPOSE: Import of the persisted template document.
//! CONTEXT: Accepts the wrapped form `{ "template": {...}, "variants": [...] }`
//! or a bare template object. The JSON is checked section by section before
//! any typed decoding so the error can name what is missing. Nothing is
//! returned unless the whole document decodes.

use crate::PersistenceError;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use template_engine::logging::{log_info, log_warn, CAT_IMPORT};
use template_engine::{Template, TemplateDocument, Variant};

/// Sections every template must carry, in the order they are checked.
const REQUIRED_SECTIONS: [&str; 3] = ["templateMeta", "reportMeta", "reportData"];
const REQUIRED_DATA_SECTIONS: [&str; 2] = ["columns", "rows"];

pub fn import_document(text: &str) -> Result<TemplateDocument, PersistenceError> {
    let result = decode(text);
    match &result {
        Ok(document) => log_info!(
            CAT_IMPORT,
            "imported template {} ({} columns, {} rows, {} variants)",
            document.template.template_meta.template_id,
            document.template.columns().len(),
            document.template.rows().len(),
            document.variants.len()
        ),
        Err(err) => log_warn!(CAT_IMPORT, "rejected import: {}", err),
    }
    result
}

pub fn load_document(path: &Path) -> Result<TemplateDocument, PersistenceError> {
    let text = fs::read_to_string(path)?;
    import_document(&text)
}

fn decode(text: &str) -> Result<TemplateDocument, PersistenceError> {
    if text.trim().is_empty() {
        return Err(PersistenceError::Empty);
    }

    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut root) = value else {
        return Err(PersistenceError::MissingTemplate);
    };

    let (template, variants) = match root.remove("template") {
        Some(template) => (template, root.remove("variants")),
        None if root.contains_key("templateMeta") => (Value::Object(root), None),
        None => return Err(PersistenceError::MissingTemplate),
    };

    check_sections(&template)?;

    let template: Template =
        serde_json::from_value(template).map_err(|e| PersistenceError::Schema(e.to_string()))?;
    let variants: Vec<Variant> = match variants {
        None | Some(Value::Null) => Vec::new(),
        Some(variants) => serde_json::from_value(variants)
            .map_err(|e| PersistenceError::Schema(format!("variants: {}", e)))?,
    };

    Ok(TemplateDocument { template, variants })
}

fn check_sections(template: &Value) -> Result<(), PersistenceError> {
    let template = template.as_object().ok_or(PersistenceError::MissingTemplate)?;
    for section in REQUIRED_SECTIONS {
        require(template, section, section)?;
    }

    let data = template
        .get("reportData")
        .and_then(Value::as_object)
        .ok_or_else(|| PersistenceError::Schema("reportData must be an object".to_string()))?;
    for section in REQUIRED_DATA_SECTIONS {
        require(data, section, &format!("reportData.{}", section))?;
    }
    Ok(())
}

fn require(object: &Map<String, Value>, key: &str, name: &str) -> Result<(), PersistenceError> {
    match object.get(key) {
        None | Some(Value::Null) => Err(PersistenceError::MissingSection(name.to_string())),
        Some(_) => Ok(()),
    }
}
