//! FILENAME: core/persistence/src/api.rs
//! PURPOSE: Payloads and paths of the template backend API.
//! CONTEXT: Only the wire shapes live here. Sending them is up to the host.

use serde::{Deserialize, Serialize};
use template_engine::{Template, TemplateDocument, TableCatalog, Variant};

use crate::PersistenceError;

pub const SAVE_TEMPLATE_PATH: &str = "/api/templates/save";
pub const ALLOWED_TABLES_PATH: &str = "/allowed-tables/tables";

/// `/templates/{templateId}/variants`
pub fn variants_path(template_id: &str) -> String {
    format!("/templates/{}/variants", template_id)
}

/// Body of `POST /api/templates/save`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateRequest {
    pub template: Template,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl From<&TemplateDocument> for SaveTemplateRequest {
    fn from(document: &TemplateDocument) -> Self {
        SaveTemplateRequest {
            template: document.template.clone(),
            variants: document.variants.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveTemplateResponse {
    pub template_id: String,
}

/// Body of `POST /templates/{templateId}/variants`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveVariantsRequest {
    pub variants: Vec<Variant>,
}

/// Parses the `GET /allowed-tables/tables` response.
pub fn parse_table_catalog(text: &str) -> Result<TableCatalog, PersistenceError> {
    if text.trim().is_empty() {
        return Err(PersistenceError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use template_engine::DbAggregate;

    #[test]
    fn test_save_request_shape() {
        let document = TemplateDocument::new(Template::new("TPL_9"));
        let json = serde_json::to_value(SaveTemplateRequest::from(&document)).unwrap();
        assert_eq!(json["template"]["templateMeta"]["templateId"], "TPL_9");
        assert!(json["variants"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_save_response_parsed() {
        let response: SaveTemplateResponse = serde_json::from_str(r#"{"templateId": "TPL_42"}"#).unwrap();
        assert_eq!(variants_path(&response.template_id), "/templates/TPL_42/variants");
    }

    #[test]
    fn test_catalog_parsed() {
        let catalog = parse_table_catalog(
            r#"[{"tableId": 7, "tableName": "GL_BALANCE", "label": "GL", "columns": [
                {"columnId": 1, "columnName": "AMOUNT", "label": "Amount", "dataType": "NUMBER",
                 "selectable": "Y", "filterable": "Y", "aggFuncs": "SUM,MAX"}
            ]}]"#,
        )
        .unwrap();
        assert!(catalog.has_table("GL_BALANCE"));
        assert!(catalog.is_aggregate_allowed("GL_BALANCE", "AMOUNT", DbAggregate::Max));
        assert!(!catalog.is_aggregate_allowed("GL_BALANCE", "AMOUNT", DbAggregate::Avg));
    }
}
