//! FILENAME: core/engine/src/model.rs
//! PURPOSE: The report template document.
//! CONTEXT: A template is `{templateMeta, reportMeta, reportData}` where
//! `reportData` holds the ordered column list and the ordered row list. Static
//! rows carry one cell per column, positionally aligned with `columns`;
//! dynamic rows carry a database query config and one column mapping per
//! template column instead of cells.

use crate::cell::{Cell, FormulaVariables};
use crate::filter::FilterSet;
use crate::variant::Variant;
use formula_parser::ReferenceScope;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The persisted unit: a template and its report variants.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDocument {
    pub template: Template,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl TemplateDocument {
    pub fn new(template: Template) -> Self {
        TemplateDocument {
            template,
            variants: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub template_meta: TemplateMeta,
    pub report_meta: ReportMeta,
    pub report_data: ReportData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TemplateMeta {
    pub template_id: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub page_size: String,
    pub page_orientation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header_layout: Option<String>,
}

impl Default for TemplateMeta {
    fn default() -> Self {
        TemplateMeta {
            template_id: String::new(),
            version: "1.0".to_string(),
            description: None,
            page_size: "A4".to_string(),
            page_orientation: "portrait".to_string(),
            header_layout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportMeta {
    pub report_name: String,
    pub report_id: String,
    pub extras: Vec<ReportExtra>,
}

/// Free-form name/value pair printed with the report.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportExtra {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReportData {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

// ============================================================================
// COLUMNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub format: ColumnFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Column {
            id: id.into(),
            name: name.into(),
            format: ColumnFormat::default(),
            width: None,
        }
    }
}

/// Column display format. Only `type` is interpreted; type-specific
/// fields are carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFormat {
    #[serde(rename = "type", default = "default_format_type")]
    pub kind: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_format_type() -> String {
    "TEXT".to_string()
}

impl Default for ColumnFormat {
    fn default() -> Self {
        ColumnFormat {
            kind: default_format_type(),
            extra: Map::new(),
        }
    }
}

// ============================================================================
// ROWS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RowType {
    Header,
    Data,
    Separator,
    Dynamic,
    Footer,
}

impl RowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RowType::Header => "HEADER",
            RowType::Data => "DATA",
            RowType::Separator => "SEPARATOR",
            RowType::Dynamic => "DYNAMIC",
            RowType::Footer => "FOOTER",
        }
    }
}

impl fmt::Display for RowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    #[serde(flatten)]
    pub kind: RowKind,
}

/// Row payload, discriminated by `rowType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rowType", rename_all = "UPPERCASE")]
pub enum RowKind {
    Header {
        #[serde(default)]
        cells: Vec<Cell>,
    },
    Data {
        #[serde(default)]
        cells: Vec<Cell>,
    },
    Separator {
        #[serde(default)]
        cells: Vec<Cell>,
    },
    Footer {
        #[serde(default)]
        cells: Vec<Cell>,
    },
    Dynamic {
        #[serde(rename = "dynamicConfig", default)]
        dynamic_config: DynamicRowConfig,
    },
}

impl Row {
    /// A static row with one empty TEXT cell per column, or a dynamic row
    /// with one empty mapping per column.
    pub fn new(id: impl Into<String>, row_type: RowType, columns: &[Column], limit: u32) -> Self {
        let blank = || vec![Cell::default(); columns.len()];
        let kind = match row_type {
            RowType::Header => RowKind::Header { cells: blank() },
            RowType::Data => RowKind::Data { cells: blank() },
            RowType::Separator => RowKind::Separator { cells: blank() },
            RowType::Footer => RowKind::Footer { cells: blank() },
            RowType::Dynamic => RowKind::Dynamic {
                dynamic_config: DynamicRowConfig::for_columns(columns, limit),
            },
        };
        Row {
            id: id.into(),
            kind,
        }
    }

    pub fn row_type(&self) -> RowType {
        match self.kind {
            RowKind::Header { .. } => RowType::Header,
            RowKind::Data { .. } => RowType::Data,
            RowKind::Separator { .. } => RowType::Separator,
            RowKind::Footer { .. } => RowType::Footer,
            RowKind::Dynamic { .. } => RowType::Dynamic,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, RowKind::Dynamic { .. })
    }

    /// Static cells; None for a dynamic row.
    pub fn cells(&self) -> Option<&[Cell]> {
        match &self.kind {
            RowKind::Header { cells }
            | RowKind::Data { cells }
            | RowKind::Separator { cells }
            | RowKind::Footer { cells } => Some(cells),
            RowKind::Dynamic { .. } => None,
        }
    }

    pub fn cells_mut(&mut self) -> Option<&mut Vec<Cell>> {
        match &mut self.kind {
            RowKind::Header { cells }
            | RowKind::Data { cells }
            | RowKind::Separator { cells }
            | RowKind::Footer { cells } => Some(cells),
            RowKind::Dynamic { .. } => None,
        }
    }

    pub fn dynamic_config(&self) -> Option<&DynamicRowConfig> {
        match &self.kind {
            RowKind::Dynamic { dynamic_config } => Some(dynamic_config),
            _ => None,
        }
    }

    pub fn dynamic_config_mut(&mut self) -> Option<&mut DynamicRowConfig> {
        match &mut self.kind {
            RowKind::Dynamic { dynamic_config } => Some(dynamic_config),
            _ => None,
        }
    }
}

// ============================================================================
// DYNAMIC ROWS
// ============================================================================

/// Which database column feeds a template column of a dynamic row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub template_column_id: String,
    #[serde(default)]
    pub db_column: String,
}

impl ColumnMapping {
    pub fn empty(template_column_id: impl Into<String>) -> Self {
        ColumnMapping {
            template_column_id: template_column_id.into(),
            db_column: String::new(),
        }
    }

    pub fn is_mapped(&self) -> bool {
        !self.db_column.is_empty()
    }
}

pub const DB_LIST: &str = "DB_LIST";
pub const DEFAULT_DYNAMIC_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamicRowConfig {
    #[serde(rename = "type", default = "default_dynamic_kind")]
    pub kind: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub column_mappings: Vec<ColumnMapping>,
    /// Mapped db columns in mapping order. Derived from `column_mappings`.
    #[serde(default)]
    pub select: Vec<String>,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub orderby: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_dynamic_kind() -> String {
    DB_LIST.to_string()
}

fn default_limit() -> u32 {
    DEFAULT_DYNAMIC_LIMIT
}

impl Default for DynamicRowConfig {
    fn default() -> Self {
        DynamicRowConfig {
            kind: default_dynamic_kind(),
            table: String::new(),
            column_mappings: Vec::new(),
            select: Vec::new(),
            filters: FilterSet::new(),
            orderby: String::new(),
            limit: DEFAULT_DYNAMIC_LIMIT,
        }
    }
}

impl DynamicRowConfig {
    pub fn for_columns(columns: &[Column], limit: u32) -> Self {
        DynamicRowConfig {
            column_mappings: columns.iter().map(|c| ColumnMapping::empty(&c.id)).collect(),
            limit,
            ..DynamicRowConfig::default()
        }
    }

    /// Switches the source table. Mappings reset to empty for every column.
    pub fn set_table(&mut self, table: impl Into<String>, columns: &[Column]) {
        self.table = table.into();
        self.column_mappings = columns.iter().map(|c| ColumnMapping::empty(&c.id)).collect();
        self.select.clear();
    }

    pub fn mapping(&self, template_column_id: &str) -> Option<&ColumnMapping> {
        self.column_mappings
            .iter()
            .find(|m| m.template_column_id == template_column_id)
    }

    /// Maps a template column to a db column (empty string unmaps it) and
    /// re-derives `select`.
    pub fn set_mapping(&mut self, template_column_id: &str, db_column: impl Into<String>, columns: &[Column]) {
        let db_column = db_column.into();
        self.ensure_mappings(columns);
        match self
            .column_mappings
            .iter_mut()
            .find(|m| m.template_column_id == template_column_id)
        {
            Some(mapping) => mapping.db_column = db_column,
            None => self.column_mappings.push(ColumnMapping {
                template_column_id: template_column_id.to_string(),
                db_column,
            }),
        }
        self.sync_select();
    }

    /// Adds an empty mapping for every column that has none.
    pub fn ensure_mappings(&mut self, columns: &[Column]) {
        for column in columns {
            if self.mapping(&column.id).is_none() {
                self.column_mappings.push(ColumnMapping::empty(&column.id));
            }
        }
    }

    pub fn remove_mapping(&mut self, template_column_id: &str) {
        self.column_mappings
            .retain(|m| m.template_column_id != template_column_id);
        self.sync_select();
    }

    pub fn rename_mapping(&mut self, old_id: &str, new_id: &str) {
        for mapping in &mut self.column_mappings {
            if mapping.template_column_id == old_id {
                mapping.template_column_id = new_id.to_string();
            }
        }
    }

    pub fn mapped_count(&self) -> usize {
        self.column_mappings.iter().filter(|m| m.is_mapped()).count()
    }

    pub fn sync_select(&mut self) {
        self.select = self
            .column_mappings
            .iter()
            .filter(|m| m.is_mapped())
            .map(|m| m.db_column.clone())
            .collect();
    }
}

// ============================================================================
// LOOKUPS
// ============================================================================

/// A formula cell located by position.
#[derive(Debug, Clone, Copy)]
pub struct FormulaCell<'a> {
    pub row_index: usize,
    pub cell_index: usize,
    pub row: &'a Row,
    pub cell: &'a Cell,
    pub expression: &'a str,
}

impl Template {
    pub fn new(template_id: impl Into<String>) -> Self {
        Template {
            template_meta: TemplateMeta {
                template_id: template_id.into(),
                ..TemplateMeta::default()
            },
            ..Template::default()
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.report_data.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.report_data.rows
    }

    pub fn row_ids(&self) -> impl Iterator<Item = &str> {
        self.report_data.rows.iter().map(|r| r.id.as_str())
    }

    pub fn column_ids(&self) -> impl Iterator<Item = &str> {
        self.report_data.columns.iter().map(|c| c.id.as_str())
    }

    pub fn row_index(&self, row_id: &str) -> Option<usize> {
        self.report_data.rows.iter().position(|r| r.id == row_id)
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.report_data.columns.iter().position(|c| c.id == column_id)
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.report_data.rows.iter().find(|r| r.id == row_id)
    }

    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut Row> {
        self.report_data.rows.iter_mut().find(|r| r.id == row_id)
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.report_data.columns.iter().find(|c| c.id == column_id)
    }

    /// For property edits (name, format, width). The id is changed only
    /// through `rename_column`, which also rewrites references.
    pub fn column_mut(&mut self, column_id: &str) -> Option<&mut Column> {
        self.report_data.columns.iter_mut().find(|c| c.id == column_id)
    }

    /// The cell at (row, column); None for dynamic rows and unknown ids.
    pub fn cell(&self, row_id: &str, column_id: &str) -> Option<&Cell> {
        let column_index = self.column_index(column_id)?;
        self.row(row_id)?.cells()?.get(column_index)
    }

    /// Every FORMULA cell of every static row, in document order.
    pub fn formula_cells(&self) -> impl Iterator<Item = FormulaCell<'_>> {
        self.report_data
            .rows
            .iter()
            .enumerate()
            .flat_map(|(row_index, row)| {
                row.cells()
                    .unwrap_or(&[])
                    .iter()
                    .enumerate()
                    .filter_map(move |(cell_index, cell)| {
                        cell.expression().map(|expression| FormulaCell {
                            row_index,
                            cell_index,
                            row,
                            cell,
                            expression,
                        })
                    })
            })
    }

    /// Table names read by DB cells, DB variables and dynamic rows.
    pub fn referenced_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = Vec::new();
        let mut push = |table: &str| {
            if !table.is_empty() && !tables.iter().any(|t| t == table) {
                tables.push(table.to_string());
            }
        };
        for row in &self.report_data.rows {
            if let Some(config) = row.dynamic_config() {
                push(&config.table);
            }
            for cell in row.cells().unwrap_or(&[]) {
                if let Some(source) = cell.db_source() {
                    push(&source.table);
                }
                for variable in cell.variables().into_iter().flat_map(|v| v.values()) {
                    if let crate::cell::FormulaVariable::Database(db) = variable {
                        push(&db.table);
                    }
                }
            }
        }
        tables
    }

    /// Reference scope including the variables declared by one formula.
    pub fn scope_with<'a>(&'a self, variables: &'a FormulaVariables) -> CellScope<'a> {
        CellScope {
            template: self,
            variables: Some(variables),
        }
    }
}

impl ReferenceScope for Template {
    fn has_row(&self, row_id: &str) -> bool {
        self.report_data.rows.iter().any(|r| r.id == row_id)
    }

    fn has_column(&self, column_id: &str) -> bool {
        self.report_data.columns.iter().any(|c| c.id == column_id)
    }
}

/// The template's ids plus one formula's declared variables.
#[derive(Debug, Clone, Copy)]
pub struct CellScope<'a> {
    template: &'a Template,
    variables: Option<&'a FormulaVariables>,
}

impl ReferenceScope for CellScope<'_> {
    fn has_row(&self, row_id: &str) -> bool {
        self.template.has_row(row_id)
    }

    fn has_column(&self, column_id: &str) -> bool {
        self.template.has_column(column_id)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.is_some_and(|v| v.contains_key(name))
    }
}
