//! FILENAME: core/engine/src/validation.rs
//! PURPOSE: Whole-document checks run before save and on demand.
//! CONTEXT: Problems are reported, never thrown. Errors would make the
//! report runner fail or produce wrong output; warnings flag things that are
//! probably unfinished (a dynamic row with no mapped column, a formula using
//! an undeclared name).
//!
//! Variant checks are separate and opt-in: filter rules are not tied to the
//! template's structure by every producer of these documents.

use crate::catalog::TableCatalog;
use crate::cell::{DbAggregate, DbSource, FormulaVariable};
use crate::dependency_graph::DependencyGraph;
use crate::filter::{FilterOperator, FilterSet};
use crate::ids::{find_cell_id_collisions, validate_id_format, IdKind};
use crate::model::{Row, Template, TemplateDocument};
use crate::variant::{ScopeType, Variant};
use formula_parser::{check_syntax, undeclared_identifiers, validate_expression};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Where an issue was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueLocation {
    Template,
    Column(String),
    Row(String),
    Cell { row_id: String, column_id: String },
    Variant(String),
}

impl fmt::Display for IssueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueLocation::Template => write!(f, "Template"),
            IssueLocation::Column(id) => write!(f, "Column {}", id),
            IssueLocation::Row(id) => write!(f, "Row {}", id),
            IssueLocation::Cell { row_id, column_id } => {
                write!(f, "Row {}, Column {}", row_id, column_id)
            }
            IssueLocation::Variant(code) => write!(f, "Variant {}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateIssue {
    pub severity: Severity,
    pub location: IssueLocation,
    pub message: String,
}

impl TemplateIssue {
    pub fn error(location: IssueLocation, message: impl Into<String>) -> Self {
        TemplateIssue {
            severity: Severity::Error,
            location,
            message: message.into(),
        }
    }

    pub fn warning(location: IssueLocation, message: impl Into<String>) -> Self {
        TemplateIssue {
            severity: Severity::Warning,
            location,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for TemplateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.location, self.message)
    }
}

pub fn has_errors(issues: &[TemplateIssue]) -> bool {
    issues.iter().any(TemplateIssue::is_error)
}

// ============================================================================
// TEMPLATE
// ============================================================================

/// Checks ids, derived cell ids, cell alignment, dynamic rows, formulas, DB
/// sources and formula cycles. With a catalog, tables and columns are checked against it.
pub fn validate_template(template: &Template, catalog: Option<&TableCatalog>) -> Vec<TemplateIssue> {
    let mut issues = Vec::new();

    check_ids(
        IdKind::Column,
        template.column_ids(),
        IssueLocation::Column,
        &mut issues,
    );
    check_ids(IdKind::Row, template.row_ids(), IssueLocation::Row, &mut issues);
    for collision in find_cell_id_collisions(template.row_ids(), template.column_ids()) {
        issues.push(TemplateIssue::error(
            IssueLocation::Template,
            format!(
                "Cell ID {} is shared by row {} column {} and row {} column {}",
                collision.cell_id,
                collision.first.0,
                collision.first.1,
                collision.second.0,
                collision.second.1
            ),
        ));
    }

    for row in template.rows() {
        match row.cells() {
            Some(cells) => {
                if cells.len() != template.columns().len() {
                    issues.push(TemplateIssue::error(
                        IssueLocation::Row(row.id.clone()),
                        format!(
                            "Row has {} cells but the template has {} columns",
                            cells.len(),
                            template.columns().len()
                        ),
                    ));
                }
                check_cells(template, row, catalog, &mut issues);
            }
            None => check_dynamic_row(template, row, catalog, &mut issues),
        }
    }

    if let Err(cycle) = DependencyGraph::from_template(template).evaluation_order() {
        issues.push(TemplateIssue::error(IssueLocation::Template, cycle.to_string()));
    }

    issues
}

fn check_ids<'a, I, L>(kind: IdKind, ids: I, location: L, issues: &mut Vec<TemplateIssue>)
where
    I: Iterator<Item = &'a str>,
    L: Fn(String) -> IssueLocation,
{
    let mut seen = HashSet::new();
    for id in ids {
        if let Err(err) = validate_id_format(kind, id) {
            issues.push(TemplateIssue::error(location(id.to_string()), err.to_string()));
        }
        if !seen.insert(id) {
            issues.push(TemplateIssue::error(
                location(id.to_string()),
                format!("Duplicate {} ID {}", kind, id),
            ));
        }
    }
}

fn check_cells(template: &Template, row: &Row, catalog: Option<&TableCatalog>, issues: &mut Vec<TemplateIssue>) {
    for (cell_index, cell) in row.cells().unwrap_or(&[]).iter().enumerate() {
        let column_id = template
            .columns()
            .get(cell_index)
            .map(|c| c.id.clone())
            .unwrap_or_else(|| format!("#{}", cell_index + 1));
        let location = || IssueLocation::Cell {
            row_id: row.id.clone(),
            column_id: column_id.clone(),
        };

        if let (Some(expression), Some(variables)) = (cell.expression(), cell.variables()) {
            let scope = template.scope_with(variables);
            let errors = validate_expression(expression, &scope);
            for error in &errors {
                issues.push(TemplateIssue::error(location(), error.to_string()));
            }
            if errors.is_empty() {
                if let Some(error) = check_syntax(expression) {
                    issues.push(TemplateIssue::error(location(), error.to_string()));
                }
            }
            for name in undeclared_identifiers(expression, &scope) {
                issues.push(TemplateIssue::warning(
                    location(),
                    format!("Variable {} is not declared", name),
                ));
            }
            for (name, variable) in variables {
                if let FormulaVariable::Database(db) = variable {
                    let aggregate = DbAggregate::ALL
                        .into_iter()
                        .find(|agg| agg.cell_type() == db.kind);
                    match aggregate {
                        Some(aggregate) => {
                            let source = DbSource {
                                table: db.table.clone(),
                                column: db.column.clone(),
                                filters: db.filters.clone(),
                            };
                            check_db_source(&source, aggregate, catalog, location(), issues);
                        }
                        None => issues.push(TemplateIssue::error(
                            location(),
                            format!("Variable {} has unknown type {}", name, db.kind),
                        )),
                    }
                }
            }
        }

        if let (Some(source), Some(aggregate)) = (cell.db_source(), cell.aggregate()) {
            check_db_source(source, aggregate, catalog, location(), issues);
        }
    }
}

fn check_db_source(
    source: &DbSource,
    aggregate: DbAggregate,
    catalog: Option<&TableCatalog>,
    location: IssueLocation,
    issues: &mut Vec<TemplateIssue>,
) {
    if source.table.is_empty() || source.column.is_empty() {
        issues.push(TemplateIssue::warning(
            location,
            format!("{} has no table or column selected", aggregate.cell_type()),
        ));
        return;
    }
    let Some(catalog) = catalog else {
        return;
    };
    let Some(table) = catalog.table(&source.table) else {
        issues.push(TemplateIssue::error(
            location,
            format!("Table {} is not an allowed table", source.table),
        ));
        return;
    };
    if table.column(&source.column).is_none() {
        issues.push(TemplateIssue::error(
            location,
            format!("Column {} does not exist in table {}", source.column, source.table),
        ));
        return;
    }
    if !catalog.is_aggregate_allowed(&source.table, &source.column, aggregate) {
        issues.push(TemplateIssue::error(
            location.clone(),
            format!(
                "{} is not allowed for {}.{}",
                aggregate.cell_type(),
                source.table,
                source.column
            ),
        ));
    }
    check_filter_columns(&source.filters, &source.table, catalog, location, issues);
}

fn check_filter_columns(
    filters: &FilterSet,
    table: &str,
    catalog: &TableCatalog,
    location: IssueLocation,
    issues: &mut Vec<TemplateIssue>,
) {
    let filterable = catalog.filterable_columns(table);
    for column in filters.columns() {
        if !filterable.iter().any(|c| c.column_name == column) {
            issues.push(TemplateIssue::error(
                location.clone(),
                format!("Column {} of table {} cannot be filtered", column, table),
            ));
        }
    }
}

fn check_dynamic_row(template: &Template, row: &Row, catalog: Option<&TableCatalog>, issues: &mut Vec<TemplateIssue>) {
    let Some(config) = row.dynamic_config() else {
        return;
    };
    let location = || IssueLocation::Row(row.id.clone());

    for column in template.columns() {
        if config.mapping(&column.id).is_none() {
            issues.push(TemplateIssue::error(
                location(),
                format!("Dynamic row has no mapping for column {}", column.id),
            ));
        }
    }
    for mapping in &config.column_mappings {
        if template.column(&mapping.template_column_id).is_none() {
            issues.push(TemplateIssue::warning(
                location(),
                format!(
                    "Mapping refers to unknown column {}",
                    mapping.template_column_id
                ),
            ));
        }
    }

    if config.table.is_empty() {
        issues.push(TemplateIssue::warning(location(), "Dynamic row has no table selected"));
        return;
    }
    if config.mapped_count() == 0 && !template.columns().is_empty() {
        issues.push(TemplateIssue::warning(
            location(),
            "Dynamic row does not map any column",
        ));
    }

    let Some(catalog) = catalog else {
        return;
    };
    if !catalog.has_table(&config.table) {
        issues.push(TemplateIssue::error(
            location(),
            format!("Table {} is not an allowed table", config.table),
        ));
        return;
    }
    let selectable = catalog.selectable_columns(&config.table);
    for mapping in config.column_mappings.iter().filter(|m| m.is_mapped()) {
        if !selectable.iter().any(|c| c.column_name == mapping.db_column) {
            issues.push(TemplateIssue::error(
                location(),
                format!(
                    "Column {} of table {} cannot be selected",
                    mapping.db_column, config.table
                ),
            ));
        }
    }
    check_filter_columns(&config.filters, &config.table, catalog, location(), issues);
}

// ============================================================================
// VARIANTS
// ============================================================================

/// Referential checks for variants: codes, params and filter-rule scopes.
/// TABLE scopes are checked against the catalog when given, otherwise
/// against the tables the template reads.
pub fn validate_variants(document: &TemplateDocument, catalog: Option<&TableCatalog>) -> Vec<TemplateIssue> {
    let mut issues = Vec::new();
    let mut codes = HashSet::new();

    let known_tables: Vec<String> = match catalog {
        Some(catalog) => catalog.tables.iter().map(|t| t.table_name.clone()).collect(),
        None => document.template.referenced_tables(),
    };

    for (index, variant) in document.variants.iter().enumerate() {
        let label = if variant.variant_code.is_empty() {
            format!("#{}", index + 1)
        } else {
            variant.variant_code.clone()
        };
        let location = || IssueLocation::Variant(label.clone());

        if variant.variant_code.trim().is_empty() {
            issues.push(TemplateIssue::error(location(), "Variant code is required"));
        } else if !codes.insert(variant.variant_code.as_str()) {
            issues.push(TemplateIssue::error(
                location(),
                format!("Duplicate variant code {}", variant.variant_code),
            ));
        }
        if variant.variant_name.trim().is_empty() {
            issues.push(TemplateIssue::error(location(), "Variant name is required"));
        }

        check_params(variant, &location, &mut issues);
        check_filter_rules(document, variant, &known_tables, &location, &mut issues);
    }

    issues
}

fn check_params<L>(variant: &Variant, location: &L, issues: &mut Vec<TemplateIssue>)
where
    L: Fn() -> IssueLocation,
{
    let mut names = HashSet::new();
    for param in &variant.params {
        if param.param_name.trim().is_empty() {
            issues.push(TemplateIssue::error(location(), "Parameter name is required"));
        } else if !names.insert(param.param_name.as_str()) {
            issues.push(TemplateIssue::error(
                location(),
                format!("Duplicate parameter {}", param.param_name),
            ));
        }
    }
}

fn check_filter_rules<L>(
    document: &TemplateDocument,
    variant: &Variant,
    known_tables: &[String],
    location: &L,
    issues: &mut Vec<TemplateIssue>,
) where
    L: Fn() -> IssueLocation,
{
    for (index, rule) in variant.filter_rules.iter().enumerate() {
        let rule_no = index + 1;

        if variant.param(&rule.param_name).is_none() {
            issues.push(TemplateIssue::error(
                location(),
                format!(
                    "Filter rule {} uses unknown parameter {}",
                    rule_no, rule.param_name
                ),
            ));
        }
        if rule.db_column.trim().is_empty() {
            issues.push(TemplateIssue::error(
                location(),
                format!("Filter rule {} has no db column", rule_no),
            ));
        }
        if FilterOperator::parse(&rule.operator).is_none() {
            issues.push(TemplateIssue::error(
                location(),
                format!(
                    "Filter rule {} has unknown operator {}",
                    rule_no, rule.operator
                ),
            ));
        }

        match (rule.scope_type, rule.scope_value()) {
            (ScopeType::AllDb, _) => {}
            (scope, None) => issues.push(TemplateIssue::error(
                location(),
                format!("Filter rule {} with {} scope needs a scope value", rule_no, scope),
            )),
            (ScopeType::Table, Some(table)) => {
                if !known_tables.iter().any(|t| t == table) {
                    issues.push(TemplateIssue::error(
                        location(),
                        format!("Filter rule {} scopes unknown table {}", rule_no, table),
                    ));
                }
            }
            (ScopeType::DynamicTable, Some(row_id)) => {
                let is_dynamic = document
                    .template
                    .row(row_id)
                    .is_some_and(Row::is_dynamic);
                if !is_dynamic {
                    issues.push(TemplateIssue::error(
                        location(),
                        format!(
                            "Filter rule {} scopes unknown dynamic row {}",
                            rule_no, row_id
                        ),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, DbSource};
    use crate::model::{Column, RowType};
    use crate::variant::{FilterRule, Param, ParamType};

    fn template() -> Template {
        let mut template = Template::new("T1");
        template.add_column(Column::new("C1", "Label")).unwrap();
        template.add_column(Column::new("C2", "Amount")).unwrap();
        let columns = template.report_data.columns.clone();
        template.add_row(Row::new("R1", RowType::Data, &columns, 100), None).unwrap();
        template.add_row(Row::new("R2", RowType::Footer, &columns, 100), None).unwrap();
        template.add_row(Row::new("D1", RowType::Dynamic, &columns, 100), None).unwrap();
        template
    }

    #[test]
    fn test_reports_formula_errors_per_cell() {
        let mut template = template();
        template.set_cell("R2", "C2", Cell::formula("cell_R9_C2 +")).unwrap();
        let issues = validate_template(&template, None);
        let messages: Vec<String> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.to_string())
            .collect();
        assert!(messages.contains(&"[ERROR] Row R2, Column C2: Expression cannot end with an operator".to_string()));
        assert!(messages.contains(&"[ERROR] Row R2, Column C2: Row R9 does not exist".to_string()));
    }

    #[test]
    fn test_syntax_checked_after_clean_validation() {
        let mut template = template();
        template
            .set_cell("R2", "C2", Cell::formula("cell_R1_C2 cell_R1_C1"))
            .unwrap();
        let issues = validate_template(&template, None);
        assert!(issues.iter().any(|i| i.message.starts_with("Syntax error")));
    }

    #[test]
    fn test_undeclared_variable_is_a_warning() {
        let mut template = template();
        template.set_cell("R2", "C2", Cell::formula("cell_R1_C2 * rate")).unwrap();
        let issues = validate_template(&template, None);
        let warning = issues.iter().find(|i| i.message.contains("rate")).unwrap();
        assert_eq!(warning.severity, Severity::Warning);
    }

    #[test]
    fn test_cell_count_mismatch() {
        let mut template = template();
        template.row_mut("R1").unwrap().cells_mut().unwrap().pop();
        let issues = validate_template(&template, None);
        assert!(issues.iter().any(|i| {
            i.location == IssueLocation::Row("R1".to_string()) && i.message.contains("1 cells")
        }));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut template = template();
        template.set_cell("R1", "C1", Cell::formula("cell_R2_C1")).unwrap();
        template.set_cell("R2", "C1", Cell::formula("cell_R1_C1")).unwrap();
        let issues = validate_template(&template, None);
        assert!(issues
            .iter()
            .any(|i| i.location == IssueLocation::Template && i.message.contains("Circular")));
    }

    #[test]
    fn test_catalog_restricts_aggregates() {
        let catalog: TableCatalog = serde_json::from_value(serde_json::json!([
            {"tableId": 1, "tableName": "GL_BALANCE", "label": "GL", "columns": [
                {"columnId": 1, "columnName": "BRANCH_CODE", "label": "Branch", "dataType": null,
                 "selectable": "Y", "filterable": "Y", "aggFuncs": "COUNT"}
            ]}
        ]))
        .unwrap();
        let mut template = template();
        template
            .set_cell("R1", "C2", Cell::db(DbAggregate::Sum, DbSource::new("GL_BALANCE", "BRANCH_CODE")))
            .unwrap();
        template
            .set_cell("R2", "C2", Cell::db(DbAggregate::Count, DbSource::new("GL_BALANCE", "BRANCH_CODE")))
            .unwrap();

        let issues = validate_template(&template, Some(&catalog));
        let errors: Vec<&TemplateIssue> = issues.iter().filter(|i| i.is_error()).collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "DB_SUM is not allowed for GL_BALANCE.BRANCH_CODE");
    }

    #[test]
    fn test_dynamic_row_warnings() {
        let template = template();
        let issues = validate_template(&template, None);
        assert!(issues.iter().any(|i| {
            i.location == IssueLocation::Row("D1".to_string()) && i.message.contains("no table")
        }));
        assert!(!has_errors(&issues));
    }

    #[test]
    fn test_variant_rules_checked_against_template() {
        let mut document = TemplateDocument::new(template());
        let mut variant = Variant::new("branch", "By branch");
        variant.params.push(Param::new("branch", ParamType::String));
        variant.filter_rules.push(FilterRule {
            scope_type: ScopeType::DynamicTable,
            scope_value: Some("D1".to_string()),
            param_name: "branch".to_string(),
            db_column: "BRANCH_CODE".to_string(),
            operator: "=".to_string(),
        });
        variant.filter_rules.push(FilterRule {
            scope_type: ScopeType::DynamicTable,
            scope_value: Some("R1".to_string()),
            param_name: "missing".to_string(),
            db_column: "BRANCH_CODE".to_string(),
            operator: "=".to_string(),
        });
        variant.filter_rules.push(FilterRule {
            scope_type: ScopeType::Table,
            scope_value: None,
            param_name: "branch".to_string(),
            db_column: "BRANCH_CODE".to_string(),
            operator: "=".to_string(),
        });
        document.variants.push(variant.clone());
        document.variants.push(variant);

        let messages: Vec<String> = validate_variants(&document, None)
            .into_iter()
            .map(|i| i.message)
            .collect();
        assert!(messages.contains(&"Duplicate variant code BRANCH".to_string()));
        assert!(messages.contains(&"Filter rule 2 uses unknown parameter missing".to_string()));
        assert!(messages.contains(&"Filter rule 2 scopes unknown dynamic row R1".to_string()));
        assert!(messages.contains(&"Filter rule 3 with TABLE scope needs a scope value".to_string()));
        assert!(!messages.iter().any(|m| m.starts_with("Filter rule 1 ")));
    }
}
