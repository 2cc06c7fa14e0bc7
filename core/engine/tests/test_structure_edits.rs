//! FILENAME: tests/test_structure_edits.rs
//! Integration tests for adding, moving and renaming rows and columns.

mod common;

use common::TestHarness;
use serde_json::json;
use template_engine::{
    Cell, ColumnFormat, MoveDirection, RowType, ScopeType, SessionError, StructureError, Variant,
};

// ============================================================================
// COLUMNS
// ============================================================================

#[test]
fn test_add_column_grows_cells_and_mappings() {
    let mut harness = TestHarness::with_sample_template();
    let id = harness.session.add_column(Some("Q3")).unwrap();
    assert_eq!(id, "col_4");

    let template = harness.template();
    assert_eq!(template.columns().len(), 4);
    for row in template.rows() {
        if let Some(cells) = row.cells() {
            assert_eq!(cells.len(), 4);
            assert_eq!(cells[3], Cell::default());
        } else {
            let config = row.dynamic_config().unwrap();
            assert_eq!(config.column_mappings.len(), 4);
            assert_eq!(config.column_mappings[3].template_column_id, "col_4");
            assert!(!config.column_mappings[3].is_mapped());
        }
    }
}

#[test]
fn test_move_column_keeps_cells_with_column() {
    let mut harness = TestHarness::with_sample_template();
    assert!(harness.session.move_column("col_3", MoveDirection::Up).unwrap());

    let ids: Vec<&str> = harness.template().column_ids().collect();
    assert_eq!(ids, vec!["col_1", "col_3", "col_2"]);
    assert_eq!(
        harness.template().cell("R1", "col_3").unwrap(),
        &Cell::text("120")
    );
    assert_eq!(
        harness.expression("NET", "col_2").as_deref(),
        Some("cell_R1_col_2 - cell_R2_col_2")
    );
}

#[test]
fn test_rename_column_rewrites_formulas() {
    let mut harness = TestHarness::with_sample_template();
    let rewritten = harness.session.rename_column("col_2", "Q1_AMT").unwrap();
    assert_eq!(rewritten, 1);
    assert_eq!(
        harness.expression("NET", "Q1_AMT").as_deref(),
        Some("cell_R1_Q1_AMT - cell_R2_Q1_AMT")
    );

    let mappings = &harness.template().row("LINES").unwrap().dynamic_config().unwrap().column_mappings;
    assert!(mappings.iter().any(|m| m.template_column_id == "Q1_AMT"));
}

#[test]
fn test_column_properties_are_undoable() {
    let mut harness = TestHarness::with_sample_template();
    let mut format = ColumnFormat::default();
    format.kind = "CURRENCY".to_string();
    format.extra.insert("currencySymbol".to_string(), json!("EUR"));
    format.extra.insert("decimals".to_string(), json!(2));
    format.extra.insert("outputFormat".to_string(), json!("#,##0.00"));

    harness.session.set_column_name("col_2", "Q1 revenue").unwrap();
    harness.session.set_column_format("col_2", format.clone()).unwrap();
    harness.session.set_column_width("col_2", Some(140.0)).unwrap();

    let column = harness.template().column("col_2").unwrap();
    assert_eq!(column.name, "Q1 revenue");
    assert_eq!(column.format, format);
    assert_eq!(column.width, Some(140.0));
    assert_eq!(
        serde_json::to_value(&column.format).unwrap(),
        json!({"type": "CURRENCY", "currencySymbol": "EUR", "decimals": 2, "outputFormat": "#,##0.00"})
    );

    assert_eq!(harness.session.undo().unwrap(), "Resize column col_2");
    assert_eq!(harness.template().column("col_2").unwrap().width, None);
    harness.session.undo().unwrap();
    assert_eq!(harness.template().column("col_2").unwrap().format, ColumnFormat::default());
    harness.session.undo().unwrap();
    assert_eq!(harness.template().column("col_2").unwrap().name, "Q1");
}

#[test]
fn test_column_property_edit_on_unknown_column_fails() {
    let mut harness = TestHarness::with_sample_template();
    let before = harness.session.document().clone();
    let err = harness.session.set_column_width("col_9", Some(80.0)).unwrap_err();
    assert_eq!(
        err,
        SessionError::Structure(StructureError::UnknownColumn("col_9".to_string()))
    );
    assert_eq!(harness.session.document(), &before);
}

// ============================================================================
// ROWS
// ============================================================================

#[test]
fn test_insert_row_after_index() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.add_row(RowType::Separator, Some("SEP"), Some(0)).unwrap();
    let ids: Vec<&str> = harness.template().row_ids().collect();
    assert_eq!(ids, vec!["HDR", "SEP", "R1", "R2", "NET", "LINES"]);
}

#[test]
fn test_move_row_at_edge_is_noop() {
    let mut harness = TestHarness::with_sample_template();
    assert!(!harness.session.move_row("HDR", MoveDirection::Up).unwrap());
    assert!(!harness.session.move_row("LINES", MoveDirection::Down).unwrap());
    assert!(harness.session.move_row("R2", MoveDirection::Up).unwrap());

    let ids: Vec<&str> = harness.template().row_ids().collect();
    assert_eq!(ids, vec!["HDR", "R2", "R1", "NET", "LINES"]);
    // References follow ids, not positions.
    assert_eq!(
        harness.expression("NET", "col_2").as_deref(),
        Some("cell_R1_col_2 - cell_R2_col_2")
    );
}

#[test]
fn test_rename_row_rewrites_formulas_and_scopes() {
    let mut harness = TestHarness::with_sample_template();
    let mut variant = Variant::new("by branch", "By branch");
    variant.filter_rules.push(template_engine::FilterRule {
        scope_type: ScopeType::DynamicTable,
        scope_value: Some("LINES".to_string()),
        param_name: "branch".to_string(),
        db_column: "BRANCH_CODE".to_string(),
        operator: "=".to_string(),
    });
    harness.session.add_variant(variant).unwrap();

    harness.session.rename_row("R1", "REVENUE").unwrap();
    harness.session.rename_row("LINES", "DETAIL").unwrap();

    assert_eq!(
        harness.expression("NET", "col_3").as_deref(),
        Some("cell_REVENUE_col_3 - cell_R2_col_3")
    );
    let rule = &harness.session.document().variants[0].filter_rules[0];
    assert_eq!(rule.scope_value.as_deref(), Some("DETAIL"));
}

#[test]
fn test_rename_row_to_existing_id_fails() {
    let mut harness = TestHarness::with_sample_template();
    let err = harness.session.rename_row("R1", "R2").unwrap_err();
    assert!(matches!(err, SessionError::Structure(StructureError::Id(_))));
    assert!(harness.template().row("R1").is_some());
}

#[test]
fn test_set_cell_on_dynamic_row_fails() {
    let mut harness = TestHarness::with_sample_template();
    let err = harness
        .session
        .set_cell("LINES", "col_1", Cell::text("x"))
        .unwrap_err();
    assert_eq!(
        err,
        SessionError::Structure(StructureError::DynamicRow("LINES".to_string()))
    );
}

#[test]
fn test_dynamic_mapping_updates_select() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.set_dynamic_table("LINES", "GL_BALANCE").unwrap();
    harness
        .session
        .set_dynamic_mapping("LINES", "col_1", "ACCOUNT_NAME")
        .unwrap();
    harness
        .session
        .set_dynamic_mapping("LINES", "col_2", "AMOUNT")
        .unwrap();

    let config = harness.template().row("LINES").unwrap().dynamic_config().unwrap();
    assert_eq!(config.table, "GL_BALANCE");
    assert_eq!(config.mapped_count(), 2);
    assert_eq!(config.select, vec!["ACCOUNT_NAME".to_string(), "AMOUNT".to_string()]);
}
