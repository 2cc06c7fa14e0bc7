//! FILENAME: tests/test_validation.rs
//! Integration tests for template and variant validation.

mod common;

use common::TestHarness;
use template_engine::{
    has_errors, Cell, DbAggregate, DbSource, EditorConfig, EditorSession, IssueLocation,
    Severity, TableCatalog, Variant,
};

fn catalog() -> TableCatalog {
    serde_json::from_str(
        r#"[
            {
                "tableId": 1,
                "tableName": "GL_BALANCE",
                "label": "GL balances",
                "columns": [
                    {"columnId": 1, "columnName": "ACCOUNT_NAME", "selectable": "Y", "filterable": "N", "aggFuncs": ""},
                    {"columnId": 2, "columnName": "AMOUNT", "selectable": "Y", "filterable": "Y", "aggFuncs": "SUM,AVG"},
                    {"columnId": 3, "columnName": "BRANCH_CODE", "selectable": "N", "filterable": "Y", "aggFuncs": "COUNT"}
                ]
            }
        ]"#,
    )
    .unwrap()
}

#[test]
fn test_sample_template_has_only_warnings() {
    let harness = TestHarness::with_sample_template();
    let issues = harness.session.validate();
    assert!(!has_errors(&issues), "{:?}", issues);
    assert!(issues.iter().any(|i| {
        i.severity == Severity::Warning
            && i.location == IssueLocation::Row("LINES".to_string())
            && i.message == "Dynamic row has no table selected"
    }));
}

#[test]
fn test_circular_formulas_reported() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.set_formula("NET", "col_2", "cell_NET_col_3 + 1").unwrap();
    harness.session.set_formula("NET", "col_3", "cell_NET_col_2 * 2").unwrap();

    let issues = harness.session.validate();
    let cycle = issues
        .iter()
        .find(|i| i.location == IssueLocation::Template)
        .expect("cycle issue");
    assert!(cycle.is_error());
    assert!(cycle.message.starts_with("Circular reference detected"));
}

#[test]
fn test_db_cells_checked_against_catalog() {
    let mut harness = TestHarness::with_sample_template();
    harness
        .session
        .set_cell("R1", "col_2", Cell::db(DbAggregate::Sum, DbSource::new("GL_BALANCE", "AMOUNT")))
        .unwrap();
    harness
        .session
        .set_cell("R2", "col_2", Cell::db(DbAggregate::Sum, DbSource::new("GL_BALANCE", "BRANCH_CODE")))
        .unwrap();

    // Without a catalog nothing is known about aggregates.
    assert!(!has_errors(&harness.session.validate()));

    harness.session.set_catalog(Some(catalog()));
    let errors: Vec<_> = harness
        .session
        .validate()
        .into_iter()
        .filter(|i| i.is_error())
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].location,
        IssueLocation::Cell {
            row_id: "R2".to_string(),
            column_id: "col_2".to_string()
        }
    );
    assert_eq!(errors[0].message, "DB_SUM is not allowed for GL_BALANCE.BRANCH_CODE");
}

#[test]
fn test_dynamic_row_selects_only_selectable_columns() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.set_catalog(Some(catalog()));
    harness.session.set_dynamic_table("LINES", "GL_BALANCE").unwrap();
    harness
        .session
        .set_dynamic_mapping("LINES", "col_1", "BRANCH_CODE")
        .unwrap();

    let issues = harness.session.validate();
    assert!(issues.iter().any(|i| {
        i.is_error() && i.message == "Column BRANCH_CODE of table GL_BALANCE cannot be selected"
    }));

    harness
        .session
        .set_dynamic_mapping("LINES", "col_1", "ACCOUNT_NAME")
        .unwrap();
    assert!(!has_errors(&harness.session.validate()));
}

#[test]
fn test_variant_checks_are_opt_in() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.add_variant(Variant::new("v1", "")).unwrap();
    assert!(!has_errors(&harness.session.validate()));

    let config = EditorConfig {
        validate_variant_references: true,
        ..EditorConfig::default()
    };
    let session = EditorSession::new(harness.session.document().clone(), config);
    let issues = session.validate();
    assert!(issues.iter().any(|i| {
        i.location == IssueLocation::Variant("V1".to_string()) && i.message == "Variant name is required"
    }));
}
