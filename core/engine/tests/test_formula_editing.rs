//! FILENAME: tests/test_formula_editing.rs
//! Integration tests for formula edits and click-to-pick references.

mod common;

use common::TestHarness;
use std::thread;
use template_engine::{Cell, SessionError, ValidationError};

#[test]
fn test_set_formula_reports_missing_ids() {
    let mut harness = TestHarness::with_sample_template();
    let errors = harness
        .session
        .set_formula("R2", "col_3", "cell_R9_col_2 + cell_R1_col_9")
        .unwrap();
    assert_eq!(
        errors,
        vec![
            ValidationError::MissingRow("R9".to_string()),
            ValidationError::MissingColumn("col_9".to_string()),
        ]
    );
    assert_eq!(errors[0].to_string(), "Row R9 does not exist");
}

#[test]
fn test_set_formula_keeps_render() {
    let mut harness = TestHarness::with_sample_template();
    let mut cell = Cell::text("Total");
    cell.render.bold = Some(true);
    harness.session.set_cell("R2", "col_1", cell).unwrap();

    harness.session.set_formula("R2", "col_1", "cell_R1_col_2").unwrap();
    let cell = harness.template().cell("R2", "col_1").unwrap();
    assert!(cell.is_formula());
    assert_eq!(cell.render.bold, Some(true));
}

#[test]
fn test_picked_cells_append_to_formula() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.set_formula("R2", "col_3", "1 +").unwrap();

    let sender = harness.session.pick_sender();
    assert!(!sender.pick("R1", "col_2"));

    harness.session.start_cell_pick();
    let worker = thread::spawn(move || {
        assert!(sender.pick("R1", "col_2"));
        assert!(sender.pick("R1", "col_3"));
    });
    worker.join().unwrap();

    let errors = harness.session.commit_picked_references("R2", "col_3").unwrap();
    assert!(errors.is_empty());
    assert_eq!(
        harness.expression("R2", "col_3").as_deref(),
        Some("1 + cell_R1_col_2 cell_R1_col_3")
    );
    harness.session.stop_cell_pick();
    assert!(!harness.session.is_picking());
}

#[test]
fn test_picking_into_text_cell_fails() {
    let mut harness = TestHarness::with_sample_template();
    harness.session.start_cell_pick();
    harness.session.pick_sender().pick("R1", "col_2");

    let err = harness
        .session
        .commit_picked_references("R2", "col_1")
        .unwrap_err();
    assert_eq!(err, SessionError::NotAFormula("cell_R2_col_1".to_string()));
    assert_eq!(harness.template().cell("R2", "col_1").unwrap(), &Cell::text("Costs"));

    // The pick is still queued and lands in the next formula cell.
    harness.session.commit_picked_references("NET", "col_2").unwrap();
    assert_eq!(
        harness.expression("NET", "col_2").as_deref(),
        Some("cell_R1_col_2 - cell_R2_col_2 cell_R1_col_2")
    );
}
