//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for template engine integration tests.

#![allow(dead_code)]

use template_engine::{
    Cell, EditorConfig, EditorSession, RowType, Template, TemplateDocument,
};

/// Test harness wrapping an editing session.
pub struct TestHarness {
    pub session: EditorSession,
}

impl TestHarness {
    /// Create a new test harness with an empty template.
    pub fn new() -> Self {
        TestHarness {
            session: EditorSession::new(
                TemplateDocument::new(Template::new("TPL_TEST")),
                EditorConfig::default(),
            ),
        }
    }

    /// A small P&L style template:
    ///
    /// ```text
    ///          col_1      col_2                          col_3
    /// HDR      Account    Q1                             Q2
    /// R1       Revenue    100                            120
    /// R2       Costs      40                             50
    /// NET      Net        cell_R1_col_2 - cell_R2_col_2  cell_R1_col_3 - cell_R2_col_3
    /// LINES    (dynamic row)
    /// ```
    pub fn with_sample_template() -> Self {
        let mut harness = Self::new();
        harness.populate_sample_template();
        harness
    }

    fn populate_sample_template(&mut self) {
        let session = &mut self.session;
        session.add_column_with_id("col_1", "Account").unwrap();
        session.add_column_with_id("col_2", "Q1").unwrap();
        session.add_column_with_id("col_3", "Q2").unwrap();

        let rows = [
            ("HDR", RowType::Header, ["Account", "Q1", "Q2"]),
            ("R1", RowType::Data, ["Revenue", "100", "120"]),
            ("R2", RowType::Data, ["Costs", "40", "50"]),
        ];
        for (id, row_type, texts) in rows {
            session.add_row(row_type, Some(id), None).unwrap();
            for (column, text) in ["col_1", "col_2", "col_3"].iter().zip(texts) {
                session.set_cell(id, column, Cell::text(text)).unwrap();
            }
        }

        session.add_row(RowType::Footer, Some("NET"), None).unwrap();
        session.set_cell("NET", "col_1", Cell::text("Net")).unwrap();
        session
            .set_formula("NET", "col_2", "cell_R1_col_2 - cell_R2_col_2")
            .unwrap();
        session
            .set_formula("NET", "col_3", "cell_R1_col_3 - cell_R2_col_3")
            .unwrap();

        session.add_row(RowType::Dynamic, Some("LINES"), None).unwrap();
    }

    pub fn template(&self) -> &Template {
        self.session.template()
    }

    /// Expression stored at (row, column), if that cell is a formula.
    pub fn expression(&self, row_id: &str, column_id: &str) -> Option<String> {
        self.template()
            .cell(row_id, column_id)
            .and_then(|c| c.expression())
            .map(str::to_string)
    }

    /// Every formula expression in the template, in row-major order.
    pub fn all_expressions(&self) -> Vec<String> {
        self.template()
            .formula_cells()
            .map(|fc| fc.expression.to_string())
            .collect()
    }
}
