//! FILENAME: core/engine/src/reference_index.rs
//! PURPOSE: Answers "which formula cells reference row X / column Y".
//! CONTEXT: Used by the deletion guard to warn before a destructive edit and
//! by renames to rewrite references. Every reference token is resolved
//! against the live ids (see `formula_parser::resolve`), so an id is matched
//! as a whole: `R1` never matches inside `R10` or `R1_x`.
//!
//! Only FORMULA cells of static rows are scanned. Dynamic rows have no cells.

use crate::model::Template;
use formula_parser::{cell_id, resolve, scan_cell_references, ReferenceScope};
use rustc_hash::FxHashMap;
use std::fmt;

/// What kind of structural entity a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Row,
    Column,
}

/// Position of a formula cell, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReferenceLocation {
    pub row_index: usize,
    pub cell_index: usize,
}

impl ReferenceLocation {
    pub fn new(row_index: usize, cell_index: usize) -> Self {
        ReferenceLocation {
            row_index,
            cell_index,
        }
    }
}

/// 1-indexed for display: `Row 2, Cell 3`.
impl fmt::Display for ReferenceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}, Cell {}", self.row_index + 1, self.cell_index + 1)
    }
}

/// True when `expression` holds a reference whose row (or column) is `id`.
pub fn expression_references<S: ReferenceScope + ?Sized>(
    expression: &str,
    scope: &S,
    kind: TargetKind,
    id: &str,
) -> bool {
    scan_cell_references(expression).iter().any(|span| {
        let resolution = resolve(&span.key, scope);
        let part = match kind {
            TargetKind::Row => resolution.row(),
            TargetKind::Column => resolution.column(),
        };
        part == Some(id)
    })
}

/// Formula cells whose expression references `id`, one location per cell,
/// in document order.
pub fn find_references(template: &Template, kind: TargetKind, id: &str) -> Vec<ReferenceLocation> {
    template
        .formula_cells()
        .filter(|fc| expression_references(fc.expression, template, kind, id))
        .map(|fc| ReferenceLocation::new(fc.row_index, fc.cell_index))
        .collect()
}

/// Replaces each reference token for which `replace(row, column)` returns
/// Some. Tokens are resolved against `scope`. Returns None when nothing
/// was replaced.
pub(crate) fn rewrite_references<S, F>(expression: &str, scope: &S, mut replace: F) -> Option<String>
where
    S: ReferenceScope + ?Sized,
    F: FnMut(&str, &str) -> Option<String>,
{
    let mut output = String::with_capacity(expression.len());
    let mut cursor = 0;
    let mut changed = false;

    for span in scan_cell_references(expression) {
        let resolution = resolve(&span.key, scope);
        let (Some(row), Some(column)) = (resolution.row(), resolution.column()) else {
            continue;
        };
        if let Some(replacement) = replace(row, column) {
            output.push_str(&expression[cursor..span.start]);
            output.push_str(&replacement);
            cursor = span.end;
            changed = true;
        }
    }

    if !changed {
        return None;
    }
    output.push_str(&expression[cursor..]);
    Some(output)
}

/// Rewrites references to row `old` (or column `old`) so they name `new`.
pub(crate) fn rename_in_expression<S: ReferenceScope + ?Sized>(
    expression: &str,
    scope: &S,
    kind: TargetKind,
    old: &str,
    new: &str,
) -> Option<String> {
    rewrite_references(expression, scope, |row, column| match kind {
        TargetKind::Row if row == old => Some(cell_id(new, column)),
        TargetKind::Column if column == old => Some(cell_id(row, new)),
        _ => None,
    })
}

/// Precomputed reverse map from row and column ids to referencing cells.
/// A snapshot: rebuild after the template changes.
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    by_row: FxHashMap<String, Vec<ReferenceLocation>>,
    by_column: FxHashMap<String, Vec<ReferenceLocation>>,
}

impl ReferenceIndex {
    pub fn build(template: &Template) -> Self {
        let mut index = ReferenceIndex::default();

        for fc in template.formula_cells() {
            let location = ReferenceLocation::new(fc.row_index, fc.cell_index);
            for span in scan_cell_references(fc.expression) {
                let resolution = resolve(&span.key, template);
                if let Some(row) = resolution.row() {
                    push_unique(index.by_row.entry(row.to_string()).or_default(), location);
                }
                if let Some(column) = resolution.column() {
                    push_unique(index.by_column.entry(column.to_string()).or_default(), location);
                }
            }
        }

        index
    }

    pub fn references_to(&self, kind: TargetKind, id: &str) -> &[ReferenceLocation] {
        let map = match kind {
            TargetKind::Row => &self.by_row,
            TargetKind::Column => &self.by_column,
        };
        map.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_referenced(&self, kind: TargetKind, id: &str) -> bool {
        !self.references_to(kind, id).is_empty()
    }
}

// Locations arrive in document order, so a duplicate can only be the last one.
fn push_unique(locations: &mut Vec<ReferenceLocation>, location: ReferenceLocation) {
    if locations.last() != Some(&location) {
        locations.push(location);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::model::{Column, Row, RowType};
    use formula_parser::IdScope;

    fn template() -> Template {
        let mut template = Template::new("T1");
        template.report_data.columns = vec![Column::new("C1", "A"), Column::new("C2", "B")];
        for id in ["R1", "R10", "R2"] {
            let row = Row::new(id, RowType::Data, &template.report_data.columns, 100);
            template.report_data.rows.push(row);
        }
        let cells = template.report_data.rows[2].cells_mut().unwrap();
        cells[0] = Cell::formula("cell_R10_C1 + cell_R10_C2");
        cells[1] = Cell::formula("cell_R1_C2 * 2");
        template
    }

    #[test]
    fn test_find_references_is_anchored() {
        let template = template();
        assert_eq!(
            find_references(&template, TargetKind::Row, "R1"),
            vec![ReferenceLocation::new(2, 1)]
        );
        // Two references in one cell give one location.
        assert_eq!(
            find_references(&template, TargetKind::Row, "R10"),
            vec![ReferenceLocation::new(2, 0)]
        );
        assert_eq!(find_references(&template, TargetKind::Column, "C2").len(), 2);
        assert!(find_references(&template, TargetKind::Row, "R2").is_empty());
    }

    #[test]
    fn test_location_display_is_one_indexed() {
        assert_eq!(ReferenceLocation::new(0, 2).to_string(), "Row 1, Cell 3");
    }

    #[test]
    fn test_index_matches_scan() {
        let template = template();
        let index = ReferenceIndex::build(&template);
        for id in ["R1", "R10", "R2"] {
            assert_eq!(
                index.references_to(TargetKind::Row, id),
                find_references(&template, TargetKind::Row, id).as_slice()
            );
        }
        assert!(index.is_referenced(TargetKind::Column, "C1"));
        assert!(!index.is_referenced(TargetKind::Column, "C9"));
    }

    #[test]
    fn test_rename_rewrites_whole_tokens_only() {
        let scope = IdScope::new(["R1", "R10"], ["C1"]);
        let renamed = rename_in_expression(
            "cell_R1_C1 + cell_R10_C1",
            &scope,
            TargetKind::Row,
            "R1",
            "TOTAL",
        );
        assert_eq!(renamed.as_deref(), Some("cell_TOTAL_C1 + cell_R10_C1"));
        assert_eq!(
            rename_in_expression("cell_R10_C1", &scope, TargetKind::Row, "R1", "X"),
            None
        );
    }
}
