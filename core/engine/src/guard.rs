//! FILENAME: core/engine/src/guard.rs
//! PURPOSE: Gates row and column deletion on formula references and scrubs
//! the references that a confirmed deletion leaves dangling.
//! CONTEXT: Deletion is a two-step protocol. `plan_deletion` lists the
//! formula cells that reference the target; a non-empty list must be shown
//! to the user before `execute_deletion` runs. Execution works on a clone
//! of the template and hands back the new value, so a failure leaves the
//! caller's template untouched.
//!
//! SCRUB: every reference token resolving to the deleted id is removed,
//! then the expression is tidied until stable:
//! - empty parentheses are dropped
//! - operator runs collapse to their first operator
//! - a binary operator right after `(` or any operator right before `)` goes
//! - a leading `+ * /` and a trailing operator go
//! Expressions that referenced nothing deleted are not touched.

use crate::logging::{log_debug, log_info, log_warn, CAT_GUARD};
use crate::model::Template;
use crate::reference_index::{find_references, rewrite_references, ReferenceLocation, TargetKind};
use crate::structure::StructureError;
use formula_parser::IdScope;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static EMPTY_PARENS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)").expect("valid regex"));
static OPERATOR_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([+\-*/])(?:\s*[+\-*/])+").expect("valid regex"));
static OPEN_PAREN_OPERATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(\s*[+*/]").expect("valid regex"));
static OPERATOR_CLOSE_PAREN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+\-*/]\s*\)").expect("valid regex"));
static LEADING_OPERATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[+*/]\s*").expect("valid regex"));
static TRAILING_OPERATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[+\-*/]\s*$").expect("valid regex"));
static OPEN_PAREN_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s+").expect("valid regex"));
static CLOSE_PAREN_SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\)").expect("valid regex"));

/// The row or column a deletion removes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeletionTarget {
    Row(String),
    Column(String),
}

impl DeletionTarget {
    pub fn kind(&self) -> TargetKind {
        match self {
            DeletionTarget::Row(_) => TargetKind::Row,
            DeletionTarget::Column(_) => TargetKind::Column,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            DeletionTarget::Row(id) | DeletionTarget::Column(id) => id,
        }
    }
}

impl fmt::Display for DeletionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionTarget::Row(id) => write!(f, "row {}", id),
            DeletionTarget::Column(id) => write!(f, "column {}", id),
        }
    }
}

/// A deletion that has been checked but not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    pub target: DeletionTarget,
    /// Position of the target when the plan was made.
    pub index: usize,
    /// Formula cells that reference the target.
    pub references: Vec<ReferenceLocation>,
}

impl DeletionPlan {
    pub fn requires_confirmation(&self) -> bool {
        !self.references.is_empty()
    }

    /// `Row i, Cell j` lines for a confirmation prompt.
    pub fn describe_references(&self) -> Vec<String> {
        self.references.iter().map(ToString::to_string).collect()
    }
}

/// One expression changed by a scrub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubbedExpression {
    /// Location in the template before the deletion.
    pub location: ReferenceLocation,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubReport {
    pub target: DeletionTarget,
    pub scrubbed: Vec<ScrubbedExpression>,
}

/// Checks a deletion and collects the references it would orphan.
pub fn plan_deletion(template: &Template, target: DeletionTarget) -> Result<DeletionPlan, StructureError> {
    let index = match &target {
        DeletionTarget::Row(id) => template
            .row_index(id)
            .ok_or_else(|| StructureError::UnknownRow(id.clone()))?,
        DeletionTarget::Column(id) => template
            .column_index(id)
            .ok_or_else(|| StructureError::UnknownColumn(id.clone()))?,
    };

    let references = find_references(template, target.kind(), target.id());
    if !references.is_empty() {
        log_warn!(
            CAT_GUARD,
            "deleting {} would orphan {} formula(s)",
            target,
            references.len()
        );
    }

    Ok(DeletionPlan {
        target,
        index,
        references,
    })
}

/// Applies a plan to a copy of `template`: scrub first, then remove.
pub fn execute_deletion(template: &Template, plan: &DeletionPlan) -> Result<(Template, ScrubReport), StructureError> {
    let mut next = template.clone();
    let scrubbed = scrub_references(&mut next, &plan.target);

    match &plan.target {
        DeletionTarget::Row(id) => {
            next.remove_row(id)?;
        }
        DeletionTarget::Column(id) => {
            next.remove_column(id)?;
        }
    }

    log_info!(
        CAT_GUARD,
        "deleted {} and scrubbed {} expression(s)",
        plan.target,
        scrubbed.len()
    );
    Ok((
        next,
        ScrubReport {
            target: plan.target.clone(),
            scrubbed,
        },
    ))
}

/// Removes every reference to `target` from the template's formulas.
pub fn scrub_references(template: &mut Template, target: &DeletionTarget) -> Vec<ScrubbedExpression> {
    let scope = IdScope::new(template.row_ids(), template.column_ids());
    let kind = target.kind();
    let id = target.id();
    let mut scrubbed = Vec::new();

    for (row_index, row) in template.report_data.rows.iter_mut().enumerate() {
        let Some(cells) = row.cells_mut() else {
            continue;
        };
        for (cell_index, cell) in cells.iter_mut().enumerate() {
            let Some(expression) = cell.expression_mut() else {
                continue;
            };
            let removed = rewrite_references(expression.as_str(), &scope, |row, column| {
                let hit = match kind {
                    TargetKind::Row => row == id,
                    TargetKind::Column => column == id,
                };
                hit.then(String::new)
            });
            let Some(removed) = removed else {
                continue;
            };

            let after = normalize_scrubbed(&removed);
            log_debug!(
                CAT_GUARD,
                "scrubbed Row {}, Cell {}: '{}' -> '{}'",
                row_index + 1,
                cell_index + 1,
                expression,
                after
            );
            let before = std::mem::replace(expression, after.clone());
            scrubbed.push(ScrubbedExpression {
                location: ReferenceLocation::new(row_index, cell_index),
                before,
                after,
            });
        }
    }

    scrubbed
}

/// Tidies the operator and parenthesis debris left by removing references.
pub fn normalize_scrubbed(expression: &str) -> String {
    let mut current = WHITESPACE_RE.replace_all(expression, " ").into_owned();

    loop {
        let mut next = EMPTY_PARENS_RE.replace_all(&current, "").into_owned();
        next = OPERATOR_RUN_RE.replace_all(&next, "${1}").into_owned();
        next = OPEN_PAREN_OPERATOR_RE.replace_all(&next, "(").into_owned();
        next = OPERATOR_CLOSE_PAREN_RE.replace_all(&next, ")").into_owned();
        next = LEADING_OPERATOR_RE.replace(&next, "").into_owned();
        next = TRAILING_OPERATOR_RE.replace(&next, "").into_owned();
        next = OPEN_PAREN_SPACE_RE.replace_all(&next, "(").into_owned();
        next = CLOSE_PAREN_SPACE_RE.replace_all(&next, ")").into_owned();
        next = WHITESPACE_RE.replace_all(&next, " ").into_owned();

        if next == current {
            break;
        }
        current = next;
    }

    current.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::model::{Column, Row, RowType};
    use formula_parser::validate_expression;

    fn template() -> Template {
        let mut template = Template::new("T1");
        for id in ["C1", "C2", "C3"] {
            template.add_column(Column::new(id, id)).unwrap();
        }
        let columns = template.report_data.columns.clone();
        for id in ["R1", "R2", "R3"] {
            template
                .add_row(Row::new(id, RowType::Data, &columns, 100), None)
                .unwrap();
        }
        template
            .set_cell("R3", "C1", Cell::formula("cell_R1_C1 + cell_R2_C1"))
            .unwrap();
        template
            .set_cell("R3", "C2", Cell::formula("(cell_R1_C2 - cell_R2_C2) * 100"))
            .unwrap();
        template
            .set_cell("R3", "C3", Cell::formula("cell_R1_C3"))
            .unwrap();
        template
    }

    #[test]
    fn test_plan_lists_references() {
        let template = template();
        let plan = plan_deletion(&template, DeletionTarget::Row("R2".to_string())).unwrap();
        assert!(plan.requires_confirmation());
        assert_eq!(plan.index, 1);
        assert_eq!(
            plan.describe_references(),
            vec!["Row 3, Cell 1".to_string(), "Row 3, Cell 2".to_string()]
        );
    }

    #[test]
    fn test_plan_unknown_target_fails() {
        let template = template();
        let err = plan_deletion(&template, DeletionTarget::Column("C9".to_string())).unwrap_err();
        assert_eq!(err, StructureError::UnknownColumn("C9".to_string()));
    }

    #[test]
    fn test_execute_scrubs_and_removes() {
        let template = template();
        let plan = plan_deletion(&template, DeletionTarget::Row("R2".to_string())).unwrap();
        let (next, report) = execute_deletion(&template, &plan).unwrap();

        assert_eq!(next.rows().len(), 2);
        assert_eq!(report.scrubbed.len(), 2);
        assert_eq!(next.cell("R3", "C1").unwrap().expression(), Some("cell_R1_C1"));
        assert_eq!(
            next.cell("R3", "C2").unwrap().expression(),
            Some("(cell_R1_C2) * 100")
        );
        // Untouched expression stays byte-identical.
        assert_eq!(next.cell("R3", "C3").unwrap().expression(), Some("cell_R1_C3"));

        for fc in next.formula_cells() {
            assert!(validate_expression(fc.expression, &next).is_empty());
        }
        // The input template is unchanged.
        assert_eq!(template.rows().len(), 3);
    }

    #[test]
    fn test_execute_column_deletion_keeps_alignment() {
        let template = template();
        let plan = plan_deletion(&template, DeletionTarget::Column("C1".to_string())).unwrap();
        let (next, report) = execute_deletion(&template, &plan).unwrap();
        assert_eq!(report.scrubbed.len(), 1);
        assert_eq!(report.scrubbed[0].after, "");
        for row in next.rows() {
            assert_eq!(row.cells().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_normalize_collapses_debris() {
        assert_eq!(normalize_scrubbed(" + cell_R1_C1"), "cell_R1_C1");
        assert_eq!(normalize_scrubbed("cell_R1_C1 +  - 2"), "cell_R1_C1 + 2");
        assert_eq!(normalize_scrubbed("( ) * 2"), "2");
        assert_eq!(normalize_scrubbed("2 * ( * cell_R1_C1)"), "2 * (cell_R1_C1)");
        assert_eq!(normalize_scrubbed("(cell_R1_C1 + ) / 4"), "(cell_R1_C1) / 4");
        assert_eq!(normalize_scrubbed("-cell_R1_C1 *"), "-cell_R1_C1");
        assert_eq!(normalize_scrubbed("  +  "), "");
    }
}
