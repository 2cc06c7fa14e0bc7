//! FILENAME: core/engine/src/structure.rs
//! PURPOSE: Structural edits on a template: add, remove, move and rename
//! rows and columns, and cell replacement.
//! CONTEXT: Every static row has exactly one cell per column, in column
//! order. Every dynamic row has one column mapping per column. Each edit
//! here preserves both invariants. Reordering only moves things; formula
//! references name ids, not positions, so they are never rewritten by a
//! move. Renames rewrite every reference that resolves to the renamed id.
//!
//! These functions mutate in place. Callers that need atomicity (the editor
//! session) apply them to a clone and swap it in.

use crate::cell::Cell;
use crate::ids::{check_cell_ids, validate_id, IdError, IdKind};
use crate::logging::{log_debug, log_info, CAT_STRUCTURE};
use crate::model::{Column, Row, Template};
use crate::reference_index::{rename_in_expression, TargetKind};
use formula_parser::IdScope;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("Row {0} does not exist")]
    UnknownRow(String),

    #[error("Column {0} does not exist")]
    UnknownColumn(String),

    #[error("Index {index} is out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Row {0} is a dynamic row and has no cells")]
    DynamicRow(String),

    #[error("Row {0} is not a dynamic row")]
    NotDynamic(String),

    #[error(transparent)]
    Id(#[from] IdError),
}

/// Direction of a one-step move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

impl MoveDirection {
    fn target(self, index: usize, len: usize) -> Option<usize> {
        match self {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => Some(index + 1).filter(|&i| i < len),
        }
    }
}

impl Template {
    fn require_row_index(&self, row_id: &str) -> Result<usize, StructureError> {
        self.row_index(row_id)
            .ok_or_else(|| StructureError::UnknownRow(row_id.to_string()))
    }

    fn require_column_index(&self, column_id: &str) -> Result<usize, StructureError> {
        self.column_index(column_id)
            .ok_or_else(|| StructureError::UnknownColumn(column_id.to_string()))
    }

    /// Rejects `id` when, as a new or renamed row/column, it would derive a
    /// cell id some other (row, column) pair already has. `replacing` is the
    /// id being renamed away.
    fn check_new_cell_ids(&self, kind: IdKind, id: &str, replacing: Option<&str>) -> Result<(), IdError> {
        let keep = |other: &&str| Some(*other) != replacing;
        let (rows, columns): (Vec<&str>, Vec<&str>) = match kind {
            IdKind::Row => (self.row_ids().filter(keep).collect(), self.column_ids().collect()),
            IdKind::Column => (self.row_ids().collect(), self.column_ids().filter(keep).collect()),
        };
        check_cell_ids(kind, id, &rows, &columns)
    }

    /// Snapshot of the live ids, for resolving references while mutating.
    fn id_scope(&self) -> IdScope {
        IdScope::new(self.row_ids(), self.column_ids())
    }

    // ========================================================================
    // COLUMNS
    // ========================================================================

    /// Appends a column. Every static row gains an empty TEXT cell and every
    /// dynamic row an empty mapping. Returns the new column's index.
    pub fn add_column(&mut self, column: Column) -> Result<usize, StructureError> {
        validate_id(IdKind::Column, &column.id, self.column_ids())?;
        self.check_new_cell_ids(IdKind::Column, &column.id, None)?;

        let column_id = column.id.clone();
        self.report_data.columns.push(column);
        let columns = &self.report_data.columns;
        for row in &mut self.report_data.rows {
            if let Some(cells) = row.cells_mut() {
                cells.push(Cell::default());
            } else if let Some(config) = row.dynamic_config_mut() {
                config.ensure_mappings(columns);
            }
        }

        log_info!(CAT_STRUCTURE, "added column {}", column_id);
        Ok(self.report_data.columns.len() - 1)
    }

    /// Removes a column, the cell at its position in every static row and
    /// its mapping in every dynamic row. Formulas are left alone; scrubbing
    /// is the deletion guard's job.
    pub fn remove_column(&mut self, column_id: &str) -> Result<Column, StructureError> {
        let index = self.require_column_index(column_id)?;
        let column = self.report_data.columns.remove(index);

        for row in &mut self.report_data.rows {
            if let Some(cells) = row.cells_mut() {
                if index < cells.len() {
                    cells.remove(index);
                }
            } else if let Some(config) = row.dynamic_config_mut() {
                config.remove_mapping(column_id);
            }
        }

        log_info!(CAT_STRUCTURE, "removed column {} at index {}", column_id, index);
        Ok(column)
    }

    /// Swaps a column with its neighbour, cells included. Returns false
    /// when the column is already at that edge.
    pub fn move_column(&mut self, column_id: &str, direction: MoveDirection) -> Result<bool, StructureError> {
        let index = self.require_column_index(column_id)?;
        let Some(target) = direction.target(index, self.report_data.columns.len()) else {
            return Ok(false);
        };

        self.report_data.columns.swap(index, target);
        for row in &mut self.report_data.rows {
            if let Some(cells) = row.cells_mut() {
                if cells.len() > index.max(target) {
                    cells.swap(index, target);
                }
            }
        }

        log_debug!(CAT_STRUCTURE, "moved column {} from {} to {}", column_id, index, target);
        Ok(true)
    }

    /// Moves a column to `target`, shifting the columns in between.
    pub fn move_column_to(&mut self, column_id: &str, target: usize) -> Result<(), StructureError> {
        let index = self.require_column_index(column_id)?;
        let len = self.report_data.columns.len();
        if target >= len {
            return Err(StructureError::IndexOutOfRange { index: target, len });
        }

        let column = self.report_data.columns.remove(index);
        self.report_data.columns.insert(target, column);
        for row in &mut self.report_data.rows {
            if let Some(cells) = row.cells_mut() {
                if cells.len() == len {
                    let cell = cells.remove(index);
                    cells.insert(target, cell);
                }
            }
        }
        Ok(())
    }

    /// Renames a column and rewrites every reference to it.
    /// Returns the number of formula cells rewritten.
    pub fn rename_column(&mut self, old_id: &str, new_id: &str) -> Result<usize, StructureError> {
        let index = self.require_column_index(old_id)?;
        if old_id == new_id {
            return Ok(0);
        }
        validate_id(IdKind::Column, new_id, self.column_ids())?;
        self.check_new_cell_ids(IdKind::Column, new_id, Some(old_id))?;

        let scope = self.id_scope();
        let rewritten = self.rewrite_formulas(|expression| {
            rename_in_expression(expression, &scope, TargetKind::Column, old_id, new_id)
        });

        self.report_data.columns[index].id = new_id.to_string();
        for row in &mut self.report_data.rows {
            if let Some(config) = row.dynamic_config_mut() {
                config.rename_mapping(old_id, new_id);
            }
        }

        log_info!(
            CAT_STRUCTURE,
            "renamed column {} to {} ({} formulas rewritten)",
            old_id,
            new_id,
            rewritten
        );
        Ok(rewritten)
    }

    // ========================================================================
    // ROWS
    // ========================================================================

    /// Inserts a row after `insert_after` (appends when None or past the end).
    /// Static rows are padded or truncated to the column count.
    /// Returns the new row's index.
    pub fn add_row(&mut self, mut row: Row, insert_after: Option<usize>) -> Result<usize, StructureError> {
        validate_id(IdKind::Row, &row.id, self.row_ids())?;
        self.check_new_cell_ids(IdKind::Row, &row.id, None)?;

        let columns = &self.report_data.columns;
        if let Some(cells) = row.cells_mut() {
            cells.resize_with(columns.len(), Cell::default);
        } else if let Some(config) = row.dynamic_config_mut() {
            config.ensure_mappings(columns);
        }

        let len = self.report_data.rows.len();
        let index = insert_after.map_or(len, |after| (after + 1).min(len));
        log_info!(CAT_STRUCTURE, "added {} row {} at index {}", row.row_type(), row.id, index);
        self.report_data.rows.insert(index, row);
        Ok(index)
    }

    /// Removes a row. Formulas are left alone.
    pub fn remove_row(&mut self, row_id: &str) -> Result<Row, StructureError> {
        let index = self.require_row_index(row_id)?;
        log_info!(CAT_STRUCTURE, "removed row {} at index {}", row_id, index);
        Ok(self.report_data.rows.remove(index))
    }

    /// Swaps a row with its neighbour. Returns false at the edge.
    pub fn move_row(&mut self, row_id: &str, direction: MoveDirection) -> Result<bool, StructureError> {
        let index = self.require_row_index(row_id)?;
        let Some(target) = direction.target(index, self.report_data.rows.len()) else {
            return Ok(false);
        };
        self.report_data.rows.swap(index, target);
        log_debug!(CAT_STRUCTURE, "moved row {} from {} to {}", row_id, index, target);
        Ok(true)
    }

    /// Moves a row to `target` (drag and drop).
    pub fn move_row_to(&mut self, row_id: &str, target: usize) -> Result<(), StructureError> {
        let index = self.require_row_index(row_id)?;
        let len = self.report_data.rows.len();
        if target >= len {
            return Err(StructureError::IndexOutOfRange { index: target, len });
        }
        let row = self.report_data.rows.remove(index);
        self.report_data.rows.insert(target, row);
        Ok(())
    }

    /// Renames a row and rewrites every reference to it.
    /// Returns the number of formula cells rewritten.
    pub fn rename_row(&mut self, old_id: &str, new_id: &str) -> Result<usize, StructureError> {
        let index = self.require_row_index(old_id)?;
        if old_id == new_id {
            return Ok(0);
        }
        validate_id(IdKind::Row, new_id, self.row_ids())?;
        self.check_new_cell_ids(IdKind::Row, new_id, Some(old_id))?;

        let scope = self.id_scope();
        let rewritten = self.rewrite_formulas(|expression| {
            rename_in_expression(expression, &scope, TargetKind::Row, old_id, new_id)
        });
        self.report_data.rows[index].id = new_id.to_string();

        log_info!(
            CAT_STRUCTURE,
            "renamed row {} to {} ({} formulas rewritten)",
            old_id,
            new_id,
            rewritten
        );
        Ok(rewritten)
    }

    // ========================================================================
    // CELLS
    // ========================================================================

    /// Like `cell`, but says why the cell is not there.
    pub fn require_cell(&self, row_id: &str, column_id: &str) -> Result<&Cell, StructureError> {
        let column_index = self.require_column_index(column_id)?;
        let row = self
            .row(row_id)
            .ok_or_else(|| StructureError::UnknownRow(row_id.to_string()))?;
        let cells = row
            .cells()
            .ok_or_else(|| StructureError::DynamicRow(row_id.to_string()))?;
        cells.get(column_index).ok_or(StructureError::IndexOutOfRange {
            index: column_index,
            len: cells.len(),
        })
    }

    pub fn cell_mut(&mut self, row_id: &str, column_id: &str) -> Result<&mut Cell, StructureError> {
        let column_index = self.require_column_index(column_id)?;
        let row = self
            .row_mut(row_id)
            .ok_or_else(|| StructureError::UnknownRow(row_id.to_string()))?;
        let cells = row
            .cells_mut()
            .ok_or_else(|| StructureError::DynamicRow(row_id.to_string()))?;
        let len = cells.len();
        cells
            .get_mut(column_index)
            .ok_or(StructureError::IndexOutOfRange {
                index: column_index,
                len,
            })
    }

    /// Replaces a cell and returns the previous one.
    pub fn set_cell(&mut self, row_id: &str, column_id: &str, cell: Cell) -> Result<Cell, StructureError> {
        let slot = self.cell_mut(row_id, column_id)?;
        Ok(std::mem::replace(slot, cell))
    }

    /// Pads or truncates static cell arrays to the column count and makes
    /// dynamic mappings cover exactly the template columns.
    /// Returns true if anything changed.
    pub fn ensure_alignment(&mut self) -> bool {
        let columns = &self.report_data.columns;
        let mut changed = false;

        for row in &mut self.report_data.rows {
            if let Some(cells) = row.cells_mut() {
                if cells.len() != columns.len() {
                    cells.resize_with(columns.len(), Cell::default);
                    changed = true;
                }
            } else if let Some(config) = row.dynamic_config_mut() {
                let before = config.column_mappings.clone();
                config
                    .column_mappings
                    .retain(|m| columns.iter().any(|c| c.id == m.template_column_id));
                config.ensure_mappings(columns);
                if config.column_mappings != before {
                    config.sync_select();
                    changed = true;
                }
            }
        }

        if changed {
            log_debug!(CAT_STRUCTURE, "realigned cells to {} columns", columns.len());
        }
        changed
    }

    /// Applies `rewrite` to every formula expression; a Some result replaces
    /// the expression. Returns the number of expressions replaced.
    pub(crate) fn rewrite_formulas<F>(&mut self, mut rewrite: F) -> usize
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut count = 0;
        for row in &mut self.report_data.rows {
            let Some(cells) = row.cells_mut() else {
                continue;
            };
            for cell in cells.iter_mut() {
                if let Some(expression) = cell.expression_mut() {
                    if let Some(updated) = rewrite(expression) {
                        *expression = updated;
                        count += 1;
                    }
                }
            }
        }
        count
    }
}
