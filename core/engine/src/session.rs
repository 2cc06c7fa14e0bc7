//! FILENAME: core/engine/src/session.rs
//! PURPOSE: One user's editing session over a template document.
//! CONTEXT: The session owns the document. Every edit runs against a clone
//! and the clone is swapped in only if the edit succeeds, so a failed edit
//! leaves the document exactly as it was. The replaced document goes onto
//! the undo stack. An edit that changes nothing records no history.
//!
//! Row and column deletion follow the guard protocol: a request either
//! applies at once (nothing references the target) or parks a plan that
//! must be confirmed or cancelled.

use crate::catalog::TableCatalog;
use crate::cell::{Cell, CellContent, FormulaVariables};
use crate::config::EditorConfig;
use crate::filter::FilterSet;
use crate::guard::{execute_deletion, plan_deletion, DeletionPlan, DeletionTarget, ScrubReport};
use crate::ids::{next_column_id, IdGenerator};
use crate::logging::{log_debug, log_info, log_warn, CAT_SESSION};
use crate::model::{Column, ColumnFormat, DynamicRowConfig, ReportMeta, Row, RowType, Template, TemplateDocument, TemplateMeta};
use crate::picker::{append_reference, CellPickSender, FormulaPicker};
use crate::reference_index::ReferenceLocation;
use crate::structure::{MoveDirection, StructureError};
use crate::undo::{Snapshot, UndoStack};
use crate::validation::{validate_template, validate_variants, TemplateIssue};
use crate::variant::{normalize_variant_code, ScopeType, Variant};
use formula_parser::{cell_id, validate_expression, ValidationError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("No deletion is awaiting confirmation")]
    NoPendingDeletion,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Cell {0} is not a formula cell")]
    NotAFormula(String),

    #[error("Variant {0} does not exist")]
    UnknownVariant(String),

    #[error("Variant code {0} already exists")]
    DuplicateVariant(String),

    #[error("Variant code is required")]
    EmptyVariantCode,
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Nothing referenced the target; it is gone.
    Applied(ScrubReport),
    /// Formula cells reference the target. Nothing changed yet; call
    /// `confirm_deletion` or `cancel_deletion`.
    AwaitingConfirmation(Vec<ReferenceLocation>),
}

#[derive(Debug)]
pub struct EditorSession {
    document: TemplateDocument,
    config: EditorConfig,
    catalog: Option<TableCatalog>,
    history: UndoStack,
    pending_deletion: Option<DeletionPlan>,
    id_generator: IdGenerator,
    picker: FormulaPicker,
}

impl EditorSession {
    pub fn new(document: TemplateDocument, config: EditorConfig) -> Self {
        let history = UndoStack::with_max_size(config.history_limit);
        EditorSession {
            document,
            config,
            catalog: None,
            history,
            pending_deletion: None,
            id_generator: IdGenerator::new(),
            picker: FormulaPicker::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: TableCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn set_catalog(&mut self, catalog: Option<TableCatalog>) {
        self.catalog = catalog;
    }

    pub fn document(&self) -> &TemplateDocument {
        &self.document
    }

    pub fn template(&self) -> &Template {
        &self.document.template
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> Option<&TableCatalog> {
        self.catalog.as_ref()
    }

    /// Hands the document to the caller, ending the session.
    pub fn into_document(self) -> TemplateDocument {
        self.document
    }

    /// Runs `edit` on a copy and swaps the copy in on success.
    fn apply<T, F>(&mut self, description: impl Into<String>, edit: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut TemplateDocument) -> Result<T, SessionError>,
    {
        let mut next = self.document.clone();
        let value = edit(&mut next)?;
        if next == self.document {
            return Ok(value);
        }

        let description = description.into();
        log_debug!(CAT_SESSION, "applied: {}", description);
        let previous = std::mem::replace(&mut self.document, next);
        self.history.record(Snapshot::new(description, previous));
        // Any structural change can invalidate a parked plan.
        self.pending_deletion = None;
        Ok(value)
    }

    /// Replaces the whole document (import). Undoable.
    pub fn replace_document(&mut self, document: TemplateDocument) -> Result<(), SessionError> {
        log_info!(
            CAT_SESSION,
            "replacing document with template {}",
            document.template.template_meta.template_id
        );
        self.apply("Import document", |doc| {
            *doc = document;
            Ok(())
        })
    }

    pub fn set_template_meta(&mut self, meta: TemplateMeta) -> Result<(), SessionError> {
        self.apply("Edit template metadata", |doc| {
            doc.template.template_meta = meta;
            Ok(())
        })
    }

    pub fn set_report_meta(&mut self, meta: ReportMeta) -> Result<(), SessionError> {
        self.apply("Edit report metadata", |doc| {
            doc.template.report_meta = meta;
            Ok(())
        })
    }

    // ========================================================================
    // COLUMNS
    // ========================================================================

    /// Appends a column with a generated id (`col_<n>`) and returns the id.
    /// The name defaults to `Column <n>`.
    pub fn add_column(&mut self, name: Option<&str>) -> Result<String, SessionError> {
        let template = &self.document.template;
        let id = next_column_id(&self.config.column_id_prefix, template.column_ids());
        let name = name
            .map(str::to_string)
            .unwrap_or_else(|| format!("Column {}", template.columns().len() + 1));
        self.add_column_with_id(&id, &name)?;
        Ok(id)
    }

    pub fn add_column_with_id(&mut self, id: &str, name: &str) -> Result<(), SessionError> {
        self.apply(format!("Add column {}", id), |doc| {
            doc.template.add_column(Column::new(id, name))?;
            Ok(())
        })
    }

    pub fn request_delete_column(&mut self, column_id: &str) -> Result<DeleteOutcome, SessionError> {
        self.request_deletion(DeletionTarget::Column(column_id.to_string()))
    }

    pub fn move_column(&mut self, column_id: &str, direction: MoveDirection) -> Result<bool, SessionError> {
        self.apply(format!("Move column {}", column_id), |doc| {
            Ok(doc.template.move_column(column_id, direction)?)
        })
    }

    pub fn move_column_to(&mut self, column_id: &str, target: usize) -> Result<(), SessionError> {
        self.apply(format!("Move column {}", column_id), |doc| {
            Ok(doc.template.move_column_to(column_id, target)?)
        })
    }

    fn edit_column<F>(&mut self, column_id: &str, description: String, edit: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Column),
    {
        self.apply(description, |doc| {
            let column = doc
                .template
                .column_mut(column_id)
                .ok_or_else(|| StructureError::UnknownColumn(column_id.to_string()))?;
            edit(column);
            Ok(())
        })
    }

    /// Display name shown in the column header. Ids are untouched.
    pub fn set_column_name(&mut self, column_id: &str, name: &str) -> Result<(), SessionError> {
        self.edit_column(column_id, format!("Rename header of {}", column_id), |column| {
            column.name = name.to_string();
        })
    }

    /// Replaces the column's format: its type and the type-specific fields
    /// (currency symbol, decimals, output format and the like).
    pub fn set_column_format(&mut self, column_id: &str, format: ColumnFormat) -> Result<(), SessionError> {
        self.edit_column(column_id, format!("Format column {}", column_id), |column| {
            column.format = format;
        })
    }

    /// None restores the default width.
    pub fn set_column_width(&mut self, column_id: &str, width: Option<f64>) -> Result<(), SessionError> {
        self.edit_column(column_id, format!("Resize column {}", column_id), |column| {
            column.width = width;
        })
    }

    /// Renames a column; formulas and dynamic mappings follow.
    pub fn rename_column(&mut self, old_id: &str, new_id: &str) -> Result<usize, SessionError> {
        self.apply(format!("Rename column {} to {}", old_id, new_id), |doc| {
            Ok(doc.template.rename_column(old_id, new_id)?)
        })
    }

    // ========================================================================
    // ROWS
    // ========================================================================

    /// Adds a row after `insert_after` (or at the end) and returns its id.
    /// A custom id is used verbatim and must pass id validation; otherwise
    /// one is generated from the row prefix and the current time.
    pub fn add_row(
        &mut self,
        row_type: RowType,
        custom_id: Option<&str>,
        insert_after: Option<usize>,
    ) -> Result<String, SessionError> {
        let id = match custom_id {
            Some(id) => id.to_string(),
            None => self
                .id_generator
                .next_id(&self.config.row_id_prefix, self.document.template.row_ids()),
        };
        let limit = self.config.default_dynamic_limit;

        self.apply(format!("Add {} row {}", row_type, id), |doc| {
            let row = Row::new(id.as_str(), row_type, doc.template.columns(), limit);
            doc.template.add_row(row, insert_after)?;
            Ok(())
        })?;
        Ok(id)
    }

    pub fn request_delete_row(&mut self, row_id: &str) -> Result<DeleteOutcome, SessionError> {
        self.request_deletion(DeletionTarget::Row(row_id.to_string()))
    }

    pub fn move_row(&mut self, row_id: &str, direction: MoveDirection) -> Result<bool, SessionError> {
        self.apply(format!("Move row {}", row_id), |doc| {
            Ok(doc.template.move_row(row_id, direction)?)
        })
    }

    pub fn move_row_to(&mut self, row_id: &str, target: usize) -> Result<(), SessionError> {
        self.apply(format!("Move row {}", row_id), |doc| {
            Ok(doc.template.move_row_to(row_id, target)?)
        })
    }

    /// Renames a row; formulas and DYNAMIC_TABLE variant scopes follow.
    pub fn rename_row(&mut self, old_id: &str, new_id: &str) -> Result<usize, SessionError> {
        self.apply(format!("Rename row {} to {}", old_id, new_id), |doc| {
            let rewritten = doc.template.rename_row(old_id, new_id)?;
            let rules = doc.variants.iter_mut().flat_map(|v| v.filter_rules.iter_mut());
            for rule in rules {
                if rule.scope_type == ScopeType::DynamicTable && rule.scope_value.as_deref() == Some(old_id) {
                    rule.scope_value = Some(new_id.to_string());
                }
            }
            Ok(rewritten)
        })
    }

    // ========================================================================
    // DELETION PROTOCOL
    // ========================================================================

    fn request_deletion(&mut self, target: DeletionTarget) -> Result<DeleteOutcome, SessionError> {
        let plan = plan_deletion(&self.document.template, target)?;
        if plan.requires_confirmation() {
            log_warn!(
                CAT_SESSION,
                "delete {} awaits confirmation ({} references)",
                plan.target,
                plan.references.len()
            );
            let references = plan.references.clone();
            self.pending_deletion = Some(plan);
            return Ok(DeleteOutcome::AwaitingConfirmation(references));
        }
        self.run_deletion(plan).map(DeleteOutcome::Applied)
    }

    /// Applies the parked deletion, scrubbing the references it lists.
    pub fn confirm_deletion(&mut self) -> Result<ScrubReport, SessionError> {
        let plan = self
            .pending_deletion
            .take()
            .ok_or(SessionError::NoPendingDeletion)?;
        self.run_deletion(plan)
    }

    /// Drops the parked deletion. The document is untouched.
    pub fn cancel_deletion(&mut self) -> Option<DeletionPlan> {
        let plan = self.pending_deletion.take();
        if let Some(plan) = &plan {
            log_debug!(CAT_SESSION, "cancelled deletion of {}", plan.target);
        }
        plan
    }

    pub fn pending_deletion(&self) -> Option<&DeletionPlan> {
        self.pending_deletion.as_ref()
    }

    fn run_deletion(&mut self, plan: DeletionPlan) -> Result<ScrubReport, SessionError> {
        self.apply(format!("Delete {}", plan.target), |doc| {
            let (template, report) = execute_deletion(&doc.template, &plan)?;
            doc.template = template;
            Ok(report)
        })
    }

    // ========================================================================
    // CELLS
    // ========================================================================

    pub fn set_cell(&mut self, row_id: &str, column_id: &str, cell: Cell) -> Result<(), SessionError> {
        self.apply(format!("Edit {}", cell_id(row_id, column_id)), |doc| {
            doc.template.set_cell(row_id, column_id, cell)?;
            Ok(())
        })
    }

    /// Sets a formula expression, turning the cell into a formula cell if
    /// needed (rendering kept). Returns the expression's validation errors;
    /// an invalid expression is still stored, as the user is mid-edit.
    pub fn set_formula(
        &mut self,
        row_id: &str,
        column_id: &str,
        expression: &str,
    ) -> Result<Vec<ValidationError>, SessionError> {
        self.apply(format!("Edit formula {}", cell_id(row_id, column_id)), |doc| {
            let cell = doc.template.cell_mut(row_id, column_id)?;
            match cell.expression_mut() {
                Some(existing) => *existing = expression.to_string(),
                None => {
                    let render = std::mem::take(&mut cell.render);
                    *cell = Cell::formula(expression);
                    cell.render = render;
                }
            }
            Ok(())
        })?;
        self.validate_cell(row_id, column_id)
    }

    pub fn set_formula_variables(
        &mut self,
        row_id: &str,
        column_id: &str,
        variables: FormulaVariables,
    ) -> Result<(), SessionError> {
        let id = cell_id(row_id, column_id);
        self.apply(format!("Edit variables {}", id), |doc| {
            let cell = doc.template.cell_mut(row_id, column_id)?;
            match &mut cell.content {
                CellContent::Formula { variables: slot, .. } => {
                    *slot = variables;
                    Ok(())
                }
                _ => Err(SessionError::NotAFormula(id.clone())),
            }
        })
    }

    /// Validation errors of a formula cell; empty for other cell types.
    pub fn validate_cell(&self, row_id: &str, column_id: &str) -> Result<Vec<ValidationError>, SessionError> {
        let template = &self.document.template;
        let cell = template.require_cell(row_id, column_id)?;
        Ok(match (cell.expression(), cell.variables()) {
            (Some(expression), Some(variables)) => {
                validate_expression(expression, &template.scope_with(variables))
            }
            _ => Vec::new(),
        })
    }

    // ========================================================================
    // DYNAMIC ROWS
    // ========================================================================

    fn edit_dynamic<T, F>(&mut self, row_id: &str, description: String, edit: F) -> Result<T, SessionError>
    where
        F: FnOnce(&mut DynamicRowConfig, &[Column]) -> T,
    {
        self.apply(description, |doc| {
            let columns = doc.template.report_data.columns.clone();
            let row = doc
                .template
                .row_mut(row_id)
                .ok_or_else(|| StructureError::UnknownRow(row_id.to_string()))?;
            let config = row
                .dynamic_config_mut()
                .ok_or_else(|| StructureError::NotDynamic(row_id.to_string()))?;
            Ok(edit(config, &columns))
        })
    }

    /// Selects the table of a dynamic row; mappings reset.
    pub fn set_dynamic_table(&mut self, row_id: &str, table: &str) -> Result<(), SessionError> {
        self.edit_dynamic(row_id, format!("Set table of {}", row_id), |config, columns| {
            config.set_table(table, columns)
        })
    }

    pub fn set_dynamic_mapping(&mut self, row_id: &str, column_id: &str, db_column: &str) -> Result<(), SessionError> {
        if self.document.template.column(column_id).is_none() {
            return Err(StructureError::UnknownColumn(column_id.to_string()).into());
        }
        self.edit_dynamic(row_id, format!("Map {} of {}", column_id, row_id), |config, columns| {
            config.set_mapping(column_id, db_column, columns)
        })
    }

    pub fn set_dynamic_filters(&mut self, row_id: &str, filters: FilterSet) -> Result<(), SessionError> {
        self.edit_dynamic(row_id, format!("Filter {}", row_id), |config, _| {
            config.filters = filters;
        })
    }

    pub fn set_dynamic_order(&mut self, row_id: &str, orderby: &str, limit: u32) -> Result<(), SessionError> {
        self.edit_dynamic(row_id, format!("Order {}", row_id), |config, _| {
            config.orderby = orderby.to_string();
            config.limit = limit;
        })
    }

    // ========================================================================
    // VARIANTS
    // ========================================================================

    /// Adds a variant; its code is normalized first.
    pub fn add_variant(&mut self, mut variant: Variant) -> Result<String, SessionError> {
        variant.variant_code = normalize_variant_code(&variant.variant_code);
        let code = variant.variant_code.clone();
        if code.is_empty() {
            return Err(SessionError::EmptyVariantCode);
        }
        self.apply(format!("Add variant {}", code), |doc| {
            if doc.variants.iter().any(|v| v.variant_code == code) {
                return Err(SessionError::DuplicateVariant(code.clone()));
            }
            doc.variants.push(variant);
            Ok(code.clone())
        })
    }

    /// Replaces the variant with code `code`. The replacement may change code.
    pub fn update_variant(&mut self, code: &str, mut variant: Variant) -> Result<(), SessionError> {
        variant.variant_code = normalize_variant_code(&variant.variant_code);
        if variant.variant_code.is_empty() {
            return Err(SessionError::EmptyVariantCode);
        }
        self.apply(format!("Edit variant {}", code), |doc| {
            let index = doc
                .variants
                .iter()
                .position(|v| v.variant_code == code)
                .ok_or_else(|| SessionError::UnknownVariant(code.to_string()))?;
            let clash = doc
                .variants
                .iter()
                .enumerate()
                .any(|(i, v)| i != index && v.variant_code == variant.variant_code);
            if clash {
                return Err(SessionError::DuplicateVariant(variant.variant_code.clone()));
            }
            doc.variants[index] = variant;
            Ok(())
        })
    }

    pub fn remove_variant(&mut self, code: &str) -> Result<Variant, SessionError> {
        self.apply(format!("Remove variant {}", code), |doc| {
            let index = doc
                .variants
                .iter()
                .position(|v| v.variant_code == code)
                .ok_or_else(|| SessionError::UnknownVariant(code.to_string()))?;
            Ok(doc.variants.remove(index))
        })
    }

    // ========================================================================
    // VALIDATION
    // ========================================================================

    /// Template issues, plus variant issues when enabled in the config.
    pub fn validate(&self) -> Vec<TemplateIssue> {
        let catalog = self.catalog.as_ref();
        let mut issues = validate_template(&self.document.template, catalog);
        if self.config.validate_variant_references {
            issues.extend(validate_variants(&self.document, catalog));
        }
        issues
    }

    // ========================================================================
    // CELL PICKING
    // ========================================================================

    /// Sender for the grid view. Picks only land while pick mode is on.
    pub fn pick_sender(&self) -> CellPickSender {
        self.picker.sender()
    }

    pub fn start_cell_pick(&self) {
        self.picker.activate();
    }

    pub fn stop_cell_pick(&self) {
        self.picker.deactivate();
    }

    pub fn is_picking(&self) -> bool {
        self.picker.is_active()
    }

    /// Appends every picked reference to the formula at (row, column) and
    /// returns its validation errors. When the target is not a formula cell
    /// the picks stay queued for the next commit.
    pub fn commit_picked_references(
        &mut self,
        row_id: &str,
        column_id: &str,
    ) -> Result<Vec<ValidationError>, SessionError> {
        let id = cell_id(row_id, column_id);
        if !self.document.template.require_cell(row_id, column_id)?.is_formula() {
            return Err(SessionError::NotAFormula(id));
        }

        let picked = self.picker.drain();
        if !picked.is_empty() {
            self.apply(format!("Insert references into {}", id), |doc| {
                let cell = doc.template.cell_mut(row_id, column_id)?;
                let expression = cell
                    .expression_mut()
                    .ok_or_else(|| SessionError::NotAFormula(id.clone()))?;
                for reference in &picked {
                    append_reference(expression, reference);
                }
                Ok(())
            })?;
        }
        self.validate_cell(row_id, column_id)
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Restores the document before the last edit. Returns the edit's
    /// description.
    pub fn undo(&mut self) -> Result<String, SessionError> {
        let snapshot = self.history.pop_undo().ok_or(SessionError::NothingToUndo)?;
        let current = std::mem::replace(&mut self.document, snapshot.document);
        self.history
            .push_redo(Snapshot::new(snapshot.description.clone(), current));
        self.pending_deletion = None;
        log_info!(CAT_SESSION, "undo: {}", snapshot.description);
        Ok(snapshot.description)
    }

    pub fn redo(&mut self) -> Result<String, SessionError> {
        let snapshot = self.history.pop_redo().ok_or(SessionError::NothingToRedo)?;
        let current = std::mem::replace(&mut self.document, snapshot.document);
        self.history
            .push_undo_for_redo(Snapshot::new(snapshot.description.clone(), current));
        self.pending_deletion = None;
        log_info!(CAT_SESSION, "redo: {}", snapshot.description);
        Ok(snapshot.description)
    }
}
