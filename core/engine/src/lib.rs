//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the report template engine.
//! CONTEXT: Re-exports public types and modules for use by other crates.

pub mod logging;

pub mod catalog;
pub mod cell;
pub mod config;
pub mod dependency_graph;
pub mod filter;
pub mod guard;
pub mod ids;
pub mod model;
pub mod picker;
pub mod reference_index;
pub mod session;
pub mod structure;
pub mod undo;
pub mod validation;
pub mod variant;

// Re-export commonly used types at the crate root
pub use catalog::{Flag, TableCatalog, TableColumn, TableConfig};
pub use cell::{
    Cell, CellContent, DbAggregate, DbSource, DbVariable, FormulaVariable, FormulaVariables,
    Render,
};
pub use config::EditorConfig;
pub use dependency_graph::{CellKey, CycleError, DependencyGraph};
pub use filter::{FilterCondition, FilterOperator, FilterSet, FilterSpec, FilterValue};
pub use guard::{
    execute_deletion, normalize_scrubbed, plan_deletion, scrub_references, DeletionPlan,
    DeletionTarget, ScrubReport, ScrubbedExpression,
};
pub use ids::{
    check_cell_ids, find_cell_id_collisions, validate_id, validate_id_format, CellIdCollision,
    IdError, IdGenerator, IdKind,
};
pub use model::{
    CellScope, Column, ColumnFormat, ColumnMapping, DynamicRowConfig, FormulaCell, ReportData,
    ReportExtra, ReportMeta, Row, RowKind, RowType, Template, TemplateDocument, TemplateMeta,
};
pub use picker::{CellPickSender, FormulaPicker};
pub use reference_index::{find_references, ReferenceIndex, ReferenceLocation, TargetKind};
pub use session::{DeleteOutcome, EditorSession, SessionError};
pub use structure::{MoveDirection, StructureError};
pub use undo::{Snapshot, UndoStack};
pub use validation::{
    has_errors, validate_template, validate_variants, IssueLocation, Severity, TemplateIssue,
};
pub use variant::{FilterRule, Param, ParamType, ScopeType, Variant};

// Parser types that appear in engine signatures
pub use formula_parser::{cell_id, ValidationError};
