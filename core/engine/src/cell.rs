//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Defines the content of a single template cell.
//! CONTEXT: A cell's `type` decides which fields it carries, so the content
//! is a sum type tagged by `type` on the wire. A cell has no stored id: its
//! identity is `cell_<rowId>_<colId>`, derived from its row and its position
//! in the column list.

use crate::filter::FilterSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Database aggregate performed by a `DB_*` cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbAggregate {
    Value,
    Sum,
    Count,
    Avg,
    Min,
    Max,
}

impl DbAggregate {
    pub const ALL: [DbAggregate; 6] = [
        DbAggregate::Value,
        DbAggregate::Sum,
        DbAggregate::Count,
        DbAggregate::Avg,
        DbAggregate::Min,
        DbAggregate::Max,
    ];

    /// The `type` tag of a cell using this aggregate.
    pub fn cell_type(&self) -> &'static str {
        match self {
            DbAggregate::Value => "DB_VALUE",
            DbAggregate::Sum => "DB_SUM",
            DbAggregate::Count => "DB_COUNT",
            DbAggregate::Avg => "DB_AVG",
            DbAggregate::Min => "DB_MIN",
            DbAggregate::Max => "DB_MAX",
        }
    }

    /// Name used in a table column's `aggFuncs` list. `Value` is a plain
    /// lookup and has none.
    pub fn function_name(&self) -> Option<&'static str> {
        match self {
            DbAggregate::Value => None,
            DbAggregate::Sum => Some("SUM"),
            DbAggregate::Count => Some("COUNT"),
            DbAggregate::Avg => Some("AVG"),
            DbAggregate::Min => Some("MIN"),
            DbAggregate::Max => Some("MAX"),
        }
    }

    pub fn from_function_name(name: &str) -> Option<DbAggregate> {
        let wanted = name.trim();
        DbAggregate::ALL
            .into_iter()
            .find(|agg| agg.function_name().is_some_and(|f| f.eq_ignore_ascii_case(wanted)))
    }
}

/// Where a database cell reads from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbSource {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub column: String,
    #[serde(default, skip_serializing_if = "FilterSet::is_empty")]
    pub filters: FilterSet,
}

impl DbSource {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        DbSource {
            table: table.into(),
            column: column.into(),
            filters: FilterSet::new(),
        }
    }
}

/// A database-backed formula variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbVariable {
    /// Cell type tag of the lookup (`DB_SUM`, `DB_VALUE`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub column: String,
    #[serde(default, skip_serializing_if = "FilterSet::is_empty")]
    pub filters: FilterSet,
}

/// A named input of a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormulaVariable {
    /// Placeholder (`"CELL_REF"`) for a value bound to a picked cell.
    Placeholder(String),
    Database(DbVariable),
}

impl FormulaVariable {
    pub fn cell_ref() -> Self {
        FormulaVariable::Placeholder("CELL_REF".to_string())
    }
}

pub type FormulaVariables = BTreeMap<String, FormulaVariable>;

/// Cell content, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellContent {
    Text {
        #[serde(default)]
        value: String,
    },
    Formula {
        #[serde(default)]
        expression: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        variables: FormulaVariables,
    },
    DbValue {
        #[serde(default)]
        source: DbSource,
    },
    DbSum {
        #[serde(default)]
        source: DbSource,
    },
    DbCount {
        #[serde(default)]
        source: DbSource,
    },
    DbAvg {
        #[serde(default)]
        source: DbSource,
    },
    DbMin {
        #[serde(default)]
        source: DbSource,
    },
    DbMax {
        #[serde(default)]
        source: DbSource,
    },
}

/// Rendering hints.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Render {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub align: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colspan: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rowspan: Option<u32>,
}

impl Render {
    pub fn is_empty(&self) -> bool {
        *self == Render::default()
    }
}

/// The atomic unit of a static row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(flatten)]
    pub content: CellContent,
    #[serde(default, skip_serializing_if = "Render::is_empty")]
    pub render: Render,
}

impl Default for Cell {
    fn default() -> Self {
        Cell::text("")
    }
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell {
            content: CellContent::Text {
                value: value.into(),
            },
            render: Render::default(),
        }
    }

    pub fn formula(expression: impl Into<String>) -> Self {
        Cell {
            content: CellContent::Formula {
                expression: expression.into(),
                variables: FormulaVariables::new(),
            },
            render: Render::default(),
        }
    }

    pub fn db(aggregate: DbAggregate, source: DbSource) -> Self {
        let content = match aggregate {
            DbAggregate::Value => CellContent::DbValue { source },
            DbAggregate::Sum => CellContent::DbSum { source },
            DbAggregate::Count => CellContent::DbCount { source },
            DbAggregate::Avg => CellContent::DbAvg { source },
            DbAggregate::Min => CellContent::DbMin { source },
            DbAggregate::Max => CellContent::DbMax { source },
        };
        Cell {
            content,
            render: Render::default(),
        }
    }

    /// The `type` tag.
    pub fn type_name(&self) -> &'static str {
        match &self.content {
            CellContent::Text { .. } => "TEXT",
            CellContent::Formula { .. } => "FORMULA",
            _ => self.aggregate().map_or("DB_VALUE", |agg| agg.cell_type()),
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.content, CellContent::Formula { .. })
    }

    pub fn expression(&self) -> Option<&str> {
        match &self.content {
            CellContent::Formula { expression, .. } => Some(expression),
            _ => None,
        }
    }

    pub fn expression_mut(&mut self) -> Option<&mut String> {
        match &mut self.content {
            CellContent::Formula { expression, .. } => Some(expression),
            _ => None,
        }
    }

    pub fn variables(&self) -> Option<&FormulaVariables> {
        match &self.content {
            CellContent::Formula { variables, .. } => Some(variables),
            _ => None,
        }
    }

    pub fn aggregate(&self) -> Option<DbAggregate> {
        match &self.content {
            CellContent::DbValue { .. } => Some(DbAggregate::Value),
            CellContent::DbSum { .. } => Some(DbAggregate::Sum),
            CellContent::DbCount { .. } => Some(DbAggregate::Count),
            CellContent::DbAvg { .. } => Some(DbAggregate::Avg),
            CellContent::DbMin { .. } => Some(DbAggregate::Min),
            CellContent::DbMax { .. } => Some(DbAggregate::Max),
            CellContent::Text { .. } | CellContent::Formula { .. } => None,
        }
    }

    pub fn db_source(&self) -> Option<&DbSource> {
        match &self.content {
            CellContent::DbValue { source }
            | CellContent::DbSum { source }
            | CellContent::DbCount { source }
            | CellContent::DbAvg { source }
            | CellContent::DbMin { source }
            | CellContent::DbMax { source } => Some(source),
            CellContent::Text { .. } | CellContent::Formula { .. } => None,
        }
    }
}
