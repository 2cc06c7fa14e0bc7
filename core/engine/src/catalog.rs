//! FILENAME: core/engine/src/catalog.rs
//! PURPOSE: The allowed-tables catalog served by the config API.
//! CONTEXT: Decides which tables and columns a DB cell, a dynamic row or a
//! filter may use, and which aggregate cell types a column permits.

use crate::cell::DbAggregate;
use serde::{Deserialize, Serialize};

/// `"Y"` / `"N"` flag as sent by the config API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "Y")]
    Yes,
    #[default]
    #[serde(rename = "N")]
    No,
}

impl Flag {
    pub fn is_set(&self) -> bool {
        *self == Flag::Yes
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableColumn {
    #[serde(default)]
    pub column_id: i64,
    pub column_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub selectable: Flag,
    #[serde(default)]
    pub filterable: Flag,
    /// Comma-separated aggregate function names, e.g. `"SUM,COUNT,AVG"`.
    #[serde(default)]
    pub agg_funcs: String,
}

impl TableColumn {
    pub fn aggregates(&self) -> Vec<DbAggregate> {
        self.agg_funcs
            .split(',')
            .filter_map(DbAggregate::from_function_name)
            .collect()
    }

    /// DB_VALUE is always allowed; the others only when listed.
    pub fn allows(&self, aggregate: DbAggregate) -> bool {
        aggregate == DbAggregate::Value || self.aggregates().contains(&aggregate)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableConfig {
    #[serde(default)]
    pub table_id: i64,
    pub table_name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub columns: Vec<TableColumn>,
}

impl TableConfig {
    pub fn column(&self, column_name: &str) -> Option<&TableColumn> {
        self.columns.iter().find(|c| c.column_name == column_name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableCatalog {
    pub tables: Vec<TableConfig>,
}

impl TableCatalog {
    pub fn new(tables: Vec<TableConfig>) -> Self {
        TableCatalog { tables }
    }

    pub fn table(&self, table_name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|t| t.table_name == table_name)
    }

    pub fn has_table(&self, table_name: &str) -> bool {
        self.table(table_name).is_some()
    }

    pub fn selectable_columns(&self, table_name: &str) -> Vec<&TableColumn> {
        self.table(table_name)
            .map(|t| t.columns.iter().filter(|c| c.selectable.is_set()).collect())
            .unwrap_or_default()
    }

    pub fn filterable_columns(&self, table_name: &str) -> Vec<&TableColumn> {
        self.table(table_name)
            .map(|t| t.columns.iter().filter(|c| c.filterable.is_set()).collect())
            .unwrap_or_default()
    }

    /// Aggregate cell types legal for `table.column`, DB_VALUE first.
    /// Empty when the column is unknown.
    pub fn allowed_aggregates(&self, table_name: &str, column_name: &str) -> Vec<DbAggregate> {
        match self.table(table_name).and_then(|t| t.column(column_name)) {
            Some(column) => DbAggregate::ALL
                .into_iter()
                .filter(|agg| column.allows(*agg))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_aggregate_allowed(&self, table_name: &str, column_name: &str, aggregate: DbAggregate) -> bool {
        self.allowed_aggregates(table_name, column_name)
            .contains(&aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> TableCatalog {
        serde_json::from_value(json!([
            {
                "tableId": 1060,
                "tableName": "GL_BALANCE",
                "label": "GL Balance",
                "columns": [
                    {"columnId": 1061, "columnName": "BRANCH_CODE", "label": "Branch Code", "dataType": null,
                     "selectable": "Y", "filterable": "Y", "aggFuncs": "COUNT"},
                    {"columnId": 1063, "columnName": "BALANCE_DATE", "label": "Balance Date", "dataType": null,
                     "selectable": "N", "filterable": "Y", "aggFuncs": ""},
                    {"columnId": 1066, "columnName": "AMOUNT", "label": "Amount", "dataType": null,
                     "selectable": "Y", "filterable": "N", "aggFuncs": "SUM,COUNT,AVG,MIN,MAX"}
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_selectable_and_filterable_columns() {
        let catalog = catalog();
        let selectable: Vec<&str> = catalog
            .selectable_columns("GL_BALANCE")
            .iter()
            .map(|c| c.column_name.as_str())
            .collect();
        assert_eq!(selectable, vec!["BRANCH_CODE", "AMOUNT"]);
        assert_eq!(catalog.filterable_columns("GL_BALANCE").len(), 2);
        assert!(catalog.selectable_columns("MISSING").is_empty());
    }

    #[test]
    fn test_allowed_aggregates_follow_agg_funcs() {
        let catalog = catalog();
        assert_eq!(
            catalog.allowed_aggregates("GL_BALANCE", "BRANCH_CODE"),
            vec![DbAggregate::Value, DbAggregate::Count]
        );
        assert_eq!(
            catalog.allowed_aggregates("GL_BALANCE", "BALANCE_DATE"),
            vec![DbAggregate::Value]
        );
        assert!(catalog.is_aggregate_allowed("GL_BALANCE", "AMOUNT", DbAggregate::Max));
        assert!(!catalog.is_aggregate_allowed("GL_BALANCE", "BRANCH_CODE", DbAggregate::Sum));
        assert!(catalog.allowed_aggregates("GL_BALANCE", "NOPE").is_empty());
    }
}
