//! FILENAME: core/engine/src/variant.rs
//! PURPOSE: Report variants: named parameter sets with filter rules.
//! CONTEXT: A variant is layered on top of a template at run time. Each
//! filter rule binds a parameter to a db column, scoped to every table,
//! one table, or one dynamic row.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Variant {
    pub variant_code: String,
    pub variant_name: String,
    pub description: String,
    pub params: Vec<Param>,
    pub filter_rules: Vec<FilterRule>,
}

impl Variant {
    pub fn new(code: &str, name: impl Into<String>) -> Self {
        Variant {
            variant_code: normalize_variant_code(code),
            variant_name: name.into(),
            ..Variant::default()
        }
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.param_name == name)
    }
}

/// Variant codes are upper-case with underscores in place of whitespace.
pub fn normalize_variant_code(code: &str) -> String {
    code.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_uppercase()
}

/// Parameter names never contain whitespace.
pub fn normalize_param_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ParamType {
    #[default]
    String,
    Date,
    Number,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Param {
    pub param_name: String,
    pub label: String,
    pub param_type: ParamType,
    pub required: bool,
    pub multi_valued: bool,
    pub ui_hint: String,
}

impl Param {
    pub fn new(name: &str, param_type: ParamType) -> Self {
        Param {
            param_name: normalize_param_name(name),
            label: name.trim().to_string(),
            param_type,
            ..Param::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeType {
    #[default]
    AllDb,
    Table,
    DynamicTable,
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeType::AllDb => write!(f, "ALL_DB"),
            ScopeType::Table => write!(f, "TABLE"),
            ScopeType::DynamicTable => write!(f, "DYNAMIC_TABLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterRule {
    #[serde(default)]
    pub scope_type: ScopeType,
    /// Table name for TABLE, dynamic row id for DYNAMIC_TABLE.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_value: Option<String>,
    #[serde(default)]
    pub param_name: String,
    #[serde(default)]
    pub db_column: String,
    #[serde(default = "default_rule_operator")]
    pub operator: String,
}

fn default_rule_operator() -> String {
    "=".to_string()
}

impl FilterRule {
    pub fn scope_value(&self) -> Option<&str> {
        self.scope_value.as_deref().filter(|v| !v.trim().is_empty())
    }
}
