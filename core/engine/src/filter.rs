//! FILENAME: core/engine/src/filter.rs
//! PURPOSE: Filter conditions for database-backed cells, variables and dynamic rows.
//! CONTEXT: On the wire a filter set is a map keyed by column name whose
//! values are `{ "op": <operator>, "value": <value> }`. Older documents also
//! use bare values (`{"BRANCH_CODE": "10089"}`), bare arrays, and
//! operator-keyed maps (`{"AMOUNT": {">=": 100}}`); those are accepted on
//! load and written back in the canonical form.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Comparison operators supported by the query backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FilterOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 11] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Ge,
        FilterOperator::Lt,
        FilterOperator::Le,
        FilterOperator::Like,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "=",
            FilterOperator::Ne => "!=",
            FilterOperator::Gt => ">",
            FilterOperator::Ge => ">=",
            FilterOperator::Lt => "<",
            FilterOperator::Le => "<=",
            FilterOperator::Like => "LIKE",
            FilterOperator::In => "IN",
            FilterOperator::NotIn => "NOT IN",
            FilterOperator::IsNull => "IS NULL",
            FilterOperator::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn parse(s: &str) -> Option<FilterOperator> {
        let wanted = s.trim();
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(wanted))
    }

    /// IN / NOT IN carry an array value.
    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }

    /// IS NULL / IS NOT NULL carry no value.
    pub fn takes_no_value(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    List(Vec<Value>),
    Scalar(Value),
}

impl FilterValue {
    pub fn text(s: impl Into<String>) -> Self {
        FilterValue::Scalar(Value::String(s.into()))
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FilterValue::List(items.into_iter().map(|s| Value::String(s.into())).collect())
    }

    fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FilterValue::Null,
            Value::Array(items) => FilterValue::List(items),
            other => FilterValue::Scalar(other),
        }
    }
}

/// The serialized form of one condition: `{ "op": ..., "value": ... }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub op: FilterOperator,
    pub value: FilterValue,
}

impl FilterSpec {
    /// Coerces the value into the shape the operator expects:
    /// no value for IS [NOT] NULL, an array for [NOT] IN, a scalar otherwise.
    pub fn normalized(op: FilterOperator, value: FilterValue) -> Self {
        let value = if op.takes_no_value() {
            FilterValue::Null
        } else if op.takes_list() {
            match value {
                FilterValue::List(items) => FilterValue::List(items),
                FilterValue::Null => FilterValue::List(Vec::new()),
                FilterValue::Scalar(v) => FilterValue::List(vec![v]),
            }
        } else {
            match value {
                FilterValue::Scalar(v) => FilterValue::Scalar(v),
                FilterValue::Null | FilterValue::List(_) => FilterValue::text(""),
            }
        };
        FilterSpec { op, value }
    }
}

/// One row of a filter builder: column, operator, value.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterCondition {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        FilterCondition {
            column: column.into(),
            operator,
            value,
        }
    }
}

/// Filters keyed by column name. One condition per column; inserting a
/// second condition on a column replaces the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterSpec>);

impl FilterSet {
    pub fn new() -> Self {
        FilterSet(BTreeMap::new())
    }

    pub fn from_conditions<I: IntoIterator<Item = FilterCondition>>(conditions: I) -> Self {
        let mut set = FilterSet::new();
        for condition in conditions {
            set.insert(condition);
        }
        set
    }

    pub fn insert(&mut self, condition: FilterCondition) {
        self.0.insert(
            condition.column,
            FilterSpec::normalized(condition.operator, condition.value),
        );
    }

    pub fn remove(&mut self, column: &str) -> Option<FilterSpec> {
        self.0.remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&FilterSpec> {
        self.0.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// The builder view: one condition per column, ordered by column name.
    pub fn conditions(&self) -> Vec<FilterCondition> {
        self.0
            .iter()
            .map(|(column, spec)| FilterCondition::new(column.clone(), spec.op, spec.value.clone()))
            .collect()
    }
}

impl<'de> Deserialize<'de> for FilterSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut set = FilterSet::new();
        for (column, entry) in raw {
            let (op, value) = read_entry(&column, entry).map_err(de::Error::custom)?;
            set.insert(FilterCondition::new(column, op, value));
        }
        Ok(set)
    }
}

fn read_entry(column: &str, entry: Value) -> Result<(FilterOperator, FilterValue), String> {
    let parse_op = |op: &str| {
        FilterOperator::parse(op)
            .ok_or_else(|| format!("unknown filter operator '{}' for column {}", op, column))
    };

    match entry {
        Value::Object(mut map) => {
            if let Some(op) = map.remove("op") {
                let op = op
                    .as_str()
                    .ok_or_else(|| format!("filter operator for column {} must be a string", column))?;
                let value = map.remove("value").unwrap_or(Value::Null);
                return Ok((parse_op(op)?, FilterValue::from_json(value)));
            }
            // Operator-keyed form; the last operator wins.
            let mut result = None;
            for (op, value) in map {
                result = Some((parse_op(&op)?, FilterValue::from_json(value)));
            }
            result.ok_or_else(|| format!("empty filter for column {}", column))
        }
        Value::Array(items) => Ok((FilterOperator::In, FilterValue::List(items))),
        Value::Null => Ok((FilterOperator::IsNull, FilterValue::Null)),
        scalar => Ok((FilterOperator::Eq, FilterValue::Scalar(scalar))),
    }
}
