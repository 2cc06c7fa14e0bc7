//! FILENAME: core/parser/src/reference.rs
//! PURPOSE: The cell-reference grammar shared by the validator, the parser
//! and the template engine.
//! CONTEXT: A cell is named `cell_<rowId>_<colId>`. Row and column ids are
//! restricted to ASCII letters, digits and underscores, so a reference token
//! is `cell_` followed by a run of those characters. Since ids may contain
//! underscores themselves (`R__1700000000000`, `col_2`), the token alone does
//! not say where the row id ends; `resolve` settles it against the live ids.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Marker that starts every cell reference.
pub const CELL_PREFIX: &str = "cell_";

static CELL_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcell_[A-Za-z0-9_]+").expect("cell reference pattern is valid"));

/// Builds the canonical identifier of the cell at (row, column).
pub fn cell_id(row_id: &str, column_id: &str) -> String {
    format!("{}{}_{}", CELL_PREFIX, row_id, column_id)
}

/// Returns the part of a `cell_...` identifier after the prefix,
/// or None if `ident` is not a (non-empty) cell reference.
pub fn cell_key(ident: &str) -> Option<&str> {
    ident
        .strip_prefix(CELL_PREFIX)
        .filter(|key| !key.is_empty())
}

/// One cell-reference token found in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRefSpan {
    /// Byte offset of the `c` of `cell_`.
    pub start: usize,
    /// Byte offset one past the last character of the token.
    pub end: usize,
    /// Text after the `cell_` prefix.
    pub key: String,
}

impl CellRefSpan {
    /// The full token text, prefix included.
    pub fn text(&self) -> String {
        format!("{}{}", CELL_PREFIX, self.key)
    }
}

/// Finds every cell-reference token in `expression`, left to right.
/// Tokens are whole words: `xcell_R1_C1` is not a reference.
pub fn scan_cell_references(expression: &str) -> Vec<CellRefSpan> {
    CELL_REF_RE
        .find_iter(expression)
        .map(|m| CellRefSpan {
            start: m.start(),
            end: m.end(),
            key: m.as_str()[CELL_PREFIX.len()..].to_string(),
        })
        .collect()
}

/// Every way of cutting `key` at an underscore into a non-empty row part
/// and a non-empty column part, from the leftmost cut to the rightmost.
pub fn split_candidates(key: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
    key.char_indices()
        .filter(|&(i, ch)| ch == '_' && i > 0 && i + 1 < key.len())
        .map(move |(i, _)| (&key[..i], &key[i + 1..]))
}

/// The set of ids a formula may refer to.
pub trait ReferenceScope {
    fn has_row(&self, row_id: &str) -> bool;
    fn has_column(&self, column_id: &str) -> bool;
    /// Declared formula variables. Defaults to none.
    fn has_variable(&self, _name: &str) -> bool {
        false
    }
}

/// A reference scope backed by plain id sets.
#[derive(Debug, Clone, Default)]
pub struct IdScope {
    pub rows: HashSet<String>,
    pub columns: HashSet<String>,
    pub variables: HashSet<String>,
}

impl IdScope {
    pub fn new<R, C>(rows: R, columns: C) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        IdScope {
            rows: rows.into_iter().map(Into::into).collect(),
            columns: columns.into_iter().map(Into::into).collect(),
            variables: HashSet::new(),
        }
    }

    pub fn with_variables<V>(mut self, variables: V) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }
}

impl ReferenceScope for IdScope {
    fn has_row(&self, row_id: &str) -> bool {
        self.rows.contains(row_id)
    }

    fn has_column(&self, column_id: &str) -> bool {
        self.columns.contains(column_id)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }
}

/// Outcome of resolving a reference key against a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// Both ids exist.
    Resolved { row: &'a str, column: &'a str },
    /// The key splits, but at least one side is missing from the scope.
    Dangling {
        row: &'a str,
        column: &'a str,
        row_exists: bool,
        column_exists: bool,
    },
    /// The key has no inner underscore to split at.
    Malformed,
}

impl<'a> Resolution<'a> {
    /// Row id the reference points at, live or not.
    pub fn row(&self) -> Option<&'a str> {
        match *self {
            Resolution::Resolved { row, .. } | Resolution::Dangling { row, .. } => Some(row),
            Resolution::Malformed => None,
        }
    }

    /// Column id the reference points at, live or not.
    pub fn column(&self) -> Option<&'a str> {
        match *self {
            Resolution::Resolved { column, .. } | Resolution::Dangling { column, .. } => {
                Some(column)
            }
            Resolution::Malformed => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Splits `key` into (row id, column id) using the ids live in `scope`.
///
/// Preference order: the first cut where both sides exist; then the first
/// cut whose column exists (missing row); then the first cut whose row
/// exists (missing column); then the leftmost cut with both missing.
pub fn resolve<'a, S: ReferenceScope + ?Sized>(key: &'a str, scope: &S) -> Resolution<'a> {
    let candidates: Vec<(&str, &str)> = split_candidates(key).collect();
    let Some(&(first_row, first_column)) = candidates.first() else {
        return Resolution::Malformed;
    };

    if let Some(&(row, column)) = candidates
        .iter()
        .find(|(r, c)| scope.has_row(r) && scope.has_column(c))
    {
        return Resolution::Resolved { row, column };
    }

    if let Some(&(row, column)) = candidates.iter().find(|(_, c)| scope.has_column(c)) {
        return Resolution::Dangling {
            row,
            column,
            row_exists: false,
            column_exists: true,
        };
    }

    if let Some(&(row, column)) = candidates.iter().find(|(r, _)| scope.has_row(r)) {
        return Resolution::Dangling {
            row,
            column,
            row_exists: true,
            column_exists: false,
        };
    }

    Resolution::Dangling {
        row: first_row,
        column: first_column,
        row_exists: false,
        column_exists: false,
    }
}
