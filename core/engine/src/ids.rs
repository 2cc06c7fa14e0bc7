//! FILENAME: core/engine/src/ids.rs
//! PURPOSE: Identifier scheme for rows, columns and generated tokens.
//! CONTEXT: Row and column ids are the vocabulary of formula references
//! (`cell_<rowId>_<colId>`), so they are restricted to letters, digits and
//! underscores and must be unique within their collection. Cell ids are
//! derived on demand with `formula_parser::cell_id` and never stored.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

pub use formula_parser::cell_id;

/// Which collection an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Row,
    Column,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Row => write!(f, "Row"),
            IdKind::Column => write!(f, "Column"),
        }
    }
}

/// Reasons a user-supplied id is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind} ID cannot be empty")]
    Empty { kind: IdKind },

    #[error("{kind} ID cannot contain spaces")]
    Whitespace { kind: IdKind },

    #[error("{kind} ID can only contain letters, numbers and underscores")]
    InvalidCharacters { kind: IdKind },

    #[error("This {kind} ID already exists: {id}")]
    Duplicate { kind: IdKind, id: String },

    #[error("{kind} ID {id} would give two cells the same id: {cell_id}")]
    AmbiguousCellId {
        kind: IdKind,
        id: String,
        cell_id: String,
    },
}

/// True when every character is an ASCII letter, digit or underscore.
pub fn is_valid_id_charset(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Checks the shape of `id` without looking at other ids.
pub fn validate_id_format(kind: IdKind, id: &str) -> Result<(), IdError> {
    if id.is_empty() {
        return Err(IdError::Empty { kind });
    }
    if id.chars().any(char::is_whitespace) {
        return Err(IdError::Whitespace { kind });
    }
    if !is_valid_id_charset(id) {
        return Err(IdError::InvalidCharacters { kind });
    }
    Ok(())
}

/// Checks the shape of `id` and that it is not already in `existing`.
pub fn validate_id<'a, I>(kind: IdKind, id: &str, existing: I) -> Result<(), IdError>
where
    I: IntoIterator<Item = &'a str>,
{
    validate_id_format(kind, id)?;
    if existing.into_iter().any(|other| other == id) {
        return Err(IdError::Duplicate {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Checks that adding `id` as a row (or column) keeps every derived cell id
/// unique. `rows` and `columns` are the ids already present, minus the one
/// being renamed. Underscores are legal in ids, so `X_Y` + `Z` and
/// `X` + `Y_Z` would otherwise both be `cell_X_Y_Z`.
pub fn check_cell_ids(kind: IdKind, id: &str, rows: &[&str], columns: &[&str]) -> Result<(), IdError> {
    let existing: HashSet<String> = rows
        .iter()
        .flat_map(|row| columns.iter().map(move |column| cell_id(row, column)))
        .collect();

    let others = match kind {
        IdKind::Row => columns,
        IdKind::Column => rows,
    };
    for other in others {
        let candidate = match kind {
            IdKind::Row => cell_id(id, other),
            IdKind::Column => cell_id(other, id),
        };
        if existing.contains(&candidate) {
            return Err(IdError::AmbiguousCellId {
                kind,
                id: id.to_string(),
                cell_id: candidate,
            });
        }
    }
    Ok(())
}

/// Two distinct (row, column) pairs that derive the same cell id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellIdCollision {
    pub cell_id: String,
    pub first: (String, String),
    pub second: (String, String),
}

/// Every cell id shared by more than one (row, column) pair. Pairs repeated
/// because of duplicate ids are not reported here.
pub fn find_cell_id_collisions<'a, R, C>(rows: R, columns: C) -> Vec<CellIdCollision>
where
    R: IntoIterator<Item = &'a str>,
    C: IntoIterator<Item = &'a str>,
{
    let columns: Vec<&str> = columns.into_iter().collect();
    let mut seen: HashMap<String, (&str, &str)> = HashMap::new();
    let mut collisions = Vec::new();

    for row in rows {
        for &column in &columns {
            let id = cell_id(row, column);
            match seen.get(&id) {
                Some(&(first_row, first_column)) => {
                    if (first_row, first_column) != (row, column) {
                        collisions.push(CellIdCollision {
                            cell_id: id,
                            first: (first_row.to_string(), first_column.to_string()),
                            second: (row.to_string(), column.to_string()),
                        });
                    }
                }
                None => {
                    seen.insert(id, (row, column));
                }
            }
        }
    }
    collisions
}

/// Produces timestamp-derived tokens that never repeat within one generator,
/// even when called several times in the same millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_token: i64,
}

impl IdGenerator {
    pub fn new() -> Self {
        IdGenerator { last_token: 0 }
    }

    /// Current unix time in milliseconds, bumped past the previous token.
    pub fn next_token(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let token = now.max(self.last_token + 1);
        self.last_token = token;
        token
    }

    /// `<prefix><token>`, skipping tokens already taken by `existing`.
    pub fn next_id<'a, I>(&mut self, prefix: &str, existing: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let taken: Vec<&str> = existing.into_iter().collect();
        loop {
            let candidate = format!("{}{}", prefix, self.next_token());
            if !taken.contains(&candidate.as_str()) {
                return candidate;
            }
        }
    }
}

/// Sequential column id: `<prefix><count + 1>`, bumped until unused.
pub fn next_column_id<'a, I>(prefix: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<&str> = existing.into_iter().collect();
    let mut n = taken.len() + 1;
    loop {
        let candidate = format!("{}{}", prefix, n);
        if !taken.contains(&candidate.as_str()) {
            return candidate;
        }
        n += 1;
    }
}
