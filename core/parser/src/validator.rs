//! FILENAME: core/parser/src/validator.rs
//! PURPOSE: User-facing validation of formula expressions.
//! CONTEXT: Runs on every expression edit and after every structural edit
//! that may invalidate references. All checks run; an expression can carry
//! several errors at once. Nothing is evaluated.
//!
//! CHECKS (in reporting order):
//! 1. Parenthesis balance
//! 2. Consecutive arithmetic operators (whitespace ignored)
//! 3. Leading operator other than unary minus
//! 4. Trailing operator
//! 5. Cell references whose row or column does not exist

use crate::lexer::Lexer;
use crate::reference::{resolve, scan_cell_references, Resolution, ReferenceScope, CELL_PREFIX};
use crate::token::Token;
use once_cell::sync::Lazy;
use regex::Regex;

static CONSECUTIVE_OPERATORS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[+\-*/]{2,}").expect("operator run pattern is valid"));

/// A single problem found in an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    ExtraClosingParenthesis,
    MissingClosingParenthesis,
    ConsecutiveOperators,
    LeadingOperator,
    TrailingOperator,
    MissingRow(String),
    MissingColumn(String),
    /// A `cell_` token with no row/column separator.
    MalformedReference(String),
    /// Structural error reported by the AST parser.
    Syntax(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::ExtraClosingParenthesis => write!(f, "Extra closing parenthesis"),
            ValidationError::MissingClosingParenthesis => {
                write!(f, "Missing closing parenthesis")
            }
            ValidationError::ConsecutiveOperators => {
                write!(f, "Consecutive operators are not allowed")
            }
            ValidationError::LeadingOperator => {
                write!(f, "Expression cannot start with an operator")
            }
            ValidationError::TrailingOperator => {
                write!(f, "Expression cannot end with an operator")
            }
            ValidationError::MissingRow(id) => write!(f, "Row {} does not exist", id),
            ValidationError::MissingColumn(id) => write!(f, "Column {} does not exist", id),
            ValidationError::MalformedReference(text) => {
                write!(f, "Invalid cell reference: {}", text)
            }
            ValidationError::Syntax(message) => write!(f, "Syntax error: {}", message),
        }
    }
}

impl ValidationError {
    /// True for errors about references that point at nothing.
    pub fn is_reference_error(&self) -> bool {
        matches!(
            self,
            ValidationError::MissingRow(_)
                | ValidationError::MissingColumn(_)
                | ValidationError::MalformedReference(_)
        )
    }
}

/// Validates `expression` against the ids in `scope`.
/// Returns an empty list when the expression is valid.
pub fn validate_expression<S: ReferenceScope + ?Sized>(
    expression: &str,
    scope: &S,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    check_parentheses(expression, &mut errors);

    let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
    if CONSECUTIVE_OPERATORS_RE.is_match(&compact) {
        errors.push(ValidationError::ConsecutiveOperators);
    }

    let trimmed = expression.trim();
    if trimmed.starts_with(['+', '*', '/']) {
        errors.push(ValidationError::LeadingOperator);
    }
    if trimmed.ends_with(['+', '-', '*', '/']) {
        errors.push(ValidationError::TrailingOperator);
    }

    check_references(expression, scope, &mut errors);

    errors
}

fn check_parentheses(expression: &str, errors: &mut Vec<ValidationError>) {
    let mut depth: i64 = 0;
    for ch in expression.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    errors.push(ValidationError::ExtraClosingParenthesis);
                    return;
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        errors.push(ValidationError::MissingClosingParenthesis);
    }
}

fn check_references<S: ReferenceScope + ?Sized>(
    expression: &str,
    scope: &S,
    errors: &mut Vec<ValidationError>,
) {
    for span in scan_cell_references(expression) {
        match resolve(&span.key, scope) {
            Resolution::Resolved { .. } => {}
            Resolution::Dangling {
                row,
                column,
                row_exists,
                column_exists,
            } => {
                if !row_exists {
                    push_unique(errors, ValidationError::MissingRow(row.to_string()));
                }
                if !column_exists {
                    push_unique(errors, ValidationError::MissingColumn(column.to_string()));
                }
            }
            Resolution::Malformed => {
                push_unique(errors, ValidationError::MalformedReference(span.text()));
            }
        }
    }
}

fn push_unique(errors: &mut Vec<ValidationError>, error: ValidationError) {
    if !errors.contains(&error) {
        errors.push(error);
    }
}

/// Bare identifiers that are neither cell references nor declared variables.
/// Not part of `validate_expression`: unknown names are left for evaluation time.
pub fn undeclared_identifiers<S: ReferenceScope + ?Sized>(
    expression: &str,
    scope: &S,
) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for token in Lexer::new(expression).tokenize() {
        if let Token::Identifier(name) = token {
            if name.starts_with(CELL_PREFIX) || scope.has_variable(&name) {
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Runs the AST parser and converts its failure into a validation error.
/// Meant to run after `validate_expression` reported nothing.
pub fn check_syntax(expression: &str) -> Option<ValidationError> {
    if expression.trim().is_empty() {
        return None;
    }
    crate::parser::parse(expression)
        .err()
        .map(|e| ValidationError::Syntax(e.message))
}
