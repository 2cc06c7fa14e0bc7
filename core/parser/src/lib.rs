//! FILENAME: core/parser/src/lib.rs
//! PURPOSE: Library root for the report template formula parser.
//! CONTEXT: This crate knows the formula language and the cell-reference
//! grammar, but nothing about the template document. The set of live ids is
//! supplied through the `ReferenceScope` trait.
//!
//! PIPELINE: Formula String --> Lexer --> Tokens --> Parser --> AST
//!           Formula String --> Validator --> Vec<ValidationError>
//!
//! SUPPORTED FEATURES:
//! - Arithmetic: +, -, *, /
//! - Cell references: cell_<rowId>_<colId>
//! - Variables: bare identifiers
//! - Parentheses for grouping
//! - Unary negation: -5

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod reference;
pub mod token;
pub mod validator;


// Re-export commonly used types for convenience
pub use ast::{BinaryOperator, Expression, UnaryOperator};
pub use lexer::Lexer;
pub use parser::{parse, ParseError, ParseResult, Parser};
pub use reference::{
    cell_id, cell_key, resolve, scan_cell_references, split_candidates, CellRefSpan, IdScope,
    ReferenceScope, Resolution, CELL_PREFIX,
};
pub use token::Token;
pub use validator::{check_syntax, undeclared_identifiers, validate_expression, ValidationError};
