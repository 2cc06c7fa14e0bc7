//! FILENAME: core/parser/src/ast.rs
//! PURPOSE: Defines the Abstract Syntax Tree (AST) for formula expressions.
//! CONTEXT: After the Lexer tokenizes a formula string, the Parser converts
//! those tokens into this tree structure. The template engine walks the
//! tree to extract cell dependencies; formulas are never evaluated here.
//!
//! SUPPORTED EXPRESSIONS:
//! - Number literals: 42, 3.5
//! - Cell references: cell_R1_C1, cell_R__1700000000000_col_2
//! - Variables: revenue, total_2024
//! - Binary operations: +, -, *, /
//! - Unary operations: - (negation)
//! - Parentheses for grouping

use crate::reference::CELL_PREFIX;

/// Represents a parsed formula expression.
#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    /// A numeric literal.
    Number(f64),

    /// A cell reference. `key` is the text after the `cell_` prefix
    /// (`R1_C1` for `cell_R1_C1`). Splitting the key into row and column
    /// ids needs the template, since both ids may contain underscores.
    CellRef { key: String },

    /// A bare identifier naming a formula variable.
    Variable(String),

    /// A binary operation: left op right (e.g., cell_R1_C1 + 5).
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },

    /// A unary operation: op operand (e.g., -5).
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
    },
}

impl Expression {
    /// Collects the keys of every cell reference in the tree, in source order.
    pub fn cell_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_cell_keys(&mut keys);
        keys
    }

    fn collect_cell_keys<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expression::CellRef { key } => out.push(key),
            Expression::BinaryOp { left, right, .. } => {
                left.collect_cell_keys(out);
                right.collect_cell_keys(out);
            }
            Expression::UnaryOp { operand, .. } => operand.collect_cell_keys(out),
            Expression::Number(_) | Expression::Variable(_) => {}
        }
    }

    /// Collects the names of every variable in the tree, in source order.
    pub fn variables(&self) -> Vec<&str> {
        match self {
            Expression::Variable(name) => vec![name.as_str()],
            Expression::BinaryOp { left, right, .. } => {
                let mut names = left.variables();
                names.extend(right.variables());
                names
            }
            Expression::UnaryOp { operand, .. } => operand.variables(),
            Expression::Number(_) | Expression::CellRef { .. } => Vec::new(),
        }
    }
}

/// Binary operators for expressions.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum BinaryOperator {
    Add,      // +
    Subtract, // -
    Multiply, // *
    Divide,   // /
}

/// Unary operators.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum UnaryOperator {
    Negate, // -
}

impl std::fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryOperator::Add => write!(f, "+"),
            BinaryOperator::Subtract => write!(f, "-"),
            BinaryOperator::Multiply => write!(f, "*"),
            BinaryOperator::Divide => write!(f, "/"),
        }
    }
}

impl std::fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryOperator::Negate => write!(f, "-"),
        }
    }
}

/// Renders the tree back to formula text with explicit parentheses
/// around every binary operation.
impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "{}", n),
            Expression::CellRef { key } => write!(f, "{}{}", CELL_PREFIX, key),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::BinaryOp { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expression::UnaryOp { op, operand } => write!(f, "{}{}", op, operand),
        }
    }
}
