//! FILENAME: core/parser/src/parser.rs
//! PURPOSE: Turns a formula expression into an `Expression` tree.
//! CONTEXT: Second stage after the lexer. The validator in `validator.rs`
//! performs the user-facing checks; `check_syntax` runs this parser to catch
//! shapes the validator lets through (two operands with no operator, `()`).
//!
//! GRAMMAR:
//!   expression     --> additive
//!   additive       --> multiplicative ( ("+" | "-") multiplicative )*
//!   multiplicative --> unary ( ("*" | "/") unary )*
//!   unary          --> "-" unary | primary
//!   primary        --> NUMBER | cell_reference | variable | "(" expression ")"
//!   cell_reference --> IDENTIFIER   // starting with "cell_"
//!   variable       --> IDENTIFIER

use crate::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::lexer::Lexer;
use crate::reference::{cell_key, CELL_PREFIX};
use crate::token::Token;

/// Why an expression failed to parse.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        ParseError {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

pub type ParseResult<T> = Result<T, ParseError>;

/// One-token-lookahead parser over a `Lexer`.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    /// Primes the lookahead with the first token.
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::EOF {
            return Err(ParseError::new("Empty expression"));
        }

        let expr = self.parse_expression()?;

        // Trailing tokens mean two operands with no operator between them.
        if self.current_token != Token::EOF {
            return Err(ParseError::new(format!(
                "Unexpected token after expression: {}",
                self.current_token
            )));
        }

        Ok(expr)
    }

    fn advance(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Consumes `expected` or fails naming what was found instead.
    fn expect(&mut self, expected: Token) -> ParseResult<()> {
        if self.current_token == expected {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::new(format!(
                "Expected {}, found {}",
                expected, self.current_token
            )))
        }
    }

    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match &self.current_token {
                Token::Plus => BinaryOperator::Add,
                Token::Minus => BinaryOperator::Subtract,
                _ => break,
            };

            self.advance();
            let right = self.parse_multiplicative()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match &self.current_token {
                Token::Asterisk => BinaryOperator::Multiply,
                Token::Slash => BinaryOperator::Divide,
                _ => break,
            };

            self.advance();
            let right = self.parse_unary()?;

            left = Expression::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Only minus is a prefix operator.
    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.current_token == Token::Minus {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expression::UnaryOp {
                op: UnaryOperator::Negate,
                operand: Box::new(operand),
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        match self.current_token.clone() {
            Token::Number(n) => {
                self.advance();
                Ok(Expression::Number(n))
            }

            Token::Identifier(name) => {
                self.advance();
                if name.starts_with(CELL_PREFIX) {
                    return match cell_key(&name) {
                        Some(key) => Ok(Expression::CellRef {
                            key: key.to_string(),
                        }),
                        None => Err(ParseError::new(format!(
                            "Incomplete cell reference: {}",
                            name
                        ))),
                    };
                }
                Ok(Expression::Variable(name))
            }

            Token::LParen => {
                self.advance();
                if self.current_token == Token::RParen {
                    return Err(ParseError::new("Empty parentheses"));
                }
                let expr = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::EOF => Err(ParseError::new("Unexpected end of expression")),

            Token::Illegal(ch) => Err(ParseError::new(format!("Illegal character: {}", ch))),

            token => Err(ParseError::new(format!("Unexpected token: {}", token))),
        }
    }
}

/// Parses a whole expression.
pub fn parse(input: &str) -> ParseResult<Expression> {
    let mut parser = Parser::new(input);
    parser.parse()
}
