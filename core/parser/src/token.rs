//! FILENAME: core/parser/src/token.rs
//! PURPOSE: Token definitions for the formula lexer.
//! CONTEXT: Tokens are the atomic units produced by the lexer and consumed by the parser.

/// Tokens recognized by the formula lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // Literals
    Number(f64),
    /// Bare word: a cell reference (`cell_R1_C1`) or a variable name.
    /// Case is preserved because row and column ids are case-sensitive.
    Identifier(String),

    // Operators
    Plus,
    Minus,
    Asterisk,
    Slash,

    // Delimiters
    LParen,
    RParen,

    // Special
    EOF,
    Illegal(char),
}

impl Token {
    /// True for the four arithmetic operators.
    pub fn is_operator(&self) -> bool {
        matches!(self, Token::Plus | Token::Minus | Token::Asterisk | Token::Slash)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Identifier(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Asterisk => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::EOF => write!(f, "EOF"),
            Token::Illegal(c) => write!(f, "ILLEGAL({})", c),
        }
    }
}
