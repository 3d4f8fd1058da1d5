//! The token definition for the filter statement language.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    Select, // "SELECT"
    From,   // "FROM"
    Where,  // "WHERE"
    And,    // "AND"
    Or,     // "OR"
    Not,    // "NOT"
    In,     // "IN"
    Is,     // "IS"
    Like,   // "LIKE"
    Null,   // "NULL"
    True,   // "TRUE"
    False,  // "FALSE"

    // Literals
    Identifier(&'a str),
    String(&'a str), // The raw string, including quotes
    Number(&'a str), // The raw digits, possibly with a fraction

    // Punctuation
    LParen,    // (
    RParen,    // )
    Comma,     // ,
    Semicolon, // ;
    Star,      // *
    Dot,       // .
    Dash,      // -

    // Operators
    Eq,    // =
    NotEq, // != or <>
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Special
    Illegal, // An illegal/unknown character, or an unterminated string
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Moves the span back by `offset` bytes, clamping at zero.
    pub fn shift_back(self, offset: usize) -> Self {
        Self {
            start: self.start.saturating_sub(offset),
            end: self.end.saturating_sub(offset),
        }
    }
}
