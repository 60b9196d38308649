//! The token definition for the EQL grammar.

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords (case-insensitive in the source text)
    And, // "AND"
    Or,  // "OR"

    // Literals
    Identifier(&'a str),
    /// A quoted string literal with escape sequences already unfolded.
    /// Owned because `\"` and `\\` are rewritten during lexing.
    String(String),
    /// An unquoted literal: digits plus `-` and `.`, so numbers
    /// (`42`, `12.50`) and dates (`2024-01-31`) both lex as one token.
    Bare(&'a str),

    // Punctuation
    LParen, // (
    RParen, // )

    // Operators
    Eq,    // =
    NotEq, // !=

    // Special
    Illegal(char), // an unrecognized character
    /// An opening quote whose closing quote never arrived.
    UnterminatedString,
}

impl<'a> TokenKind<'a> {
    /// Short human-readable name used in parse diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Identifier(_) => "identifier",
            TokenKind::String(_) => "string literal",
            TokenKind::Bare(_) => "literal",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Eq => "'='",
            TokenKind::NotEq => "'!='",
            TokenKind::Illegal(_) => "illegal character",
            TokenKind::UnterminatedString => "unterminated string",
        }
    }
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
}
