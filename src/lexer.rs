//! The lexer for EQL query text.

use crate::token::{Span, Token, TokenKind};

/// A lexing failure: the character stream itself is malformed.
#[derive(Debug, Clone, PartialEq)]
pub enum LexError {
    /// A character outside the grammar was encountered.
    UnexpectedChar { position: usize, unexpected: char },
    /// A quoted literal was opened but never closed.
    UnterminatedString { position: usize },
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexError::UnexpectedChar { position, unexpected } => {
                write!(f, "unexpected character '{}' at byte {}", unexpected, position)
            }
            LexError::UnterminatedString { position } => {
                write!(f, "unterminated string literal starting at byte {}", position)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Tokenizes the whole input, failing on the first malformed character.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut tokens = Vec::new();
    for token in Lexer::new(input) {
        match token.kind {
            TokenKind::Illegal(c) => {
                return Err(LexError::UnexpectedChar { position: token.span.start, unexpected: c });
            }
            TokenKind::UnterminatedString => {
                return Err(LexError::UnterminatedString { position: token.span.start });
            }
            _ => tokens.push(token),
        }
    }
    Ok(tokens)
}

pub struct Lexer<'a> {
    input: &'a str,
    /// Current position in the input (byte index).
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Returns the character at the current position without advancing.
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// Returns the character after the current one without advancing.
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// Advances one character and returns it.
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Reads an unquoted literal: digits with embedded `-` and `.`,
    /// covering integers, decimals and ISO dates alike. The raw text is
    /// kept; typing happens later against the field configuration.
    fn read_bare(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '-' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        Token {
            kind: TokenKind::Bare(&self.input[start..self.position]),
            span: Span::new(start, self.position),
        }
    }

    /// Reads a double-quoted string literal, unfolding `\"` and `\\`.
    /// The opening quote has already been consumed by the caller.
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let mut content = String::new();
        loop {
            match self.peek() {
                None => {
                    return Token {
                        kind: TokenKind::UnterminatedString,
                        span: Span::new(start, self.position),
                    };
                }
                Some('"') => {
                    self.bump(); // closing quote
                    break;
                }
                Some('\\') => {
                    // Only quote and backslash escapes exist; anything else
                    // keeps the backslash verbatim.
                    match self.peek_next() {
                        Some(c @ ('"' | '\\')) => {
                            self.bump();
                            self.bump();
                            content.push(c);
                        }
                        _ => {
                            self.bump();
                            content.push('\\');
                        }
                    }
                }
                Some(c) => {
                    self.bump();
                    content.push(c);
                }
            }
        }
        Token {
            kind: TokenKind::String(content),
            span: Span::new(start, self.position),
        }
    }

    /// Reads an identifier or keyword. Identifiers are case-sensitive and
    /// may contain ASCII letters, digits and underscores.
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.position];
        let kind = match_keyword(literal);
        Token { kind, span: Span::new(start, self.position) }
    }
}

/// Keywords are case-insensitive; everything else is a field identifier.
fn match_keyword(s: &str) -> TokenKind<'_> {
    if s.eq_ignore_ascii_case("and") {
        TokenKind::And
    } else if s.eq_ignore_ascii_case("or") {
        TokenKind::Or
    } else {
        TokenKind::Identifier(s)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // end of input
        };

        let token = match c {
            '=' => Token { kind: TokenKind::Eq, span: Span::new(start, self.position) },
            '(' => Token { kind: TokenKind::LParen, span: Span::new(start, self.position) },
            ')' => Token { kind: TokenKind::RParen, span: Span::new(start, self.position) },
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Token { kind: TokenKind::NotEq, span: Span::new(start, self.position) }
                } else {
                    Token { kind: TokenKind::Illegal('!'), span: Span::new(start, self.position) }
                }
            }
            '"' => self.read_string(start),
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_bare(start),
            c if c.is_ascii_digit() => self.read_bare(start),
            c if c.is_ascii_alphabetic() => self.read_identifier(start),
            c => Token { kind: TokenKind::Illegal(c), span: Span::new(start, self.position) },
        };
        Some(token)
    }
}
