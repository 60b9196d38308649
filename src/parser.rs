//! The recursive-descent parser for EQL.
//!
//! Grammar, from lowest to highest precedence:
//!
//! ```text
//! query    := or_expr?                      (empty input matches everything)
//! or_expr  := and_expr (OR and_expr)*
//! and_expr := primary (AND primary)*
//! primary  := '(' or_expr ')'
//!           | term
//! term     := identifier op literal
//! op       := '=' | '!='
//! literal  := quoted string | bare literal
//! ```
//!
//! AND binds tighter than OR, so `a = "1" AND b = "2" OR c = "3"` parses as
//! `(a AND b) OR c`. Parentheses override precedence.

use crate::ast::{CompOp, Expr, Term};
use crate::token::{Span, Token, TokenKind};

/// A grammar failure: the token stream is well-lexed but malformed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    /// The span of the offending token; `None` at end of input.
    pub span: Option<Span>,
    /// The token kinds that would have been accepted here.
    pub expected: Vec<&'static str>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>, expected: Vec<&'static str>) -> Self {
        Self { message, span, expected }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(span) = self.span {
            write!(f, " at byte {}", span.start)?;
        }
        if !self.expected.is_empty() {
            write!(f, " (expected {})", self.expected.join(" or "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self { tokens, position: 0 }
    }

    /// Returns the current token without advancing.
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.position)
    }

    /// Returns the current token and advances past it.
    fn advance(&mut self) -> Option<&Token<'a>> {
        let token = self.tokens.get(self.position);
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Checks whether the current token matches the given kind.
    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(&t.kind) == std::mem::discriminant(kind))
    }

    pub fn parse(&mut self) -> Result<Expr, ParseError> {
        // Empty input is a valid "select all" query.
        if self.tokens.is_empty() {
            return Ok(Expr::MatchAll);
        }

        let expr = self.parse_or_expression()?;

        if let Some(token) = self.peek() {
            return Err(ParseError::new(
                format!("unexpected trailing {}", token.kind.describe()),
                Some(token.span),
                vec!["AND", "OR", "end of input"],
            ));
        }

        Ok(expr)
    }

    /// `and_expr (OR and_expr)*` — lowest precedence.
    fn parse_or_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and_expression()?;

        while self.match_token(&TokenKind::Or) {
            self.advance(); // consume OR
            let right = self.parse_and_expression()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// `primary (AND primary)*` — binds tighter than OR.
    fn parse_and_expression(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;

        while self.match_token(&TokenKind::And) {
            self.advance(); // consume AND
            let right = self.parse_primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }

        Ok(left)
    }

    /// A parenthesized group or a single term.
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        if self.match_token(&TokenKind::LParen) {
            self.advance(); // consume (
            let inner = self.parse_or_expression()?;
            if !self.match_token(&TokenKind::RParen) {
                let (span, found) = self.describe_current();
                return Err(ParseError::new(
                    format!("missing closing parenthesis, found {}", found),
                    span,
                    vec!["')'"],
                ));
            }
            self.advance(); // consume )
            return Ok(Expr::Group(Box::new(inner)));
        }
        if self.peek().is_none() {
            return Err(ParseError::new(
                "unexpected end of input".to_string(),
                None,
                vec!["identifier", "'('"],
            ));
        }
        self.parse_term().map(Expr::Term)
    }

    /// `identifier op literal`.
    fn parse_term(&mut self) -> Result<Term, ParseError> {
        let field = match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::Identifier(name) => (*name).to_string(),
                _ => {
                    return Err(ParseError::new(
                        format!("expected field name, found {}", token.kind.describe()),
                        Some(token.span),
                        vec!["identifier"],
                    ));
                }
            },
            None => {
                return Err(ParseError::new(
                    "expected field name, reached end of input".to_string(),
                    None,
                    vec!["identifier"],
                ));
            }
        };

        let op = match self.advance() {
            Some(token) => match token.kind {
                TokenKind::Eq => CompOp::Eq,
                TokenKind::NotEq => CompOp::NotEq,
                _ => {
                    return Err(ParseError::new(
                        format!("expected comparison operator, found {}", token.kind.describe()),
                        Some(token.span),
                        vec!["'='", "'!='"],
                    ));
                }
            },
            None => {
                return Err(ParseError::new(
                    "expected comparison operator, reached end of input".to_string(),
                    None,
                    vec!["'='", "'!='"],
                ));
            }
        };

        let value = match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::String(s) => s.clone(),
                TokenKind::Bare(s) => (*s).to_string(),
                _ => {
                    return Err(ParseError::new(
                        format!("expected literal value, found {}", token.kind.describe()),
                        Some(token.span),
                        vec!["string literal", "literal"],
                    ));
                }
            },
            None => {
                return Err(ParseError::new(
                    "expected literal value, reached end of input".to_string(),
                    None,
                    vec!["string literal", "literal"],
                ));
            }
        };

        Ok(Term { field, op, value })
    }

    /// Span and description of the current token, for diagnostics.
    fn describe_current(&self) -> (Option<Span>, &'static str) {
        match self.peek() {
            Some(token) => (Some(token.span), token.kind.describe()),
            None => (None, "end of input"),
        }
    }
}
