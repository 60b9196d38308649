//! The abstract syntax tree produced by the parser.
//!
//! The tree is immutable once built; the compiler owns it for the duration
//! of one compile call and discards it afterwards.

/// Comparison operators. Equality and inequality are the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,    // =
    NotEq, // !=
}

/// A single field comparison, the leaf of the tree.
///
/// The literal is carried as raw text; coercion to the field's declared
/// value type happens during resolution, not parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub field: String,
    pub op: CompOp,
    pub value: String,
}

/// A boolean expression over terms.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bare `field op literal` comparison.
    Term(Term),
    /// Logical conjunction. AND binds tighter than OR.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// A parenthesized group, kept explicit so the builder reproduces the
    /// source's clause structure exactly.
    Group(Box<Expr>),
    /// The root of an empty query: matches everything. Whether that is
    /// acceptable is the caller's decision, not the compiler's.
    MatchAll,
}
