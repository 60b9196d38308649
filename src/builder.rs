//! Query builders: assembling resolved terms into a final native query.
//!
//! Two interchangeable builders exist, one per backend. Both walk the AST
//! depth-first, preserve its boolean structure exactly, and wrap the
//! assembled clause with the entity configuration's prefix and postfix.
//! Neither holds state across calls; a build is a pure function of the AST
//! and the registry.

use crate::ast::{CompOp, Expr, Term};
use crate::compiler::CompileError;
use crate::config::{Backend, EntityConfiguration, QueryRegistry};
use crate::resolver::{resolve_term, QueryValue, Resolution, ResolvedField};

/// Hard cap on sub-query nesting. Registry validation already rejects
/// cyclic entity references, so this only guards pathological but acyclic
/// configuration chains.
pub const MAX_SUBQUERY_DEPTH: usize = 8;

/// The backend-targeted compiled output.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeQuery {
    pub backend: Backend,
    /// The finished query text, prefix and ordering postfix included.
    pub query: String,
    /// Positional bound parameters (`?1` binds `params[0]`). Always empty
    /// for the search-index backend, which inlines its literals.
    pub params: Vec<QueryValue>,
}

/// A backend-specific assembly strategy.
pub trait QueryBuilder {
    fn build(
        &self,
        root: &Expr,
        config: &EntityConfiguration,
        registry: &QueryRegistry,
    ) -> Result<NativeQuery, CompileError>;
}

/// Which boolean operator a node sits under, for parenthesization.
#[derive(Clone, Copy, PartialEq)]
enum ParentOp {
    None,
    And,
    Or,
}

/// Targets the relational backend: parameterized query text in the
/// configuration's object-query dialect, positional `?N` markers.
pub struct RelationalQueryBuilder;

impl QueryBuilder for RelationalQueryBuilder {
    fn build(
        &self,
        root: &Expr,
        config: &EntityConfiguration,
        registry: &QueryRegistry,
    ) -> Result<NativeQuery, CompileError> {
        let mut params = Vec::new();
        let query = match root {
            Expr::MatchAll => format!("{}{}", config.prefix, config.postfix),
            _ => {
                let clause = self.render(root, ParentOp::None, config, registry, &mut params, 0)?;
                format!("{} WHERE {}{}", config.prefix, clause, config.postfix)
            }
        };
        Ok(NativeQuery { backend: Backend::Relational, query, params })
    }
}

impl RelationalQueryBuilder {
    fn render(
        &self,
        expr: &Expr,
        parent: ParentOp,
        config: &EntityConfiguration,
        registry: &QueryRegistry,
        params: &mut Vec<QueryValue>,
        depth: usize,
    ) -> Result<String, CompileError> {
        match expr {
            Expr::Term(term) => self.render_term(term, config, registry, params, depth),
            Expr::And(left, right) => {
                // AND binds tighter than OR natively, so an AND child never
                // needs parentheses to keep its meaning.
                Ok(format!(
                    "{} AND {}",
                    self.render(left, ParentOp::And, config, registry, params, depth)?,
                    self.render(right, ParentOp::And, config, registry, params, depth)?,
                ))
            }
            Expr::Or(left, right) => {
                let rendered = format!(
                    "{} OR {}",
                    self.render(left, ParentOp::Or, config, registry, params, depth)?,
                    self.render(right, ParentOp::Or, config, registry, params, depth)?,
                );
                // An OR under an AND would rebind without parentheses.
                Ok(if parent == ParentOp::And { format!("({})", rendered) } else { rendered })
            }
            Expr::Group(inner) => {
                let rendered =
                    self.render(inner, ParentOp::None, config, registry, params, depth)?;
                Ok(format!("({})", rendered))
            }
            // The parser only produces MatchAll as a root.
            Expr::MatchAll => Ok(String::new()),
        }
    }

    fn render_term(
        &self,
        term: &Term,
        config: &EntityConfiguration,
        registry: &QueryRegistry,
        params: &mut Vec<QueryValue>,
        depth: usize,
    ) -> Result<String, CompileError> {
        match resolve_term(term, config)? {
            Resolution::Field(resolved) => Ok(self.render_comparison(term.op, resolved, params)),
            Resolution::SubQuery { entity, field, correlation } => {
                if depth >= MAX_SUBQUERY_DEPTH {
                    return Err(CompileError::DepthExceeded { limit: MAX_SUBQUERY_DEPTH });
                }
                let Some(related) = registry.entity(Backend::Relational, &entity) else {
                    return Err(CompileError::UnknownEntity {
                        backend: Backend::Relational,
                        entity,
                    });
                };
                // The inner predicate is always the positive comparison;
                // inequality negates the existential wrapper instead.
                let inner_term =
                    Term { field, op: CompOp::Eq, value: term.value.clone() };
                let inner =
                    self.render_term(&inner_term, related, registry, params, depth + 1)?;
                let wrapper = match term.op {
                    CompOp::Eq => "EXISTS",
                    CompOp::NotEq => "NOT EXISTS",
                };
                // No postfix inside the nested query; ordering belongs to
                // the outer statement only.
                Ok(format!(
                    "{} ({} WHERE {} AND {})",
                    wrapper, related.prefix, correlation, inner
                ))
            }
        }
    }

    fn render_comparison(
        &self,
        op: CompOp,
        resolved: ResolvedField,
        params: &mut Vec<QueryValue>,
    ) -> String {
        params.push(resolved.value);
        let comparator = match op {
            CompOp::Eq => "=",
            CompOp::NotEq => "<>",
        };
        format!("{} {} ?{}", resolved.expression, comparator, params.len())
    }
}

/// Targets the search-index backend: a structured boolean query with
/// literals inlined and escaped, no external parameters.
pub struct SearchIndexQueryBuilder;

impl QueryBuilder for SearchIndexQueryBuilder {
    fn build(
        &self,
        root: &Expr,
        config: &EntityConfiguration,
        _registry: &QueryRegistry,
    ) -> Result<NativeQuery, CompileError> {
        let clause = match root {
            Expr::MatchAll => "*:*".to_string(),
            _ => self.render(root, ParentOp::None, config)?,
        };
        Ok(NativeQuery {
            backend: Backend::SearchIndex,
            query: format!("{}{}{}", config.prefix, clause, config.postfix),
            params: Vec::new(),
        })
    }
}

impl SearchIndexQueryBuilder {
    fn render(
        &self,
        expr: &Expr,
        parent: ParentOp,
        config: &EntityConfiguration,
    ) -> Result<String, CompileError> {
        match expr {
            Expr::Term(term) => self.render_term(term, config),
            Expr::And(left, right) => Ok(format!(
                "{} AND {}",
                self.render(left, ParentOp::And, config)?,
                self.render(right, ParentOp::And, config)?,
            )),
            Expr::Or(left, right) => {
                let rendered = format!(
                    "{} OR {}",
                    self.render(left, ParentOp::Or, config)?,
                    self.render(right, ParentOp::Or, config)?,
                );
                Ok(if parent == ParentOp::And { format!("({})", rendered) } else { rendered })
            }
            Expr::Group(inner) => {
                Ok(format!("({})", self.render(inner, ParentOp::None, config)?))
            }
            Expr::MatchAll => Ok("*:*".to_string()),
        }
    }

    fn render_term(
        &self,
        term: &Term,
        config: &EntityConfiguration,
    ) -> Result<String, CompileError> {
        match resolve_term(term, config)? {
            Resolution::Field(resolved) => {
                let value = render_index_value(&resolved.value);
                let positive = format!("{}:{}", resolved.expression, value);
                Ok(match term.op {
                    CompOp::Eq => positive,
                    // Negation marker wraps the positive clause.
                    CompOp::NotEq => format!("-({})", positive),
                })
            }
            Resolution::SubQuery { .. } => Err(CompileError::UnsupportedOperator {
                entity: config.entity.clone(),
                field: term.field.clone(),
                message: "sub-query fields cannot be compiled for the search index".to_string(),
            }),
        }
    }
}

/// Inlines a value into index query syntax. Every rendering goes through
/// escaping: dates and negative numbers carry hyphens, which the index
/// treats as an operator after `field:`.
fn render_index_value(value: &QueryValue) -> String {
    escape_index_text(&value.to_string())
}

/// Backslash-escapes the index's special characters and embedded
/// whitespace so a literal can never change the query structure.
fn escape_index_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '+' | '-' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~' | '*' | '?'
            | ':' | '/' | '\\' | '&' | '|' => {
                escaped.push('\\');
                escaped.push(c);
            }
            c if c.is_whitespace() => {
                escaped.push('\\');
                escaped.push(c);
            }
            c => escaped.push(c),
        }
    }
    escaped
}
