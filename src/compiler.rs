//! The compiler facade: text in, native query out.
//!
//! Sequences lexing, parsing, per-term resolution and building for a given
//! entity type and backend target. Fail-fast: the first error halts the
//! pipeline and is returned to the caller; a failed compile never degrades
//! to an always-true or always-false query.

use crate::ast::Expr;
use crate::builder::{NativeQuery, QueryBuilder, RelationalQueryBuilder, SearchIndexQueryBuilder};
use crate::config::{Backend, FieldType, QueryRegistry};
use crate::lexer::{tokenize, LexError};
use crate::parser::{ParseError, Parser};

/// The first point of failure of one compile call.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    /// No configuration is registered for the entity on this backend.
    UnknownEntity { backend: Backend, entity: String },
    /// The field exists in the grammar but not in the entity's configured set.
    UnknownField { entity: String, field: String },
    /// The literal cannot be coerced to the field's declared value type.
    TypeMismatch {
        entity: String,
        field: String,
        value: String,
        expected: FieldType,
    },
    /// The field's resolver strategy cannot serve this backend or operator.
    UnsupportedOperator {
        entity: String,
        field: String,
        message: String,
    },
    /// Sub-query expansion exceeded the nesting cap.
    DepthExceeded { limit: usize },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Lex(e) => write!(f, "lex error: {}", e),
            CompileError::Parse(e) => write!(f, "parse error: {}", e),
            CompileError::UnknownEntity { backend, entity } => {
                write!(f, "no {} configuration registered for entity '{}'", backend.name(), entity)
            }
            CompileError::UnknownField { entity, field } => {
                write!(f, "field '{}' is not configured for entity '{}'", field, entity)
            }
            CompileError::TypeMismatch { entity, field, value, expected } => write!(
                f,
                "value '{}' for field '{}.{}' is not a valid {}",
                value,
                entity,
                field,
                expected.name()
            ),
            CompileError::UnsupportedOperator { entity, field, message } => {
                write!(f, "field '{}.{}': {}", entity, field, message)
            }
            CompileError::DepthExceeded { limit } => {
                write!(f, "sub-query nesting exceeded the limit of {}", limit)
            }
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(e: LexError) -> Self {
        CompileError::Lex(e)
    }
}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

/// The public surface the surrounding application invokes.
pub struct QueryCompiler {
    registry: QueryRegistry,
}

impl QueryCompiler {
    /// Wraps a sealed registry. Registration happens-before construction,
    /// so a compiler shared across threads only ever reads.
    pub fn new(registry: QueryRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    /// Compiles query text for one entity type and backend target.
    pub fn compile(
        &self,
        entity: &str,
        text: &str,
        backend: Backend,
    ) -> Result<NativeQuery, CompileError> {
        let ast = self.parse(text)?;
        self.build(entity, &ast, backend)
    }

    /// Lexes and parses without building; useful to validate syntax alone.
    pub fn parse(&self, text: &str) -> Result<Expr, CompileError> {
        let tokens = tokenize(text)?;
        let ast = Parser::new(&tokens).parse()?;
        Ok(ast)
    }

    fn build(&self, entity: &str, ast: &Expr, backend: Backend) -> Result<NativeQuery, CompileError> {
        let Some(config) = self.registry.entity(backend, entity) else {
            return Err(CompileError::UnknownEntity { backend, entity: entity.to_string() });
        };
        match backend {
            Backend::Relational => RelationalQueryBuilder.build(ast, config, &self.registry),
            Backend::SearchIndex => SearchIndexQueryBuilder.build(ast, config, &self.registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        EntityConfiguration, FieldDescriptor, RegistryBuilder, ResolverKind,
    };
    use crate::resolver::QueryValue;
    use std::collections::HashMap;

    fn compiler() -> QueryCompiler {
        let json = r#"{
            "relational": [
                {
                    "entity": "product",
                    "prefix": "SELECT p FROM ProductImpl p",
                    "postfix": " ORDER BY p.code ASC",
                    "default_locale": "en",
                    "fields": {
                        "productCode": { "field_type": "code", "expression": "p.code" },
                        "productName": {
                            "field_type": "text",
                            "expression": "p.displayName_{locale}",
                            "resolver": { "kind": "localized" }
                        },
                        "quantity": { "field_type": "integer", "expression": "p.quantity" },
                        "skuCode": {
                            "field_type": "code",
                            "resolver": {
                                "kind": "sub_query",
                                "entity": "sku",
                                "field": "skuCode",
                                "correlation": "s.product = p"
                            }
                        }
                    }
                },
                {
                    "entity": "sku",
                    "prefix": "SELECT s FROM SkuImpl s",
                    "postfix": " ORDER BY s.code ASC",
                    "fields": {
                        "skuCode": { "field_type": "code", "expression": "s.code" }
                    }
                }
            ],
            "search_index": [
                {
                    "entity": "product",
                    "fields": {
                        "productCode": { "field_type": "code", "expression": "productCode" },
                        "quantity": { "field_type": "integer", "expression": "quantity" }
                    }
                }
            ]
        }"#;
        QueryCompiler::new(RegistryBuilder::from_json_str(json).unwrap())
    }

    #[test]
    fn test_end_to_end_relational() {
        let native = compiler()
            .compile("product", r#"productCode = "KETTLE-01""#, Backend::Relational)
            .unwrap();
        assert_eq!(
            native.query,
            "SELECT p FROM ProductImpl p WHERE p.code = ?1 ORDER BY p.code ASC"
        );
        assert_eq!(native.params, vec![QueryValue::Text("KETTLE-01".to_string())]);
    }

    #[test]
    fn test_end_to_end_search_index() {
        let native = compiler()
            .compile("product", r#"productCode = "KETTLE-01""#, Backend::SearchIndex)
            .unwrap();
        assert_eq!(native.query, "productCode:KETTLE\\-01");
        assert!(native.params.is_empty());
    }

    #[test]
    fn test_localized_field_end_to_end() {
        let native = compiler()
            .compile("product", r#"productName = "Kettle""#, Backend::Relational)
            .unwrap();
        assert!(native.query.contains("p.displayName_en = ?1"));
    }

    #[test]
    fn test_lex_error_surfaces() {
        let err = compiler().compile("product", "productCode # 1", Backend::Relational).unwrap_err();
        assert!(matches!(err, CompileError::Lex(_)));
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = compiler().compile("product", "productCode =", Backend::Relational).unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn test_unknown_entity() {
        let err = compiler().compile("warehouse", "", Backend::Relational).unwrap_err();
        assert!(matches!(err, CompileError::UnknownEntity { .. }));
    }

    #[test]
    fn test_unknown_field_never_yields_a_query() {
        let err = compiler()
            .compile("product", r#"bogus = "x""#, Backend::Relational)
            .unwrap_err();
        match err {
            CompileError::UnknownField { entity, field } => {
                assert_eq!(entity, "product");
                assert_eq!(field, "bogus");
            }
            other => panic!("expected UnknownField, got {:?}", other),
        }
    }

    #[test]
    fn test_type_mismatch_carries_context() {
        let err = compiler()
            .compile("product", r#"quantity = "abc""#, Backend::Relational)
            .unwrap_err();
        match err {
            CompileError::TypeMismatch { entity, field, value, .. } => {
                assert_eq!(entity, "product");
                assert_eq!(field, "quantity");
                assert_eq!(value, "abc");
            }
            other => panic!("expected TypeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_sub_query_field_unsupported_on_search_index() {
        // The relational configuration for skuCode has no search-index
        // counterpart, so the index side reports the field as unknown.
        let err = compiler()
            .compile("product", r#"skuCode = "SKU-1""#, Backend::SearchIndex)
            .unwrap_err();
        assert!(matches!(err, CompileError::UnknownField { .. }));
    }

    #[test]
    fn test_sub_query_resolver_on_search_index_is_unsupported() {
        let mut fields = HashMap::new();
        fields.insert(
            "skuCode".to_string(),
            FieldDescriptor {
                field_type: crate::config::FieldType::Code,
                expression: String::new(),
                resolver: ResolverKind::SubQuery {
                    entity: "sku".to_string(),
                    field: "skuCode".to_string(),
                    correlation: "s.product = p".to_string(),
                },
            },
        );
        let mut sku_fields = HashMap::new();
        sku_fields.insert(
            "skuCode".to_string(),
            FieldDescriptor {
                field_type: crate::config::FieldType::Code,
                expression: "skuCode".to_string(),
                resolver: ResolverKind::Plain,
            },
        );
        let registry = RegistryBuilder::new()
            .register(
                Backend::SearchIndex,
                EntityConfiguration {
                    entity: "product".to_string(),
                    prefix: String::new(),
                    postfix: String::new(),
                    default_locale: None,
                    fields,
                },
            )
            .register(
                Backend::SearchIndex,
                EntityConfiguration {
                    entity: "sku".to_string(),
                    prefix: String::new(),
                    postfix: String::new(),
                    default_locale: None,
                    fields: sku_fields,
                },
            )
            .build()
            .unwrap();

        let err = QueryCompiler::new(registry)
            .compile("product", r#"skuCode = "SKU-1""#, Backend::SearchIndex)
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedOperator { .. }));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = compiler();
        let text = r#"productCode = "A" AND quantity = 2 OR skuCode != "SKU-9""#;
        let first = compiler.compile("product", text, Backend::Relational).unwrap();
        let second = compiler.compile("product", text, Backend::Relational).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_precedence_matches_explicit_grouping() {
        let compiler = compiler();
        let implicit = compiler
            .compile(
                "product",
                r#"productCode = "1" AND quantity = 2 OR productCode = "3""#,
                Backend::Relational,
            )
            .unwrap();
        // AND must have bound tighter: the OR arm is the last comparison.
        assert!(implicit.query.contains("p.code = ?1 AND p.quantity = ?2 OR p.code = ?3"));
    }
}
