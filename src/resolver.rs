//! Field resolution: turning a parsed term into a backend-native fragment.
//!
//! A term's literal arrives as raw text. Resolution looks the field up in
//! the entity configuration, normalizes the literal to the field's declared
//! value type and substitutes the locale where the strategy calls for it.
//! Sub-query fields are not rendered here; the resolver hands the pieces
//! back so the builder can expand them recursively.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::ast::Term;
use crate::compiler::CompileError;
use crate::config::{EntityConfiguration, FieldType, ResolverKind};

/// A literal normalized to its field's declared value type.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Text(String),
    Int(i32),
    Long(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl std::fmt::Display for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryValue::Text(s) => write!(f, "{}", s),
            QueryValue::Int(n) => write!(f, "{}", n),
            QueryValue::Long(n) => write!(f, "{}", n),
            QueryValue::Decimal(d) => write!(f, "{}", d),
            QueryValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A flat field comparison ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    /// Backend-native expression, locale already substituted.
    pub expression: String,
    pub value: QueryValue,
}

/// The outcome of resolving one term.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// A flat comparison against a single field expression.
    Field(ResolvedField),
    /// The comparison must be expanded into an existential predicate
    /// against a related entity; the builder performs the expansion.
    SubQuery {
        entity: String,
        field: String,
        correlation: String,
    },
}

/// Resolves a term against the active entity configuration.
pub fn resolve_term(
    term: &Term,
    config: &EntityConfiguration,
) -> Result<Resolution, CompileError> {
    let Some(descriptor) = config.field(&term.field) else {
        return Err(CompileError::UnknownField {
            entity: config.entity.clone(),
            field: term.field.clone(),
        });
    };

    match &descriptor.resolver {
        ResolverKind::Plain | ResolverKind::NonLocalized => {
            let value = normalize(term, config, descriptor.field_type)?;
            Ok(Resolution::Field(ResolvedField {
                expression: descriptor.expression.clone(),
                value,
            }))
        }
        ResolverKind::Localized => {
            // Registry validation guarantees the placeholder and the locale
            // are both present.
            let locale = config.default_locale.as_deref().unwrap_or_default();
            let value = normalize(term, config, descriptor.field_type)?;
            Ok(Resolution::Field(ResolvedField {
                expression: descriptor.expression.replace("{locale}", locale),
                value,
            }))
        }
        ResolverKind::SubQuery { entity, field, correlation } => Ok(Resolution::SubQuery {
            entity: entity.clone(),
            field: field.clone(),
            correlation: correlation.clone(),
        }),
    }
}

/// Coerces the raw literal to the declared value type.
fn normalize(
    term: &Term,
    config: &EntityConfiguration,
    field_type: FieldType,
) -> Result<QueryValue, CompileError> {
    let raw = term.value.as_str();
    let mismatch = || CompileError::TypeMismatch {
        entity: config.entity.clone(),
        field: term.field.clone(),
        value: raw.to_string(),
        expected: field_type,
    };

    match field_type {
        FieldType::Text => Ok(QueryValue::Text(raw.to_string())),
        FieldType::Code => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.contains(char::is_whitespace) {
                return Err(mismatch());
            }
            Ok(QueryValue::Text(trimmed.to_string()))
        }
        FieldType::Integer => raw.parse::<i32>().map(QueryValue::Int).map_err(|_| mismatch()),
        FieldType::Long => raw.parse::<i64>().map(QueryValue::Long).map_err(|_| mismatch()),
        FieldType::Decimal => {
            Decimal::from_str(raw).map(QueryValue::Decimal).map_err(|_| mismatch())
        }
        FieldType::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(QueryValue::Date)
            .map_err(|_| mismatch()),
    }
}
