//! Per-entity-type query configuration and the registry holding it.
//!
//! Configurations are data, not code: the surrounding application declares
//! one [`EntityConfiguration`] per (backend, entity type) pair, usually from
//! a JSON document, and the registry is sealed by [`RegistryBuilder::build`]
//! before the first compile call. After that it is read-only and safe for
//! unsynchronized concurrent reads.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// A registry construction error. Raised while the configuration is being
/// declared or validated, never during a compile call.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

/// The backend a compiled query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Parameterized object-query text with a positional parameter list.
    Relational,
    /// Inlined, escaped boolean query for the full-text index.
    SearchIndex,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Relational => "relational",
            Backend::SearchIndex => "search_index",
        }
    }
}

/// The declared value type of a logical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Long,
    Decimal,
    Date,
    /// An enum-like code: a single token without whitespace.
    Code,
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Long => "long",
            FieldType::Decimal => "decimal",
            FieldType::Date => "date",
            FieldType::Code => "code",
        }
    }
}

/// The resolution strategy for a field, dispatched at resolve time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverKind {
    /// The expression template is used verbatim.
    Plain,
    /// The expression's `{locale}` placeholder is substituted with the
    /// entity configuration's default locale; the comparison targets the
    /// locale-specific stored value.
    Localized,
    /// The field has locale-variant storage but the comparison targets the
    /// canonical value. Renders like `Plain`; exists as a declared marker
    /// and is restricted to text-shaped fields.
    NonLocalized,
    /// The comparison expands into an existential predicate against a
    /// related entity: the term is rebuilt against `field` of `entity` and
    /// compiled recursively, correlated to the outer query by `correlation`.
    SubQuery {
        entity: String,
        field: String,
        correlation: String,
    },
}

/// Per (entity type, logical field name) declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub field_type: FieldType,
    /// The backend-native expression referencing this field, e.g.
    /// `p.code` for the relational backend or `productCode` for the index.
    /// Unused (and conventionally empty) for sub-query fields.
    #[serde(default)]
    pub expression: String,
    #[serde(default = "default_resolver")]
    pub resolver: ResolverKind,
}

fn default_resolver() -> ResolverKind {
    ResolverKind::Plain
}

/// Everything the compiler needs to know about one entity type on one
/// backend: the query skeleton around the clause and the recognized fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfiguration {
    pub entity: String,
    /// Selection/from skeleton, e.g. `SELECT p FROM ProductImpl p`.
    /// The builder appends ` WHERE <clause>` only when a clause exists.
    #[serde(default)]
    pub prefix: String,
    /// Default ordering clause appended verbatim, e.g. ` ORDER BY p.code ASC`.
    #[serde(default)]
    pub postfix: String,
    /// Locale substituted into `Localized` field expressions.
    #[serde(default)]
    pub default_locale: Option<String>,
    pub fields: HashMap<String, FieldDescriptor>,
}

impl EntityConfiguration {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }
}

/// On-disk shape of a full registry declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    #[serde(default)]
    pub relational: Vec<EntityConfiguration>,
    #[serde(default)]
    pub search_index: Vec<EntityConfiguration>,
}

/// Accumulates entity configurations, then validates and seals them.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: HashMap<(Backend, String), EntityConfiguration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one entity configuration. Re-registering the same
    /// (backend, entity) pair replaces the earlier declaration.
    pub fn register(mut self, backend: Backend, config: EntityConfiguration) -> Self {
        self.entries.insert((backend, config.entity.clone()), config);
        self
    }

    /// Loads a whole registry declaration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<QueryRegistry, ConfigError> {
        let file: RegistryFile = serde_json::from_str(json)
            .map_err(|e| ConfigError::new(format!("cannot parse registry JSON: {}", e)))?;
        Self::from_file(file)
    }

    /// Loads a whole registry declaration from a JSON file on disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<QueryRegistry, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(format!("cannot read registry file {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_file(file: RegistryFile) -> Result<QueryRegistry, ConfigError> {
        let mut builder = Self::new();
        for config in file.relational {
            builder = builder.register(Backend::Relational, config);
        }
        for config in file.search_index {
            builder = builder.register(Backend::SearchIndex, config);
        }
        builder.build()
    }

    /// Validates every declaration and seals the registry.
    pub fn build(self) -> Result<QueryRegistry, ConfigError> {
        for ((backend, entity), config) in &self.entries {
            for (name, descriptor) in &config.fields {
                self.validate_field(*backend, entity, name, descriptor, config)?;
            }
        }
        self.check_cycles()?;
        Ok(QueryRegistry { entries: self.entries })
    }

    fn validate_field(
        &self,
        backend: Backend,
        entity: &str,
        name: &str,
        descriptor: &FieldDescriptor,
        config: &EntityConfiguration,
    ) -> Result<(), ConfigError> {
        let place = format!("{}/{}.{}", backend.name(), entity, name);
        match &descriptor.resolver {
            ResolverKind::Plain => {
                if descriptor.expression.contains("{locale}") {
                    return Err(ConfigError::new(format!(
                        "{}: plain field expression must not contain {{locale}}",
                        place
                    )));
                }
            }
            ResolverKind::Localized => {
                if !descriptor.expression.contains("{locale}") {
                    return Err(ConfigError::new(format!(
                        "{}: localized field expression must contain {{locale}}",
                        place
                    )));
                }
                if config.default_locale.is_none() {
                    return Err(ConfigError::new(format!(
                        "{}: localized field requires a default_locale on the entity",
                        place
                    )));
                }
                if !matches!(descriptor.field_type, FieldType::Text) {
                    return Err(ConfigError::new(format!(
                        "{}: localized fields must be text-typed",
                        place
                    )));
                }
            }
            ResolverKind::NonLocalized => {
                if descriptor.expression.contains("{locale}") {
                    return Err(ConfigError::new(format!(
                        "{}: non-localized field expression must not contain {{locale}}",
                        place
                    )));
                }
                if !matches!(descriptor.field_type, FieldType::Text | FieldType::Code) {
                    return Err(ConfigError::new(format!(
                        "{}: non-localized fields must be text- or code-typed",
                        place
                    )));
                }
            }
            ResolverKind::SubQuery { entity: related, field, correlation } => {
                let Some(related_config) = self.entries.get(&(backend, related.clone())) else {
                    return Err(ConfigError::new(format!(
                        "{}: sub-query references unregistered entity '{}'",
                        place, related
                    )));
                };
                if related_config.field(field).is_none() {
                    return Err(ConfigError::new(format!(
                        "{}: sub-query references unknown field '{}.{}'",
                        place, related, field
                    )));
                }
                if correlation.trim().is_empty() {
                    return Err(ConfigError::new(format!(
                        "{}: sub-query correlation clause is empty",
                        place
                    )));
                }
            }
        }
        Ok(())
    }

    /// A cycle in entity-type references would make sub-query expansion
    /// unbounded; it is rejected here so compile never has to cope with it.
    fn check_cycles(&self) -> Result<(), ConfigError> {
        for (backend, entity) in self.entries.keys() {
            let mut trail = vec![entity.clone()];
            let mut seen: HashSet<&str> = HashSet::new();
            seen.insert(entity.as_str());
            self.walk_references(*backend, entity, &mut seen, &mut trail)?;
        }
        Ok(())
    }

    fn walk_references<'s>(
        &'s self,
        backend: Backend,
        entity: &str,
        seen: &mut HashSet<&'s str>,
        trail: &mut Vec<String>,
    ) -> Result<(), ConfigError> {
        let Some(config) = self.entries.get(&(backend, entity.to_string())) else {
            return Ok(());
        };
        for descriptor in config.fields.values() {
            if let ResolverKind::SubQuery { entity: related, .. } = &descriptor.resolver {
                if !seen.insert(related.as_str()) {
                    trail.push(related.clone());
                    return Err(ConfigError::new(format!(
                        "cycle in sub-query entity references: {}",
                        trail.join(" -> ")
                    )));
                }
                trail.push(related.clone());
                self.walk_references(backend, related, seen, trail)?;
                trail.pop();
                seen.remove(related.as_str());
            }
        }
        Ok(())
    }
}

/// The sealed, read-only registry consulted by every compile call.
#[derive(Debug)]
pub struct QueryRegistry {
    entries: HashMap<(Backend, String), EntityConfiguration>,
}

impl QueryRegistry {
    pub fn entity(&self, backend: Backend, entity: &str) -> Option<&EntityConfiguration> {
        self.entries.get(&(backend, entity.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_field(field_type: FieldType, expression: &str) -> FieldDescriptor {
        FieldDescriptor {
            field_type,
            expression: expression.to_string(),
            resolver: ResolverKind::Plain,
        }
    }

    fn product_config() -> EntityConfiguration {
        let mut fields = HashMap::new();
        fields.insert("productCode".to_string(), plain_field(FieldType::Code, "p.code"));
        fields.insert("price".to_string(), plain_field(FieldType::Decimal, "p.listPrice"));
        EntityConfiguration {
            entity: "product".to_string(),
            prefix: "SELECT p FROM ProductImpl p".to_string(),
            postfix: " ORDER BY p.code ASC".to_string(),
            default_locale: Some("en".to_string()),
            fields,
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = RegistryBuilder::new()
            .register(Backend::Relational, product_config())
            .build()
            .unwrap();

        let config = registry.entity(Backend::Relational, "product").unwrap();
        assert_eq!(config.field("productCode").unwrap().expression, "p.code");
        assert!(config.field("bogus").is_none());
        assert!(registry.entity(Backend::SearchIndex, "product").is_none());
    }

    #[test]
    fn test_localized_field_requires_placeholder() {
        let mut config = product_config();
        config.fields.insert(
            "name".to_string(),
            FieldDescriptor {
                field_type: FieldType::Text,
                expression: "p.displayName".to_string(),
                resolver: ResolverKind::Localized,
            },
        );
        let err = RegistryBuilder::new()
            .register(Backend::Relational, config)
            .build()
            .unwrap_err();
        assert!(err.message.contains("{locale}"));
    }

    #[test]
    fn test_localized_field_requires_default_locale() {
        let mut config = product_config();
        config.default_locale = None;
        config.fields.insert(
            "name".to_string(),
            FieldDescriptor {
                field_type: FieldType::Text,
                expression: "p.displayName_{locale}".to_string(),
                resolver: ResolverKind::Localized,
            },
        );
        let err = RegistryBuilder::new()
            .register(Backend::Relational, config)
            .build()
            .unwrap_err();
        assert!(err.message.contains("default_locale"));
    }

    #[test]
    fn test_non_localized_field_must_be_text_or_code() {
        let mut config = product_config();
        config.fields.insert(
            "quantity".to_string(),
            FieldDescriptor {
                field_type: FieldType::Integer,
                expression: "p.quantityOnHand".to_string(),
                resolver: ResolverKind::NonLocalized,
            },
        );
        let err = RegistryBuilder::new()
            .register(Backend::Relational, config)
            .build()
            .unwrap_err();
        assert!(err.message.contains("text- or code-typed"));
    }

    #[test]
    fn test_sub_query_must_reference_registered_entity() {
        let mut config = product_config();
        config.fields.insert(
            "categoryCode".to_string(),
            FieldDescriptor {
                field_type: FieldType::Code,
                expression: String::new(),
                resolver: ResolverKind::SubQuery {
                    entity: "category".to_string(),
                    field: "categoryCode".to_string(),
                    correlation: "c.uid = p.categoryUid".to_string(),
                },
            },
        );
        let err = RegistryBuilder::new()
            .register(Backend::Relational, config)
            .build()
            .unwrap_err();
        assert!(err.message.contains("unregistered entity 'category'"));
    }

    #[test]
    fn test_cycle_in_sub_query_references_is_rejected() {
        let mut a_fields = HashMap::new();
        a_fields.insert(
            "bRef".to_string(),
            FieldDescriptor {
                field_type: FieldType::Code,
                expression: String::new(),
                resolver: ResolverKind::SubQuery {
                    entity: "b".to_string(),
                    field: "aRef".to_string(),
                    correlation: "b.a = a".to_string(),
                },
            },
        );
        let mut b_fields = HashMap::new();
        b_fields.insert(
            "aRef".to_string(),
            FieldDescriptor {
                field_type: FieldType::Code,
                expression: String::new(),
                resolver: ResolverKind::SubQuery {
                    entity: "a".to_string(),
                    field: "bRef".to_string(),
                    correlation: "a.b = b".to_string(),
                },
            },
        );
        let a = EntityConfiguration {
            entity: "a".to_string(),
            prefix: "SELECT a FROM A a".to_string(),
            postfix: String::new(),
            default_locale: None,
            fields: a_fields,
        };
        let b = EntityConfiguration {
            entity: "b".to_string(),
            prefix: "SELECT b FROM B b".to_string(),
            postfix: String::new(),
            default_locale: None,
            fields: b_fields,
        };

        let err = RegistryBuilder::new()
            .register(Backend::Relational, a)
            .register(Backend::Relational, b)
            .build()
            .unwrap_err();
        assert!(err.message.contains("cycle"));
    }

    #[test]
    fn test_load_registry_from_json() {
        let json = r#"{
            "relational": [
                {
                    "entity": "category",
                    "prefix": "SELECT c FROM CategoryImpl c",
                    "postfix": " ORDER BY c.code ASC",
                    "default_locale": "en",
                    "fields": {
                        "categoryCode": { "field_type": "code", "expression": "c.code" },
                        "displayName": {
                            "field_type": "text",
                            "expression": "c.localizedName_{locale}",
                            "resolver": { "kind": "localized" }
                        }
                    }
                }
            ],
            "search_index": [
                {
                    "entity": "category",
                    "fields": {
                        "categoryCode": { "field_type": "code", "expression": "categoryCode" }
                    }
                }
            ]
        }"#;

        let registry = RegistryBuilder::from_json_str(json).unwrap();
        assert_eq!(registry.len(), 2);
        let config = registry.entity(Backend::Relational, "category").unwrap();
        assert_eq!(
            config.field("displayName").unwrap().resolver,
            ResolverKind::Localized
        );
        assert!(registry.entity(Backend::SearchIndex, "category").is_some());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = RegistryBuilder::from_json_str("not json").unwrap_err();
        assert!(err.message.contains("cannot parse"));
    }
}
