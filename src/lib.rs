//! Compiler for EQL, a small typed entity-query language
//! (`field = "value" AND other != "x"`), targeting either a relational
//! object-query backend (parameterized text) or a full-text search index
//! (inlined, escaped boolean query).
//!
//! The pipeline is strictly forward: text -> tokens -> AST -> resolved
//! fragments -> native query. The per-entity field configuration comes from
//! a [`config::QueryRegistry`] built once at startup; after that every
//! compile call is a pure read.

pub mod ast;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;

pub use builder::NativeQuery;
pub use compiler::{CompileError, QueryCompiler};
pub use config::{Backend, EntityConfiguration, FieldDescriptor, FieldType, QueryRegistry, RegistryBuilder, ResolverKind};
