//! Semantic analysis of OpenAPI/Swagger-style schema documents.
//!
//! [`Analyzer::load_model`] turns a schema file, and every file it references,
//! into language-agnostic [`Model`]s: named object schemas, API calls and
//! resolved type usages, with every field name produced by a [`Translator`].
pub mod analyzer;
pub mod cache;
pub mod document;
pub mod error;
pub mod ir;
pub mod path_de;
pub mod scope;
pub mod translator;

#[cfg(test)]
pub(crate) mod test_utils;

pub use analyzer::Analyzer;
pub use cache::ModelCache;
pub use error::{AnalyzerError, Result, SchemaErrorKind};
pub use ir::{Call, Model, ObjectSchema, Response, TypeUsage, VarAttrs, VarDecl, VarDecls};
pub use scope::{Identifier, Role};
pub use translator::{ConfigTranslator, Translator, TranslatorConfig};
