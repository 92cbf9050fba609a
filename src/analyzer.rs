//! Schema documents → [`Model`]s.
//!
//! Depth-first and single-threaded: `load_model` parses a file, walks its
//! top-level schemas and operations, and recurses into `load_dependency`
//! whenever a `$ref` points at another file. Each file is analyzed at most
//! once; finished Models live in the [`ModelCache`].
//!
//! Invariants:
//! - every analysis step runs inside a context (file dir, Model, scope);
//!   contexts are pushed through guards and always popped again;
//! - a file is published to the cache only after its whole subtree succeeded;
//! - every declaration name comes from the naming policy, via `make_var_decl`.
mod calls;
mod context;
mod schema;
mod types;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, debug_span, info};

use crate::cache::ModelCache;
use crate::document::load_document;
use crate::error::{AnalyzerError, Result, SchemaErrorKind};
use crate::ir::{Model, TypeUsage};
use crate::scope::Role;
use crate::translator::Translator;

use context::Context;

/// Keys that make a mapping a schema rather than a container document.
const SCHEMA_KEYWORDS: &[&str] = &[
    "type",
    "properties",
    "allOf",
    "oneOf",
    "anyOf",
    "$ref",
    "additionalProperties",
    "items",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IsTopLevel {
    Inner,
    TopLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubschemasStrategy {
    /// Link referenced subschemas as parents.
    Import,
    /// Copy their fields into the composing schema.
    Inline,
}

pub struct Analyzer<'t> {
    translator: &'t dyn Translator,
    base_dir: PathBuf,
    cache: ModelCache,
    contexts: Vec<Context>,
    building: Vec<Model>, // Models of the files currently in progress, outermost first
}

impl<'t> Analyzer<'t> {
    pub fn new(translator: &'t dyn Translator, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_cache(translator, base_dir, ModelCache::new())
    }

    /// Continues with Models analyzed earlier.
    pub fn with_cache(translator: &'t dyn Translator, base_dir: impl Into<PathBuf>, cache: ModelCache) -> Self {
        Self {
            translator,
            base_dir: base_dir.into(),
            cache,
            contexts: Vec::new(),
            building: Vec::new(),
        }
    }

    /// Every Model analyzed so far, keyed by canonical path, in publication order.
    pub fn all_models(&self) -> &IndexMap<PathBuf, Rc<Model>> {
        self.cache.models()
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }

    pub fn into_cache(self) -> ModelCache {
        self.cache
    }

    /// Returns the Model of `file_path` (relative to the base directory), analyzing it on first use.
    pub fn load_model(&mut self, file_path: impl AsRef<Path>, role: Role) -> Result<Rc<Model>> {
        let path = canonical(&self.base_dir.join(file_path))?;
        self.load_canonical(path, role)
    }

    fn load_canonical(&mut self, path: PathBuf, role: Role) -> Result<Rc<Model>> {
        if let Some(model) = self.cache.get(&path) {
            debug!(path = %path.display(), "model cache hit");
            return Ok(Rc::clone(model));
        }
        let _span = debug_span!("load_model", path = %path.display(), %role).entered();
        let model = {
            let mut this = self.enter_file(&path, role)?;
            let document = load_document(&path)?;
            this.fill_data_model(&document, &file_stem(&path))?;
            this.take_model()?
        };
        info!(
            schemas = model.schemas().len(),
            calls = model.calls().len(),
            "model published"
        );
        Ok(self.cache.insert(path, model))
    }

    /// Loads a file referenced from the current one; also returns its stem for default naming.
    pub(crate) fn load_dependency(&mut self, relative_path: &str) -> Result<(Rc<Model>, String)> {
        let path = self.dependency_path(relative_path)?;
        let role = self.current_role()?;
        debug!(dependency = relative_path, resolved = %path.display(), "loading dependency");
        let model = self.load_canonical(path, role)?;
        Ok((model, file_stem(Path::new(relative_path))))
    }

    /// Dependencies resolve against the referencing file's directory.
    fn dependency_path(&self, relative_path: &str) -> Result<PathBuf> {
        canonical(&self.context()?.file_dir.join(relative_path))
    }

    fn fill_data_model(&mut self, document: &Value, file_stem: &str) -> Result<()> {
        let root = document
            .as_object()
            .ok_or_else(|| self.malformed("the document root must be a mapping"))?;

        if SCHEMA_KEYWORDS.iter().any(|k| root.contains_key(*k)) {
            self.analyze_top_level(file_stem, root)?;
        }

        let containers = [
            root.get("definitions"),
            root.get("components").and_then(|c| c.get("schemas")),
        ];
        for container in containers.into_iter().flatten() {
            let entries = container
                .as_object()
                .ok_or_else(|| self.malformed("schema definitions must be a mapping"))?;
            for (name, node) in entries {
                let node = node
                    .as_object()
                    .ok_or_else(|| self.malformed(format!("definition `{name}` must be a mapping")))?;
                self.analyze_top_level(name, node)?;
            }
        }

        if let Some(paths) = root.get("paths") {
            self.analyze_paths(document, paths)?;
        }

        let unresolved = self.current_model()?.unresolved_local_references();
        if let Some(name) = unresolved.into_iter().next() {
            return Err(self.schema_error(SchemaErrorKind::UndefinedType(name)));
        }
        Ok(())
    }

    fn analyze_top_level(&mut self, name: &str, node: &Map<String, Value>) -> Result<()> {
        let mut this = self.push_scope(name)?;
        this.analyze_type_usage(node, IsTopLevel::TopLevel)?;
        Ok(())
    }

    /// `file.yaml`, `file.yaml#/definitions/Name` or `#/definitions/Name`.
    pub(crate) fn resolve_reference(&mut self, reference: &str) -> Result<TypeUsage> {
        if reference.is_empty() {
            return Err(self.schema_error(SchemaErrorKind::EmptyRef));
        }
        // `other.yaml#` means the same as `other.yaml`
        let (file_part, fragment) = match reference.split_once('#') {
            Some((file, fragment)) if !fragment.is_empty() => (file, Some(fragment)),
            Some((file, _)) => (file, None),
            None => (reference, None),
        };
        let fragment_name = match fragment {
            Some(pointer) => Some(pointer_name(pointer).ok_or_else(|| {
                self.malformed(format!("cannot take a type name from `{reference}`"))
            })?),
            None => None,
        };

        let own_file = self.current_model()?.file().to_path_buf();
        if file_part.is_empty() {
            let name = fragment_name.ok_or_else(|| self.schema_error(SchemaErrorKind::EmptyRef))?;
            return Ok(TypeUsage::reference(own_file, name));
        }
        if self.dependency_path(file_part)? == own_file {
            // recursive type: checked when the file completes
            let name = fragment_name.unwrap_or_else(|| file_stem(Path::new(file_part)));
            return Ok(TypeUsage::reference(own_file, name));
        }

        let (model, stem) = self.load_dependency(file_part)?;
        let name = fragment_name.unwrap_or(stem);
        if model.schema(&name).is_none() {
            return Err(self.schema_error(SchemaErrorKind::UndefinedType(reference.to_owned())));
        }
        Ok(TypeUsage::reference(model.file(), name))
    }

    /// A schema error located at the current scope.
    pub(crate) fn schema_error(&self, kind: SchemaErrorKind) -> AnalyzerError {
        match self.context() {
            Ok(context) => self.schema_error_at(context.scope.qualified_name(), kind),
            Err(internal) => internal,
        }
    }

    pub(crate) fn schema_error_at(&self, location: String, kind: SchemaErrorKind) -> AnalyzerError {
        let file = self
            .current_model()
            .map(|m| m.file().to_path_buf())
            .unwrap_or_default();
        AnalyzerError::Schema { file, location, kind }
    }

    pub(crate) fn malformed(&self, message: impl Into<String>) -> AnalyzerError {
        self.schema_error(SchemaErrorKind::Malformed(message.into()))
    }
}

// ------------------------------- Helpers ---------------------------------- //

fn canonical(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Last JSON-pointer segment, unescaped.
fn pointer_name(pointer: &str) -> Option<String> {
    let last = pointer.rsplit('/').next()?;
    if last.is_empty() {
        return None;
    }
    Some(last.replace("~1", "/").replace("~0", "~"))
}

pub(crate) fn string_field(node: &Map<String, Value>, key: &str) -> Option<String> {
    node.get(key).and_then(Value::as_str).map(str::to_owned)
}

// ------------------------------- Tests ------------------------------------ //
