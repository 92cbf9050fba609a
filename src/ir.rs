// Language-agnostic type model handed to the emission stage. No document nodes here.
use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

/// A resolved type reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeUsage {
    Primitive {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },
    Reference {
        file: PathBuf, // canonical path of the owning Model
        name: String,
    },
    Array {
        #[serde(skip_serializing_if = "Option::is_none")]
        items: Option<Box<TypeUsage>>,
    },
    Map {
        values: Box<TypeUsage>, // additionalProperties
    },
    Object {
        schema: Box<ObjectSchema>, // anonymous, never registered by name
    },
    Union {
        alternatives: Vec<TypeUsage>, // >= 2, distinct, source order
    },
    Any,
}

impl TypeUsage {
    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into(), format: None }
    }

    pub fn reference(file: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self::Reference { file: file.into(), name: name.into() }
    }

    /// Visit this type and every type nested in it, depth first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a TypeUsage)) {
        visit(self);
        match self {
            Self::Array { items: Some(items) } => items.walk(visit),
            Self::Map { values } => values.walk(visit),
            Self::Object { schema } => schema.walk_types(visit),
            Self::Union { alternatives } => {
                for alt in alternatives {
                    alt.walk(visit);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Display for TypeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive { name, format: Some(format) } => write!(f, "{name}<{format}>"),
            Self::Primitive { name, format: None } => f.write_str(name),
            Self::Reference { name, .. } => f.write_str(name),
            Self::Array { items: Some(items) } => write!(f, "array<{items}>"),
            Self::Array { items: None } => f.write_str("array"),
            Self::Map { values } => write!(f, "map<{values}>"),
            Self::Object { schema } => write!(f, "object{{{} fields}}", schema.fields.len()),
            Self::Union { alternatives } => {
                let arms = alternatives.iter().map(ToString::to_string).collect::<Vec<_>>();
                f.write_str(&arms.join(" | "))
            }
            Self::Any => f.write_str("any"),
        }
    }
}

/// Optional per-declaration metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VarAttrs {
    pub required: bool,
    pub default_value: Option<Value>,
    pub description: Option<String>,
}

/// One field: resolved type + target identifier + source metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarDecl {
    pub ty: TypeUsage,
    pub name: String,      // produced by the naming policy
    pub base_name: String, // as written in the schema
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub type VarDecls = Vec<VarDecl>;

impl VarDecl {
    pub fn new(ty: TypeUsage, name: String, base_name: String, attrs: VarAttrs) -> Self {
        Self {
            ty,
            name,
            base_name,
            required: attrs.required,
            default_value: attrs.default_value,
            description: attrs.description,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectSchema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: VarDecls, // declaration order is emission order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<TypeUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<TypeUsage>,
}

impl ObjectSchema {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.parents.is_empty() && self.additional_properties.is_none()
    }

    /// A schema that only stands for another type.
    pub fn alias_of(&self) -> Option<&TypeUsage> {
        match self.parents.as_slice() {
            [single] if self.fields.is_empty() && self.additional_properties.is_none() => Some(single),
            _ => None,
        }
    }

    pub fn field(&self, base_name: &str) -> Option<&VarDecl> {
        self.fields.iter().find(|f| f.base_name == base_name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &VarDecl> {
        self.fields.iter().filter(|f| f.required)
    }

    fn walk_types<'a>(&'a self, visit: &mut impl FnMut(&'a TypeUsage)) {
        for field in &self.fields {
            field.ty.walk(visit);
        }
        for parent in &self.parents {
            parent.walk(visit);
        }
        if let Some(additional) = &self.additional_properties {
            additional.walk(visit);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub code: String,
    pub body: ObjectSchema,
}

/// One API operation found under `paths`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Call {
    pub name: String, // operationId
    pub path: String,
    pub verb: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub path_params: VarDecls,
    pub query_params: VarDecls,
    pub header_params: VarDecls,
    pub body: ObjectSchema,
    pub responses: Vec<Response>,
}

impl Call {
    fn walk_types<'a>(&'a self, visit: &mut impl FnMut(&'a TypeUsage)) {
        let params = self.path_params.iter().chain(&self.query_params).chain(&self.header_params);
        for param in params {
            param.ty.walk(visit);
        }
        self.body.walk_types(visit);
        for response in &self.responses {
            response.body.walk_types(visit);
        }
    }
}

/// Two different source names mapped to the same target identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClash {
    pub identifier: String,
    pub existing: String,
    pub incoming: String,
}

/// The analyzed form of one schema file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    file: PathBuf,
    schemas: IndexMap<String, ObjectSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    calls: Vec<Call>,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    imports: IndexSet<PathBuf>,
}

impl Model {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            schemas: IndexMap::new(),
            calls: Vec::new(),
            imports: IndexSet::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn schemas(&self) -> &IndexMap<String, ObjectSchema> {
        &self.schemas
    }

    pub fn schema(&self, name: &str) -> Option<&ObjectSchema> {
        self.schemas.get(name)
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Other files this Model's types refer to, in first-use order.
    pub fn imports(&self) -> &IndexSet<PathBuf> {
        &self.imports
    }

    /// Registers a named schema; hands it back if the name is taken.
    pub fn add_schema(&mut self, name: impl Into<String>, schema: ObjectSchema) -> Result<(), ObjectSchema> {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            return Err(schema);
        }
        for parent in &schema.parents {
            self.record_imports(parent);
        }
        if let Some(additional) = &schema.additional_properties {
            self.record_imports(additional);
        }
        self.schemas.insert(name, schema);
        Ok(())
    }

    pub fn add_call(&mut self, call: Call) {
        for parent in &call.body.parents {
            self.record_imports(parent);
        }
        for response in &call.responses {
            for parent in &response.body.parents {
                self.record_imports(parent);
            }
        }
        self.calls.push(call);
    }

    /// Appends `decl` to `fields`.
    ///
    /// Same base name: the incoming declaration replaces the old one in its
    /// original position. Different base name, same identifier: a clash.
    pub fn add_var_decl(&mut self, fields: &mut VarDecls, decl: VarDecl) -> Result<(), NameClash> {
        if let Some(existing) = fields
            .iter()
            .find(|f| f.name == decl.name && f.base_name != decl.base_name)
        {
            return Err(NameClash {
                identifier: decl.name,
                existing: existing.base_name.clone(),
                incoming: decl.base_name,
            });
        }
        self.record_imports(&decl.ty);
        match fields.iter_mut().find(|f| f.base_name == decl.base_name) {
            Some(slot) => *slot = decl,
            None => fields.push(decl),
        }
        Ok(())
    }

    /// Names referenced from this file into itself that no schema here answers to.
    pub fn unresolved_local_references(&self) -> Vec<String> {
        let mut missing = IndexSet::new();
        let mut check = |ty: &TypeUsage| {
            if let TypeUsage::Reference { file, name } = ty {
                if *file == self.file && !self.schemas.contains_key(name) {
                    missing.insert(name.clone());
                }
            }
        };
        for schema in self.schemas.values() {
            schema.walk_types(&mut check);
        }
        for call in &self.calls {
            call.walk_types(&mut check);
        }
        missing.into_iter().collect()
    }

    fn record_imports(&mut self, ty: &TypeUsage) {
        let own = &self.file;
        let imports = &mut self.imports;
        ty.walk(&mut |t| {
            if let TypeUsage::Reference { file, .. } = t {
                if file != own {
                    imports.insert(file.clone());
                }
            }
        });
    }
}

// ------------------------------- Tests ------------------------------------ //
