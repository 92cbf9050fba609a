//! Type usages: primitives, arrays, references, inline objects and unions.
use serde_json::{Map, Value};
use tracing::trace;

use super::{Analyzer, IsTopLevel, SubschemasStrategy};
use crate::error::{Result, SchemaErrorKind};
use crate::ir::{ObjectSchema, TypeUsage};

const PRIMITIVES: &[&str] = &["string", "integer", "number", "boolean", "null", "file"];

impl Analyzer<'_> {
    /// Resolves the type a schema node stands for.
    ///
    /// At top level the result is also registered in the current Model under
    /// the current scope's name, and the returned usage is a reference to it.
    pub(crate) fn analyze_type_usage(
        &mut self,
        node: &Map<String, Value>,
        is_top_level: IsTopLevel,
    ) -> Result<TypeUsage> {
        if let Some(alternatives) = self.union_alternatives(node)? {
            if node.contains_key("properties") {
                return Err(self.malformed("a `oneOf`/`anyOf` union cannot also declare `properties`"));
            }
            let ty = self.analyze_multitype(alternatives)?;
            return self.finish_type(ty, is_top_level);
        }

        let ty = match node.get("type").map(Value::as_str) {
            Some(None) => return Err(self.malformed("`type` must be a string or a sequence of types")),
            None | Some(Some("object")) => {
                let schema = self.analyze_schema(node, SubschemasStrategy::Import)?;
                return self.finish_object(schema, is_top_level);
            }
            Some(Some("array")) => {
                let items = match node.get("items") {
                    None => None,
                    Some(Value::Object(items)) => Some(Box::new(self.analyze_type_usage(items, IsTopLevel::Inner)?)),
                    Some(_) => return Err(self.malformed("`items` must be a mapping")),
                };
                TypeUsage::Array { items }
            }
            Some(Some(name)) if PRIMITIVES.contains(&name) => TypeUsage::Primitive {
                name: name.to_owned(),
                format: node.get("format").and_then(Value::as_str).map(str::to_owned),
            },
            Some(Some(unknown)) => {
                return Err(self.schema_error(SchemaErrorKind::UndefinedType(unknown.to_owned())));
            }
        };
        self.finish_type(ty, is_top_level)
    }

    /// A union of the given alternatives: order kept, duplicates and nested unions flattened.
    pub(crate) fn analyze_multitype(&mut self, alternatives: &[Value]) -> Result<TypeUsage> {
        if alternatives.len() < 2 {
            return Err(self.schema_error(SchemaErrorKind::MalformedUnion { found: alternatives.len() }));
        }
        let mut resolved: Vec<TypeUsage> = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            let ty = match alternative {
                Value::String(name) => {
                    let node = Map::from_iter([("type".to_owned(), Value::String(name.clone()))]);
                    self.analyze_type_usage(&node, IsTopLevel::Inner)?
                }
                Value::Object(node) => self.analyze_type_usage(node, IsTopLevel::Inner)?,
                _ => return Err(self.malformed("union alternatives must be type names or schemas")),
            };
            let arms = match ty {
                TypeUsage::Union { alternatives } => alternatives,
                other => vec![other],
            };
            for arm in arms {
                if !resolved.contains(&arm) {
                    resolved.push(arm);
                }
            }
        }
        Ok(match resolved.len() {
            1 => resolved.remove(0),
            _ => TypeUsage::Union { alternatives: resolved },
        })
    }

    fn union_alternatives<'n>(&self, node: &'n Map<String, Value>) -> Result<Option<&'n [Value]>> {
        if let Some(Value::Array(types)) = node.get("type") {
            return Ok(Some(types.as_slice()));
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(alternatives) = node.get(keyword) {
                return match alternatives {
                    Value::Array(alternatives) => Ok(Some(alternatives.as_slice())),
                    _ => Err(self.malformed(format!("`{keyword}` must be a sequence"))),
                };
            }
        }
        Ok(None)
    }

    /// Non-object types become single-parent alias schemas when named.
    fn finish_type(&mut self, ty: TypeUsage, is_top_level: IsTopLevel) -> Result<TypeUsage> {
        match is_top_level {
            IsTopLevel::Inner => Ok(ty),
            IsTopLevel::TopLevel => self.register_schema(ObjectSchema {
                parents: vec![ty],
                ..ObjectSchema::default()
            }),
        }
    }

    fn finish_object(&mut self, schema: ObjectSchema, is_top_level: IsTopLevel) -> Result<TypeUsage> {
        if is_top_level == IsTopLevel::TopLevel {
            return self.register_schema(schema);
        }
        if let Some(target) = schema.alias_of() {
            return Ok(target.clone());
        }
        if schema.is_empty() {
            return Ok(TypeUsage::primitive("object"));
        }
        if schema.fields.is_empty() && schema.parents.is_empty() {
            if let Some(values) = schema.additional_properties {
                return Ok(TypeUsage::Map { values: Box::new(values) });
            }
        }
        Ok(TypeUsage::Object { schema: Box::new(schema) })
    }

    fn register_schema(&mut self, schema: ObjectSchema) -> Result<TypeUsage> {
        let name = self.current_scope()?.name().to_owned();
        let model = self.current_model_mut()?;
        let file = model.file().to_path_buf();
        if model.add_schema(name.clone(), schema).is_err() {
            return Err(self.schema_error(SchemaErrorKind::DuplicateSchema(name)));
        }
        trace!(schema = %name, "registered");
        Ok(TypeUsage::reference(file, name))
    }
}
