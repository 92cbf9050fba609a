//! Object schemas: properties, composition and the declaration funnel.
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::trace;

use super::{Analyzer, IsTopLevel, SubschemasStrategy, string_field};
use crate::error::{Result, SchemaErrorKind};
use crate::ir::{ObjectSchema, TypeUsage, VarAttrs, VarDecl, VarDecls};
use crate::scope::Identifier;

impl Analyzer<'_> {
    /// Builds the object schema described by `node`.
    ///
    /// Own properties come first, then `allOf` entries in order. With
    /// [`SubschemasStrategy::Import`] a referenced entry stays a parent link;
    /// with [`SubschemasStrategy::Inline`] its fields are copied in.
    pub(crate) fn analyze_schema(
        &mut self,
        node: &Map<String, Value>,
        strategy: SubschemasStrategy,
    ) -> Result<ObjectSchema> {
        let mut schema = ObjectSchema {
            description: string_field(node, "description"),
            ..ObjectSchema::default()
        };

        if let Some(reference) = node.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| self.malformed("`$ref` must be a string"))?;
            let target = self.resolve_reference(reference)?;
            match strategy {
                SubschemasStrategy::Import => schema.parents.push(target),
                SubschemasStrategy::Inline => {
                    let source = self.inline_type(&target, &mut Vec::new())?;
                    self.merge_from_schema(&mut schema, &source, "", None)?;
                }
            }
            return Ok(schema);
        }

        if let Some(properties) = node.get("properties") {
            let properties = properties
                .as_object()
                .ok_or_else(|| self.malformed("`properties` must be a mapping"))?;
            let required = self.required_names(node)?;
            for (name, property) in properties {
                let property = property
                    .as_object()
                    .ok_or_else(|| self.malformed(format!("property `{name}` must be a mapping")))?;
                let ty = {
                    let mut this = self.push_scope(name)?;
                    this.analyze_type_usage(property, IsTopLevel::Inner)?
                };
                let attrs = VarAttrs {
                    required: required.contains(name),
                    default_value: property.get("default").cloned(),
                    description: string_field(property, "description"),
                };
                self.add_var_decl(&mut schema.fields, ty, name, attrs)?;
            }
        }

        if let Some(all_of) = node.get("allOf") {
            let all_of = all_of
                .as_array()
                .ok_or_else(|| self.malformed("`allOf` must be a sequence"))?;
            for subschema in all_of {
                let subschema = subschema
                    .as_object()
                    .ok_or_else(|| self.malformed("`allOf` entries must be mappings"))?;
                let source = self.analyze_schema(subschema, strategy)?;
                match (strategy, source.alias_of()) {
                    (SubschemasStrategy::Import, Some(link @ TypeUsage::Reference { .. })) => {
                        if !schema.parents.contains(link) {
                            schema.parents.push(link.clone());
                        }
                    }
                    _ => self.merge_from_schema(&mut schema, &source, "", None)?,
                }
            }
        }

        match node.get("additionalProperties") {
            None | Some(Value::Bool(false)) => {}
            Some(Value::Bool(true)) => schema.additional_properties = Some(TypeUsage::Any),
            Some(Value::Object(values)) => {
                schema.additional_properties = Some(self.analyze_type_usage(values, IsTopLevel::Inner)?);
            }
            Some(_) => return Err(self.malformed("`additionalProperties` must be a boolean or a schema")),
        }

        Ok(schema)
    }

    /// Copies `source` into `target`, re-declaring every field in the current scope.
    ///
    /// A non-empty `base_name_prefix` renames fields to `prefix_base`; `required`
    /// overrides the fields' own required flags when given.
    pub(crate) fn merge_from_schema(
        &mut self,
        target: &mut ObjectSchema,
        source: &ObjectSchema,
        base_name_prefix: &str,
        required: Option<bool>,
    ) -> Result<()> {
        for parent in &source.parents {
            if !target.parents.contains(parent) {
                target.parents.push(parent.clone());
            }
        }
        if source.additional_properties.is_some() {
            target.additional_properties = source.additional_properties.clone();
        }
        for field in &source.fields {
            let base_name = match base_name_prefix {
                "" => field.base_name.clone(),
                prefix => format!("{prefix}_{}", field.base_name),
            };
            let attrs = VarAttrs {
                required: required.unwrap_or(field.required),
                default_value: field.default_value.clone(),
                description: field.description.clone(),
            };
            self.add_var_decl(&mut target.fields, field.ty.clone(), &base_name, attrs)?;
        }
        Ok(())
    }

    /// Flattens a referenced schema: its own fields, then those of its referenced parents.
    fn inline_type(&mut self, target: &TypeUsage, visiting: &mut Vec<(PathBuf, String)>) -> Result<ObjectSchema> {
        let TypeUsage::Reference { file, name } = target else {
            return Ok(ObjectSchema {
                parents: vec![target.clone()],
                ..ObjectSchema::default()
            });
        };
        let key = (file.clone(), name.clone());
        if visiting.contains(&key) {
            return Err(self.schema_error(SchemaErrorKind::CircularComposition(name.clone())));
        }
        let source = self.lookup_schema(file, name)?.clone();
        visiting.push(key);
        let mut flat = ObjectSchema {
            parents: Vec::new(),
            ..source.clone()
        };
        for parent in &source.parents {
            let inlined = self.inline_type(parent, visiting)?;
            self.merge_from_schema(&mut flat, &inlined, "", None)?;
        }
        visiting.pop();
        Ok(flat)
    }

    /// A named schema, either from the Model being built or from the cache.
    fn lookup_schema(&self, file: &Path, name: &str) -> Result<&ObjectSchema> {
        let model = self.current_model()?;
        let found = if model.file() == file {
            model.schema(name)
        } else {
            self.cache.schema(file, name)
        };
        found.ok_or_else(|| self.schema_error(SchemaErrorKind::UndefinedType(name.to_owned())))
    }

    fn required_names(&self, node: &Map<String, Value>) -> Result<Vec<String>> {
        match node.get("required") {
            None | Some(Value::Bool(_)) => Ok(Vec::new()),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| {
                    n.as_str()
                        .map(str::to_owned)
                        .ok_or_else(|| self.malformed("`required` entries must be strings"))
                })
                .collect(),
            Some(_) => Err(self.malformed("`required` must be a sequence of names")),
        }
    }

    /// The only place declaration names come from.
    pub(crate) fn make_var_decl(&self, ty: TypeUsage, base_name: &str, scope: &Identifier, attrs: VarAttrs) -> VarDecl {
        let name = self.translator.map_identifier(base_name, &scope.qualified_name());
        VarDecl::new(ty, name, base_name.to_owned(), attrs)
    }

    /// Declares `base_name` in the current scope and appends it to `fields`.
    pub(crate) fn add_var_decl(
        &mut self,
        fields: &mut VarDecls,
        ty: TypeUsage,
        base_name: &str,
        attrs: VarAttrs,
    ) -> Result<()> {
        let decl = self.make_var_decl(ty, base_name, self.current_scope()?, attrs);
        trace!(base_name, name = %decl.name, ty = %decl.ty, "declaration");
        let outcome = self.current_model_mut()?.add_var_decl(fields, decl);
        outcome.map_err(|clash| self.schema_error(clash.into()))
    }
}
