//! API operations under `paths`: parameters, request bodies and responses.
//!
//! Requests are analyzed in an `In` scope named after the operation, responses
//! in an `Out` one. Bodies are inlined so that each call gets a flat field list.
use serde_json::{Map, Value};
use tracing::debug;

use super::{Analyzer, IsTopLevel, SubschemasStrategy, string_field};
use crate::error::{Result, SchemaErrorKind};
use crate::ir::{Call, ObjectSchema, Response, TypeUsage, VarAttrs};
use crate::scope::{Identifier, Role};

const VERBS: &[&str] = &["get", "put", "post", "delete", "patch", "head", "options"];

/// Name of the single field a non-object response body turns into.
const RESPONSE_DATA: &str = "data";
/// Same for OpenAPI 3 request bodies, which have no parameter name.
const REQUEST_BODY: &str = "body";

impl Analyzer<'_> {
    /// `document` is the whole file, for `#/parameters/...` references.
    pub(super) fn analyze_paths(&mut self, document: &Value, paths: &Value) -> Result<()> {
        let paths = paths
            .as_object()
            .ok_or_else(|| self.malformed("`paths` must be a mapping"))?;
        for (path, item) in paths {
            let item = item
                .as_object()
                .ok_or_else(|| self.malformed(format!("path `{path}` must be a mapping")))?;
            let shared = self.parameter_list(item)?;
            for (verb, operation) in item {
                if !VERBS.contains(&verb.as_str()) {
                    continue;
                }
                let operation = operation
                    .as_object()
                    .ok_or_else(|| self.malformed(format!("`{verb} {path}` must be a mapping")))?;
                let call = self.analyze_call(document, path, verb, operation, shared)?;
                self.current_model_mut()?.add_call(call);
            }
        }
        Ok(())
    }

    fn analyze_call(
        &mut self,
        document: &Value,
        path: &str,
        verb: &str,
        operation: &Map<String, Value>,
        shared_parameters: &[Value],
    ) -> Result<Call> {
        let Some(name) = operation.get("operationId").and_then(Value::as_str) else {
            return Err(self.schema_error_at(format!("{verb} {path}"), SchemaErrorKind::MissingOperationId));
        };
        debug!(call = name, verb, path, "analyzing operation");
        let mut call = Call {
            name: name.to_owned(),
            path: path.to_owned(),
            verb: verb.to_owned(),
            summary: string_field(operation, "summary"),
            ..Call::default()
        };

        {
            let mut this = self.push_context(Identifier::for_call(Role::In, name))?;
            let own_parameters = this.parameter_list(operation)?;
            for parameter in shared_parameters.iter().chain(own_parameters) {
                let parameter = this.resolve_parameter(document, parameter)?;
                this.analyze_parameter(&mut call, parameter)?;
            }
            if let Some(body) = operation.get("requestBody") {
                this.analyze_request_body(&mut call, body)?;
            }
        }

        if let Some(responses) = operation.get("responses") {
            let responses = responses
                .as_object()
                .ok_or_else(|| self.malformed("`responses` must be a mapping"))?;
            let mut this = self.push_context(Identifier::for_call(Role::Out, name))?;
            for (code, response) in responses {
                let response = this.analyze_response(code, response)?;
                call.responses.push(response);
            }
        }
        Ok(call)
    }

    fn parameter_list<'n>(&self, node: &'n Map<String, Value>) -> Result<&'n [Value]> {
        match node.get("parameters") {
            None => Ok(&[] as &[Value]),
            Some(Value::Array(parameters)) => Ok(parameters.as_slice()),
            Some(_) => Err(self.malformed("`parameters` must be a sequence")),
        }
    }

    /// Follows a parameter `$ref` within the same document.
    fn resolve_parameter<'d>(&self, document: &'d Value, parameter: &'d Value) -> Result<&'d Value> {
        let Some(reference) = parameter.get("$ref") else {
            return Ok(parameter);
        };
        let reference = reference
            .as_str()
            .ok_or_else(|| self.malformed("`$ref` must be a string"))?;
        reference
            .strip_prefix('#')
            .and_then(|pointer| document.pointer(pointer))
            .ok_or_else(|| self.malformed(format!("cannot resolve parameter reference `{reference}`")))
    }

    fn analyze_parameter(&mut self, call: &mut Call, parameter: &Value) -> Result<()> {
        let parameter = parameter
            .as_object()
            .ok_or_else(|| self.malformed("parameters must be mappings"))?;
        let name = parameter
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| self.malformed("parameter without a `name`"))?;
        let location = parameter
            .get("in")
            .and_then(Value::as_str)
            .ok_or_else(|| self.malformed(format!("parameter `{name}` has no `in`")))?;
        let required = parameter
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(location == "path");
        if let Some(call) = self.current_call()? {
            debug!(call, parameter = name, location, "parameter");
        }

        if location == "body" {
            let schema = parameter
                .get("schema")
                .and_then(Value::as_object)
                .ok_or_else(|| self.malformed(format!("body parameter `{name}` has no `schema`")))?;
            return self.add_body_schema(&mut call.body, name, schema, required, string_field(parameter, "description"));
        }

        let fields = match location {
            "path" => &mut call.path_params,
            "query" => &mut call.query_params,
            "header" => &mut call.header_params,
            "formData" => &mut call.body.fields,
            other => return Err(self.malformed(format!("unsupported parameter location `{other}`"))),
        };
        // OpenAPI 3 nests the type under `schema`; Swagger 2 puts it on the parameter itself.
        let node = parameter
            .get("schema")
            .and_then(Value::as_object)
            .unwrap_or(parameter);
        let ty = {
            let mut this = self.push_scope(name)?;
            this.analyze_type_usage(node, IsTopLevel::Inner)?
        };
        let attrs = VarAttrs {
            required,
            default_value: node.get("default").cloned(),
            description: string_field(parameter, "description"),
        };
        self.add_var_decl(fields, ty, name, attrs)
    }

    fn analyze_request_body(&mut self, call: &mut Call, body: &Value) -> Result<()> {
        let body = body
            .as_object()
            .ok_or_else(|| self.malformed("`requestBody` must be a mapping"))?;
        let required = body.get("required").and_then(Value::as_bool).unwrap_or(false);
        match media_schema(body) {
            Some(schema) => {
                self.add_body_schema(&mut call.body, REQUEST_BODY, schema, required, string_field(body, "description"))
            }
            None => Ok(()),
        }
    }

    fn analyze_response(&mut self, code: &str, response: &Value) -> Result<Response> {
        let response = response
            .as_object()
            .ok_or_else(|| self.malformed(format!("response `{code}` must be a mapping")))?;
        let mut body = ObjectSchema {
            description: string_field(response, "description"),
            ..ObjectSchema::default()
        };
        if let Some(schema) = media_schema(response) {
            self.add_body_schema(&mut body, RESPONSE_DATA, schema, true, None)?;
        }
        Ok(Response { code: code.to_owned(), body })
    }

    /// Adds a payload schema to a call's request or response body.
    ///
    /// Object payloads are flattened into the body, their fields forced optional
    /// when the payload itself is. Anything else becomes one field called `base_name`.
    fn add_body_schema(
        &mut self,
        target: &mut ObjectSchema,
        base_name: &str,
        node: &Map<String, Value>,
        required: bool,
        description: Option<String>,
    ) -> Result<()> {
        let ty = if is_object_shaped(node) {
            let schema = self.analyze_schema(node, SubschemasStrategy::Inline)?;
            if !schema.fields.is_empty() || schema.additional_properties.is_some() {
                let forced = (!required).then_some(false);
                return self.merge_from_schema(target, &schema, "", forced);
            }
            schema
                .alias_of()
                .cloned()
                .unwrap_or_else(|| TypeUsage::primitive("object"))
        } else {
            let mut this = self.push_scope(base_name)?;
            this.analyze_type_usage(node, IsTopLevel::Inner)?
        };
        let attrs = VarAttrs {
            required,
            default_value: None,
            description,
        };
        self.add_var_decl(&mut target.fields, ty, base_name, attrs)
    }
}

/// `schema` directly (Swagger 2) or under the first media type of `content` (OpenAPI 3).
fn media_schema(node: &Map<String, Value>) -> Option<&Map<String, Value>> {
    if let Some(schema) = node.get("schema") {
        return schema.as_object();
    }
    node.get("content")?
        .as_object()?
        .values()
        .find_map(|media| media.get("schema")?.as_object())
}

fn is_object_shaped(node: &Map<String, Value>) -> bool {
    let untyped_or_object = match node.get("type") {
        None => true,
        Some(Value::String(name)) => name == "object",
        Some(_) => false,
    };
    untyped_or_object && !node.contains_key("oneOf") && !node.contains_key("anyOf")
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ir::Model;
    use crate::test_utils::{RecordingTranslator, SchemaDir};
    use pretty_assertions::assert_eq;

    const PETSTORE: &str = r#"
swagger: '2.0'
paths:
  '/pets/{petId}':
    parameters:
      - {name: petId, in: path, type: string}
    get:
      operationId: getPet
      summary: Fetch one pet
      parameters:
        - {name: verbose, in: query, type: boolean, default: false}
        - {name: X-Trace, in: header, type: string, required: true}
      responses:
        200:
          description: ok
          schema:
            properties:
              name: {type: string}
            allOf:
              - $ref: '#/definitions/Tagged'
        404:
          description: missing
    put:
      operationId: updatePet
      parameters:
        - name: body
          in: body
          schema: {$ref: '#/definitions/Tagged'}
      responses:
        200:
          description: ok
          schema:
            type: array
            items: {$ref: '#/definitions/Tagged'}
    x-extension: ignored
definitions:
  Tagged:
    required: [tag]
    properties:
      tag: {type: string}
"#;

    fn load(dir: &SchemaDir, translator: &RecordingTranslator, name: &str) -> crate::error::Result<Rc<Model>> {
        let mut analyzer = Analyzer::new(translator, dir.path());
        analyzer.load_model(name, Role::In)
    }

    fn names(fields: &[crate::ir::VarDecl]) -> Vec<&str> {
        fields.iter().map(|f| f.base_name.as_str()).collect()
    }

    #[test]
    fn swagger_operations() {
        let dir = SchemaDir::new();
        dir.write("pets.yaml", PETSTORE);
        let translator = RecordingTranslator::default();
        let model = load(&dir, &translator, "pets.yaml").unwrap();
        let own = dir.canonical("pets.yaml");

        let calls: Vec<_> = model.calls().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(calls, ["getPet", "updatePet"]);

        let get = &model.calls()[0];
        assert_eq!(get.verb, "get");
        assert_eq!(get.path, "/pets/{petId}");
        assert_eq!(get.summary.as_deref(), Some("Fetch one pet"));
        assert_eq!(names(&get.path_params), ["petId"]);
        assert!(get.path_params[0].required);
        assert_eq!(names(&get.query_params), ["verbose"]);
        assert!(!get.query_params[0].required);
        assert_eq!(get.query_params[0].default_value, Some(Value::Bool(false)));
        assert_eq!(names(&get.header_params), ["X-Trace"]);
        assert!(get.header_params[0].required);

        let codes: Vec<_> = get.responses.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, ["200", "404"]);
        let ok = &get.responses[0].body;
        assert_eq!(names(&ok.fields), ["name", "tag"]);
        assert!(ok.fields[1].required);
        assert!(get.responses[1].body.fields.is_empty());

        let put = &model.calls()[1];
        assert_eq!(names(&put.body.fields), ["tag"]);
        assert!(!put.body.fields[0].required, "optional bodies make every field optional");
        let data = &put.responses[0].body.fields;
        assert_eq!(names(data), ["data"]);
        assert_eq!(
            data[0].ty,
            TypeUsage::Array { items: Some(Box::new(TypeUsage::reference(&own, "Tagged"))) }
        );

        assert_eq!(translator.scopes_for("petId"), ["getPet/(in)", "updatePet/(in)"]);
        let name_scopes = translator.scopes_for("name");
        assert!(!name_scopes.is_empty());
        assert!(name_scopes.iter().all(|scope| scope == "getPet/(out)"), "{name_scopes:?}");
    }

    #[test]
    fn openapi3_request_bodies_and_parameters() {
        let dir = SchemaDir::new();
        dir.write(
            "api.yaml",
            r#"
openapi: 3.0.0
paths:
  /rooms:
    post:
      operationId: createRoom
      parameters:
        - name: limit
          in: query
          schema: {type: integer, default: 10}
      requestBody:
        required: true
        content:
          application/json:
            schema:
              required: [name]
              properties:
                name: {type: string}
                topic: {type: string}
      responses:
        '200':
          description: created
          content:
            application/json:
              schema: {type: string}
  /upload:
    post:
      operationId: upload
      requestBody:
        content:
          application/octet-stream:
            schema: {type: string, format: binary}
"#,
        );
        let translator = RecordingTranslator::default();
        let model = load(&dir, &translator, "api.yaml").unwrap();

        let create = &model.calls()[0];
        assert_eq!(create.query_params[0].default_value, Some(serde_json::json!(10)));
        assert_eq!(create.query_params[0].ty, TypeUsage::primitive("integer"));
        assert_eq!(names(&create.body.fields), ["name", "topic"]);
        assert!(create.body.fields[0].required);
        assert!(!create.body.fields[1].required);
        assert_eq!(names(&create.responses[0].body.fields), ["data"]);

        let upload = &model.calls()[1];
        assert_eq!(names(&upload.body.fields), ["body"]);
        assert_eq!(
            upload.body.fields[0].ty,
            TypeUsage::Primitive { name: "string".into(), format: Some("binary".into()) }
        );
        assert!(!upload.body.fields[0].required);
        assert!(upload.responses.is_empty());
    }

    #[test]
    fn form_data_lands_in_the_body() {
        let dir = SchemaDir::new();
        dir.write(
            "form.yaml",
            "paths:\n  /login:\n    post:\n      operationId: login\n      parameters:\n        - {name: user, in: formData, type: string, required: true}\n        - {name: avatar, in: formData, type: file}\n",
        );
        let translator = RecordingTranslator::default();
        let model = load(&dir, &translator, "form.yaml").unwrap();
        let login = &model.calls()[0];
        assert_eq!(names(&login.body.fields), ["user", "avatar"]);
        assert_eq!(login.body.fields[1].ty, TypeUsage::primitive("file"));
    }

    #[test]
    fn request_and_response_sides_are_named_in_different_scopes() {
        let dir = SchemaDir::new();
        dir.write(
            "api.yaml",
            r#"
paths:
  /things:
    post:
      operationId: make
      requestBody:
        content:
          application/json:
            schema:
              properties:
                id: {type: string}
      responses:
        '200':
          description: made
          content:
            application/json:
              schema:
                properties:
                  id: {type: string}
"#,
        );
        let translator = RecordingTranslator::default();
        let model = load(&dir, &translator, "api.yaml").unwrap();
        assert_eq!(names(&model.calls()[0].body.fields), ["id"]);

        let mut scopes = translator.scopes_for("id");
        scopes.dedup();
        assert_eq!(scopes, ["make/(in)", "make/(out)"]);
    }

    #[test]
    fn parameter_references_resolve_within_the_document() {
        let dir = SchemaDir::new();
        dir.write(
            "api.yaml",
            r#"
parameters:
  Limit: {name: limit, in: query, type: integer}
  Trace~Id: {name: X-Trace, in: header, type: string}
paths:
  /pets:
    parameters:
      - $ref: '#/parameters/Limit'
    get:
      operationId: listPets
      parameters:
        - $ref: '#/parameters/Trace~0Id'
"#,
        );
        let translator = RecordingTranslator::default();
        let model = load(&dir, &translator, "api.yaml").unwrap();
        let list = &model.calls()[0];
        assert_eq!(names(&list.query_params), ["limit"]);
        assert_eq!(list.query_params[0].ty, TypeUsage::primitive("integer"));
        assert_eq!(names(&list.header_params), ["X-Trace"]);

        dir.write(
            "dangling.yaml",
            "paths:\n  /pets:\n    get:\n      operationId: listPets\n      parameters:\n        - $ref: '#/parameters/Nope'\n",
        );
        let err = load(&dir, &translator, "dangling.yaml").unwrap_err();
        assert!(
            matches!(err.schema_kind(), Some(SchemaErrorKind::Malformed(m)) if m.contains("#/parameters/Nope")),
            "{err}"
        );
    }

    #[test]
    fn operations_need_an_id() {
        let dir = SchemaDir::new();
        dir.write("api.yaml", "paths:\n  /ping:\n    get:\n      responses: {}\n");
        let translator = RecordingTranslator::default();
        let err = load(&dir, &translator, "api.yaml").unwrap_err();
        assert_eq!(err.schema_kind(), Some(&SchemaErrorKind::MissingOperationId));
        assert!(err.to_string().contains("get /ping"), "{err}");
    }

    #[test]
    fn unknown_parameter_locations_are_rejected() {
        let dir = SchemaDir::new();
        dir.write(
            "api.yaml",
            "paths:\n  /ping:\n    get:\n      operationId: ping\n      parameters:\n        - {name: c, in: cookie, type: string}\n",
        );
        let translator = RecordingTranslator::default();
        let err = load(&dir, &translator, "api.yaml").unwrap_err();
        assert!(matches!(err.schema_kind(), Some(SchemaErrorKind::Malformed(m)) if m.contains("cookie")));
    }
}
