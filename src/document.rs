//! Schema files → generic document tree (`serde_json::Value`, order-preserving).
use std::path::Path;

use serde_json::{Map, Number, Value};

use crate::error::{AnalyzerError, Result};

/// Reads and parses a schema file. `.json` goes through serde_json, everything else through serde_yaml.
pub fn load_document(path: &Path) -> Result<Value> {
    let source = std::fs::read_to_string(path).map_err(|source| AnalyzerError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str::<Value>(&source).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<serde_yaml::Value>(&source)
            .map_err(|e| e.to_string())
            .and_then(yaml_to_tree)
    };
    parsed.map_err(|message| AnalyzerError::Parse { path: path.to_path_buf(), message })
}

/// YAML allows non-string keys (`200:`); the tree does not, so they are stringified.
fn yaml_to_tree(yaml: serde_yaml::Value) -> Result<Value, String> {
    use serde_yaml::Value as Y;
    Ok(match yaml {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => yaml_number(&n)?,
        Y::String(s) => Value::String(s),
        Y::Sequence(xs) => Value::Array(xs.into_iter().map(yaml_to_tree).collect::<Result<_, _>>()?),
        Y::Mapping(m) => {
            let mut out = Map::with_capacity(m.len());
            for (k, v) in m {
                out.insert(yaml_key(k)?, yaml_to_tree(v)?);
            }
            Value::Object(out)
        }
        Y::Tagged(tagged) => yaml_to_tree(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Result<Value, String> {
    if let Some(i) = n.as_i64() {
        Ok(Value::from(i))
    } else if let Some(u) = n.as_u64() {
        Ok(Value::from(u))
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("number `{n}` has no JSON representation"))
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, String> {
    use serde_yaml::Value as Y;
    match key {
        Y::String(s) => Ok(s),
        Y::Bool(b) => Ok(b.to_string()),
        Y::Number(n) => Ok(n.to_string()),
        Y::Null => Ok("null".to_owned()),
        Y::Tagged(tagged) => yaml_key(tagged.value),
        Y::Sequence(_) | Y::Mapping(_) => Err("mapping keys must be scalars".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn yaml_keeps_key_order_and_stringifies_scalar_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ops.yaml");
        std::fs::write(&path, "responses:\n  200: {description: ok}\n  404: {}\nzeta: 1\nalpha: [true, 1.5]\n").unwrap();

        let doc = load_document(&path).unwrap();
        let keys: Vec<_> = doc.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["responses", "zeta", "alpha"]);
        assert_eq!(doc["responses"]["200"], json!({"description": "ok"}));
        assert_eq!(doc["alpha"], json!([true, 1.5]));
    }

    #[test]
    fn json_extension_uses_the_json_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pet.json");
        std::fs::write(&path, r#"{"type": "object", "properties": {"id": {"type": "integer"}}}"#).unwrap();
        let doc = load_document(&path).unwrap();
        assert_eq!(doc["properties"]["id"]["type"], "integer");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Io { .. }), "{err:?}");
    }

    #[test]
    fn broken_syntax_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"type\": ").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, AnalyzerError::Parse { .. }), "{err:?}");
    }
}
