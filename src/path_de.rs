use serde::de::DeserializeOwned;

/// Deserialize JSON with a path to the offending node in error messages.
pub fn from_json_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = &mut serde_json::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at {path} → {}", err.into_inner()))
        }
    }
}

/// Same for YAML; the path uses the same dotted notation.
pub fn from_yaml_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, String> {
    let de = serde_yaml::Deserializer::from_str(src);
    match serde_path_to_error::deserialize::<_, T>(de) {
        Ok(v) => Ok(v),
        Err(err) => {
            let path = err.path().to_string();
            Err(format!("at {path} → {}", err.into_inner()))
        }
    }
}
