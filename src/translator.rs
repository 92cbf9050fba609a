//! Naming policy: base name + qualified scope → target-language identifier.
//!
//! The analyzer only knows the [`Translator`] trait. [`ConfigTranslator`] is the
//! stock implementation, driven by a small YAML/JSON config:
//!
//! ```yaml
//! identifiers:
//!   getPet/(in)/petId: id     # scoped override
//!   type: kind                # plain override
//!   /^m\.(.*)$/: $1           # pattern, first match wins
//! case: snake                 # preserve | snake | camel | pascal
//! reserved: [type, match]
//! ```
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

pub trait Translator {
    /// Must be deterministic for a given pair.
    fn map_identifier(&self, base_name: &str, qualified_scope: &str) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslatorError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid translator config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
    #[error("invalid identifier pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierCase {
    #[default]
    Preserve,
    Snake,
    Camel,
    Pascal,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranslatorConfig {
    pub identifiers: IndexMap<String, String>,
    pub case: IdentifierCase,
    pub reserved: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ConfigTranslator {
    config: TranslatorConfig,
    patterns: Vec<(Regex, String)>,
}

static NOT_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]").expect("static regex"));

impl ConfigTranslator {
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslatorError> {
        let mut patterns = Vec::new();
        for (key, replacement) in &config.identifiers {
            let Some(pattern) = key.strip_prefix('/').and_then(|k| k.strip_suffix('/')) else {
                continue;
            };
            let regex = Regex::new(pattern).map_err(|source| TranslatorError::Pattern {
                pattern: pattern.to_owned(),
                source,
            })?;
            patterns.push((regex, replacement.clone()));
        }
        Ok(Self { config, patterns })
    }

    /// Loads a config file; `.json` is JSON, anything else YAML.
    pub fn from_file(path: &Path) -> Result<Self, TranslatorError> {
        let src = std::fs::read_to_string(path).map_err(|source| TranslatorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let config = if is_json {
            crate::path_de::from_json_str_with_path::<TranslatorConfig>(&src)
        } else {
            crate::path_de::from_yaml_str_with_path::<TranslatorConfig>(&src)
        };
        let config = config.map_err(|message| TranslatorError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Self::new(config)
    }

    fn substitute(&self, base_name: &str, qualified_scope: &str) -> String {
        if !qualified_scope.is_empty() {
            if let Some(hit) = self.config.identifiers.get(&format!("{qualified_scope}/{base_name}")) {
                return hit.clone();
            }
        }
        if let Some(hit) = self.config.identifiers.get(base_name) {
            return hit.clone();
        }
        for (regex, replacement) in &self.patterns {
            if regex.is_match(base_name) {
                return regex.replace(base_name, replacement.as_str()).into_owned();
            }
        }
        base_name.to_owned()
    }
}

impl Translator for ConfigTranslator {
    fn map_identifier(&self, base_name: &str, qualified_scope: &str) -> String {
        let substituted = self.substitute(base_name, qualified_scope);
        let cased = apply_case(&substituted, self.config.case);
        let mut ident = NOT_IDENT.replace_all(&cased, "_").into_owned();
        if ident.is_empty() {
            ident.push('_');
        }
        if ident.starts_with(|c: char| c.is_ascii_digit()) {
            ident.insert(0, '_');
        }
        if self.config.reserved.iter().any(|r| *r == ident) {
            ident.push('_');
        }
        ident
    }
}

// ----------------------------- Case helpers ------------------------------ //

/// Splits on non-alphanumerics and on lower→upper boundaries (`petId` → `pet`, `Id`).
fn split_words(s: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in s.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn apply_case(s: &str, case: IdentifierCase) -> String {
    match case {
        IdentifierCase::Preserve => s.to_owned(),
        IdentifierCase::Snake => split_words(s)
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
        IdentifierCase::Pascal => split_words(s).iter().map(|w| capitalize(w)).collect(),
        IdentifierCase::Camel => {
            let words = split_words(s);
            let mut out = String::new();
            for (i, w) in words.iter().enumerate() {
                if i == 0 {
                    out.push_str(&w.to_lowercase());
                } else {
                    out.push_str(&capitalize(w));
                }
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn translator(yaml: &str) -> ConfigTranslator {
        let config = crate::path_de::from_yaml_str_with_path::<TranslatorConfig>(yaml).unwrap();
        ConfigTranslator::new(config).unwrap()
    }

    #[rstest]
    #[case(IdentifierCase::Snake, "petId", "pet_id")]
    #[case(IdentifierCase::Snake, "m.room.name", "m_room_name")]
    #[case(IdentifierCase::Camel, "next_batch", "nextBatch")]
    #[case(IdentifierCase::Pascal, "room-version", "RoomVersion")]
    #[case(IdentifierCase::Preserve, "room-version", "room-version")]
    fn case_styles(#[case] case: IdentifierCase, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(apply_case(input, case), expected);
    }

    #[test]
    fn scoped_overrides_beat_plain_ones() {
        let t = translator("identifiers:\n  getPet/(in)/id: petId\n  id: identifier\n");
        assert_eq!(t.map_identifier("id", "getPet/(in)"), "petId");
        assert_eq!(t.map_identifier("id", "getPet/(out)"), "identifier");
        assert_eq!(t.map_identifier("id", "listPets/(in)"), "identifier");
        assert_eq!(t.map_identifier("id", ""), "identifier");
    }

    #[test]
    fn patterns_apply_when_nothing_exact_matches() {
        let t = translator("identifiers:\n  '/^m\\.(.*)$/': $1\n");
        assert_eq!(t.map_identifier("m.relates_to", "Event"), "relates_to");
        assert_eq!(t.map_identifier("body", "Event"), "body");
    }

    #[test]
    fn output_is_always_a_plain_identifier() {
        let t = translator("case: preserve\nreserved: [type]\n");
        assert_eq!(t.map_identifier("content-type", "X"), "content_type");
        assert_eq!(t.map_identifier("2fa", "X"), "_2fa");
        assert_eq!(t.map_identifier("type", "X"), "type_");
        assert_eq!(t.map_identifier("", "X"), "_");
    }

    #[test]
    fn bad_patterns_are_reported() {
        let config = TranslatorConfig {
            identifiers: IndexMap::from([("/(unclosed/".to_owned(), "x".to_owned())]),
            ..TranslatorConfig::default()
        };
        assert!(matches!(ConfigTranslator::new(config), Err(TranslatorError::Pattern { .. })));
    }

    #[test]
    fn loads_from_json_and_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("naming.json");
        std::fs::write(&json, r#"{"case": "snake"}"#).unwrap();
        assert_eq!(ConfigTranslator::from_file(&json).unwrap().map_identifier("roomId", ""), "room_id");

        let yaml = dir.path().join("naming.yaml");
        std::fs::write(&yaml, "case: sideways\n").unwrap();
        let err = ConfigTranslator::from_file(&yaml).unwrap_err();
        assert!(matches!(err, TranslatorError::Config { .. }), "{err}");
    }
}
