//! Error taxonomy for the analyzer.
//!
//! Three families, all propagated with `?` up the recursive call chain:
//! - `Internal`: the analyzer broke one of its own invariants (fatal);
//! - dependency failures (`Io`, `Parse`, `DependencyCycle`);
//! - schema-shape errors, attributed to a file and a scope-qualified location.
use std::path::PathBuf;

pub type Result<T, E = AnalyzerError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    /// Not part of the recoverable taxonomy: seeing this means the analyzer has a defect.
    #[error("internal error: {0}")]
    Internal(&'static str),

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("dependency cycle: {}", display_chain(chain))]
    DependencyCycle { chain: Vec<PathBuf> },

    #[error("{}: at `{location}`: {kind}", file.display())]
    Schema {
        file: PathBuf,
        location: String,
        kind: SchemaErrorKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaErrorKind {
    #[error("a union needs at least two alternatives, found {found}")]
    MalformedUnion { found: usize },
    #[error("undefined type `{0}`")]
    UndefinedType(String),
    #[error("identifier `{identifier}` is produced for both `{existing}` and `{incoming}`")]
    NameClash {
        identifier: String,
        existing: String,
        incoming: String,
    },
    #[error("empty $ref")]
    EmptyRef,
    #[error("schema `{0}` is defined more than once")]
    DuplicateSchema(String),
    #[error("schema `{0}` is composed from itself")]
    CircularComposition(String),
    #[error("operation has no operationId")]
    MissingOperationId,
    #[error("{0}")]
    Malformed(String),
}

impl AnalyzerError {
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    /// The schema-shape kind, if this is a schema error.
    pub fn schema_kind(&self) -> Option<&SchemaErrorKind> {
        match self {
            Self::Schema { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl From<crate::ir::NameClash> for SchemaErrorKind {
    fn from(clash: crate::ir::NameClash) -> Self {
        Self::NameClash {
            identifier: clash.identifier,
            existing: clash.existing,
            incoming: clash.incoming,
        }
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_the_chain_in_order() {
        let err = AnalyzerError::DependencyCycle {
            chain: vec!["a.yaml".into(), "b.yaml".into(), "a.yaml".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle: a.yaml -> b.yaml -> a.yaml");
        assert!(!err.is_internal());
    }

    #[test]
    fn schema_error_names_file_and_location() {
        let err = AnalyzerError::Schema {
            file: "api/pet.yaml".into(),
            location: "Pet/tags".into(),
            kind: SchemaErrorKind::MalformedUnion { found: 1 },
        };
        assert_eq!(
            err.to_string(),
            "api/pet.yaml: at `Pet/tags`: a union needs at least two alternatives, found 1"
        );
        assert_eq!(err.schema_kind(), Some(&SchemaErrorKind::MalformedUnion { found: 1 }));
    }
}
