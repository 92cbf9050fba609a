//! Shared fixtures for unit tests.
use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::translator::Translator;

/// Naming policy double: returns the base name untouched and remembers every call.
#[derive(Debug, Default)]
pub(crate) struct RecordingTranslator {
    calls: RefCell<Vec<(String, String)>>,
}

impl RecordingTranslator {
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }

    pub(crate) fn scopes_for(&self, base_name: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|(base, _)| base == base_name)
            .map(|(_, scope)| scope.clone())
            .collect()
    }
}

impl Translator for RecordingTranslator {
    fn map_identifier(&self, base_name: &str, qualified_scope: &str) -> String {
        self.calls
            .borrow_mut()
            .push((base_name.to_owned(), qualified_scope.to_owned()));
        base_name.to_owned()
    }
}

/// A temporary directory of schema files.
pub(crate) struct SchemaDir {
    dir: tempfile::TempDir,
}

impl SchemaDir {
    pub(crate) fn new() -> Self {
        Self { dir: tempfile::tempdir().expect("temp dir") }
    }

    pub(crate) fn path(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture dir");
        }
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    /// Canonical form, as used for cache keys and references.
    pub(crate) fn canonical(&self, relative: &str) -> PathBuf {
        std::fs::canonicalize(self.dir.path().join(relative)).expect("fixture exists")
    }
}
