//! Registry of analyzed Models, keyed by canonical file path.
//!
//! A path is either published (analysis finished, Model shared from here on),
//! in progress (currently being analyzed somewhere up the call stack), or
//! unknown. Asking to begin a path that is already in progress is a cycle.
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::{AnalyzerError, Result};
use crate::ir::{Model, ObjectSchema};

#[derive(Debug, Default)]
pub struct ModelCache {
    models: IndexMap<PathBuf, Rc<Model>>,
    in_progress: IndexSet<PathBuf>, // insertion order == recursion order
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&Rc<Model>> {
        self.models.get(path)
    }

    /// Looks up a named schema in a published Model.
    pub fn schema(&self, path: &Path, name: &str) -> Option<&ObjectSchema> {
        self.models.get(path).and_then(|m| m.schema(name))
    }

    pub fn models(&self) -> &IndexMap<PathBuf, Rc<Model>> {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn is_in_progress(&self, path: &Path) -> bool {
        self.in_progress.contains(path)
    }

    /// Marks `path` as being analyzed.
    pub fn begin(&mut self, path: &Path) -> Result<()> {
        if let Some(start) = self.in_progress.get_index_of(path) {
            let mut chain: Vec<PathBuf> = self.in_progress.iter().skip(start).cloned().collect();
            chain.push(path.to_path_buf());
            return Err(AnalyzerError::DependencyCycle { chain });
        }
        self.in_progress.insert(path.to_path_buf());
        Ok(())
    }

    /// Forgets an in-progress mark without publishing anything.
    pub fn abandon(&mut self, path: &Path) {
        self.in_progress.shift_remove(path);
    }

    /// Publishes a finished Model. The first Model published for a path wins.
    pub fn insert(&mut self, path: PathBuf, model: Model) -> Rc<Model> {
        self.in_progress.shift_remove(&path);
        self.models.entry(path).or_insert_with(|| Rc::new(model)).clone()
    }
}
