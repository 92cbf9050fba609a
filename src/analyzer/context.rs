//! The context stack: which file, which Model, which scope.
//!
//! Every push hands back a [`ContextGuard`] that derefs to the analyzer and
//! restores the stack when dropped, so early returns and `?` unwind it too.
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use super::Analyzer;
use crate::error::{AnalyzerError, Result};
use crate::ir::Model;
use crate::scope::{Identifier, Role};

#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) file_dir: PathBuf,
    pub(crate) model: usize, // index into `Analyzer::building`
    pub(crate) scope: Identifier,
}

pub(crate) struct ContextGuard<'a, 't> {
    analyzer: &'a mut Analyzer<'t>,
    contexts: usize,
    building: usize,
    in_progress: Option<PathBuf>,
}

impl<'t> Deref for ContextGuard<'_, 't> {
    type Target = Analyzer<'t>;

    fn deref(&self) -> &Self::Target {
        self.analyzer
    }
}

impl DerefMut for ContextGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.analyzer
    }
}

impl Drop for ContextGuard<'_, '_> {
    fn drop(&mut self) {
        self.analyzer.contexts.truncate(self.contexts);
        self.analyzer.building.truncate(self.building);
        if let Some(path) = self.in_progress.take() {
            self.analyzer.cache.abandon(&path);
        }
    }
}

impl<'t> Analyzer<'t> {
    /// Starts analysis of `path`: marks it in progress, opens an empty Model and a root scope.
    pub(super) fn enter_file(&mut self, path: &Path, role: Role) -> Result<ContextGuard<'_, 't>> {
        self.cache.begin(path)?;
        let contexts = self.contexts.len();
        let building = self.building.len();
        self.building.push(Model::new(path));
        self.contexts.push(Context {
            file_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
            model: building,
            scope: Identifier::root(role),
        });
        Ok(ContextGuard {
            analyzer: self,
            contexts,
            building,
            in_progress: Some(path.to_path_buf()),
        })
    }

    /// Same file and Model as now, different scope.
    pub(super) fn push_context(&mut self, scope: Identifier) -> Result<ContextGuard<'_, 't>> {
        let current = self.context()?;
        let context = Context {
            file_dir: current.file_dir.clone(),
            model: current.model,
            scope,
        };
        let contexts = self.contexts.len();
        let building = self.building.len();
        self.contexts.push(context);
        Ok(ContextGuard { analyzer: self, contexts, building, in_progress: None })
    }

    /// Current scope, one segment deeper.
    pub(super) fn push_scope(&mut self, name: &str) -> Result<ContextGuard<'_, 't>> {
        let scope = self.current_scope()?.nested(name);
        self.push_context(scope)
    }

    /// Detaches the Model of the innermost file context, leaving the stack otherwise as is.
    pub(super) fn take_model(&mut self) -> Result<Model> {
        let index = self.context()?.model;
        if index + 1 != self.building.len() {
            return Err(AnalyzerError::Internal("the current model is not the innermost one"));
        }
        self.building
            .pop()
            .ok_or(AnalyzerError::Internal("no model under construction"))
    }

    pub(crate) fn context(&self) -> Result<&Context> {
        self.contexts
            .last()
            .ok_or(AnalyzerError::Internal("trying to access the context before creation"))
    }

    pub(crate) fn current_model(&self) -> Result<&Model> {
        let index = self.context()?.model;
        self.building
            .get(index)
            .ok_or(AnalyzerError::Internal("context refers to a model that is gone"))
    }

    pub(crate) fn current_model_mut(&mut self) -> Result<&mut Model> {
        let index = self.context()?.model;
        self.building
            .get_mut(index)
            .ok_or(AnalyzerError::Internal("context refers to a model that is gone"))
    }

    pub(crate) fn current_scope(&self) -> Result<&Identifier> {
        Ok(&self.context()?.scope)
    }

    pub(crate) fn current_role(&self) -> Result<Role> {
        Ok(self.current_scope()?.role())
    }

    pub(crate) fn current_call(&self) -> Result<Option<&str>> {
        Ok(self.current_scope()?.call())
    }
}
