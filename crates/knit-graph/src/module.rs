//! Module records held by the graph.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

/// A source file known to the graph.
///
/// Modules are shared as `Arc<Module>`. When the backing file is removed the
/// graph drops its own references and flips [`Module::is_deleted`], so any
/// holder of an older `Arc` can tell the module is gone.
#[derive(Debug, Serialize)]
pub struct Module {
    id: String,
    path: PathBuf,
    dependencies: Vec<String>,
    #[serde(skip)]
    deleted: AtomicBool,
}

impl Module {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, dependencies: Vec<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            dependencies,
            deleted: AtomicBool::new(false),
        }
    }

    /// Declared or derived module id. Not necessarily unique.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Absolute, symlink-resolved path. Unique within a graph.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw `require` strings in source order, duplicates included.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, Ordering::Release);
    }
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.path == other.path && self.dependencies == other.dependencies
    }
}

impl Eq for Module {}

/// Compact `(id, path, dependencies)` view, handy in assertions and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSummary {
    pub id: String,
    pub path: PathBuf,
    pub dependencies: Vec<String>,
}

impl From<&Arc<Module>> for ModuleSummary {
    fn from(module: &Arc<Module>) -> Self {
        Self {
            id: module.id.clone(),
            path: module.path.clone(),
            dependencies: module.dependencies.clone(),
        }
    }
}
