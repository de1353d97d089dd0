//! Core DependencyGraph structure and inner state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::RwLock;
use regex::RegexSet;
use rustc_hash::FxHashMap as HashMap;
use tokio::sync::{Mutex, OnceCell};

use crate::docblock::Docblock;
use crate::extensions::Extensions;
use crate::module::Module;
use crate::package::Package;
use crate::requires::extract_requires;
use crate::runtime::{NativeRuntime, Runtime};

/// Predicate over absolute, symlink-resolved paths. Matching files and
/// directories are skipped by the crawl and by change processing.
pub type IgnoreFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

/// Where the graph is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
}

impl LoadState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LoadState::Loading,
            2 => LoadState::Loaded,
            _ => LoadState::NotLoaded,
        }
    }
}

/// Module registry and dependency graph for one project root.
///
/// Created with [`DependencyGraph::builder`]. Nothing is indexed until
/// [`load`](DependencyGraph::load) completes; afterwards the graph is kept
/// current through [`process_change`](DependencyGraph::process_change).
pub struct DependencyGraph {
    pub(super) root: PathBuf,
    pub(super) runtime: Arc<dyn Runtime>,
    pub(super) extensions: Extensions,
    pub(super) ignore: Option<IgnoreFn>,
    pub(super) inner: RwLock<GraphInner>,
    /// Serialises every mutation (crawl and change processing) in FIFO order.
    pub(super) write_gate: Mutex<()>,
    pub(super) loaded: OnceCell<()>,
    pub(super) state: AtomicU8,
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("DependencyGraph")
            .field("root", &inner.root)
            .field("extensions", &self.extensions)
            .field("modules", &inner.modules_by_path.len())
            .field("packages", &inner.packages_by_root.len())
            .field("state", &self.load_state())
            .finish()
    }
}

/// Builder for [`DependencyGraph`].
pub struct GraphBuilder {
    root: PathBuf,
    runtime: Option<Arc<dyn Runtime>>,
    extensions: Extensions,
    ignore: Option<IgnoreFn>,
}

impl GraphBuilder {
    /// Filesystem access. Defaults to [`NativeRuntime`].
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn ignore<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Path) -> bool + Send + Sync + 'static,
    {
        self.ignore = Some(Arc::new(predicate));
        self
    }

    /// Ignore every path matching any of `patterns`.
    pub fn ignore_patterns(self, patterns: RegexSet) -> Self {
        self.ignore(move |path| patterns.is_match(&path.to_string_lossy()))
    }

    pub fn build(self) -> DependencyGraph {
        DependencyGraph {
            inner: RwLock::new(GraphInner::new(self.root.clone())),
            root: self.root,
            runtime: self.runtime.unwrap_or_else(|| Arc::new(NativeRuntime::new())),
            extensions: self.extensions,
            ignore: self.ignore,
            write_gate: Mutex::new(()),
            loaded: OnceCell::new(),
            state: AtomicU8::new(0),
        }
    }
}

impl DependencyGraph {
    pub fn builder(root: impl Into<PathBuf>) -> GraphBuilder {
        GraphBuilder {
            root: root.into(),
            runtime: None,
            extensions: Extensions::default(),
            ignore: None,
        }
    }

    /// Project root. Symlink-resolved once the graph has loaded.
    pub fn root(&self) -> PathBuf {
        self.inner.read().root.clone()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn runtime(&self) -> &Arc<dyn Runtime> {
        &self.runtime
    }

    pub fn load_state(&self) -> LoadState {
        LoadState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state() == LoadState::Loaded
    }

    pub(super) fn set_state(&self, state: LoadState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn module_by_path(&self, path: &Path) -> Option<Arc<Module>> {
        self.inner.read().modules_by_path.get(path).cloned()
    }

    pub fn module_by_id(&self, id: &str) -> Option<Arc<Module>> {
        self.inner.read().modules_by_id.get(id).cloned()
    }

    pub fn package_by_name(&self, name: &str) -> Option<Arc<Package>> {
        self.inner.read().packages_by_name.get(name).cloned()
    }

    /// Number of live modules.
    pub fn module_count(&self) -> usize {
        self.inner.read().modules_by_path.len()
    }

    pub(super) fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.as_ref().is_some_and(|ignore| ignore(path))
    }
}

/// The indices. Only mutated by the holder of the write gate.
#[derive(Debug, Default)]
pub(super) struct GraphInner {
    pub root: PathBuf,
    pub modules_by_path: HashMap<PathBuf, Arc<Module>>,
    pub modules_by_id: HashMap<String, Arc<Module>>,
    pub packages_by_root: HashMap<PathBuf, Arc<Package>>,
    pub packages_by_name: HashMap<String, Arc<Package>>,
}

impl GraphInner {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            ..Self::default()
        }
    }

    /// Build a module record for `path` from its source text.
    pub fn build_module(&self, path: PathBuf, source: &str, extensions: &Extensions) -> Module {
        let id = match Docblock::parse(source).provides_module() {
            Some(declared) => declared.to_string(),
            None => self.derived_id(&path, extensions),
        };
        Module::new(id, path, extract_requires(source))
    }

    /// Package-relative name, or the absolute path outside any package.
    fn derived_id(&self, path: &Path, extensions: &Extensions) -> String {
        self.lookup_package(path)
            .and_then(|package| package.module_id(path, extensions))
            .unwrap_or_else(|| path.to_string_lossy().into_owned())
    }

    /// Nearest enclosing package of `path`.
    ///
    /// For paths under the root the walk stops at the root. Paths outside it
    /// (symlinked packages) walk up to the filesystem root.
    pub fn lookup_package(&self, path: &Path) -> Option<&Arc<Package>> {
        let under_root = path.starts_with(&self.root);
        let mut dir = path.parent();

        while let Some(current) = dir {
            if let Some(package) = self.packages_by_root.get(current) {
                return Some(package);
            }
            if under_root && current == self.root {
                return None;
            }
            dir = current.parent();
        }

        None
    }

    pub fn insert_module(&mut self, module: Module) -> Arc<Module> {
        let module = Arc::new(module);

        if let Some(previous) = self
            .modules_by_path
            .insert(module.path().to_path_buf(), Arc::clone(&module))
        {
            if previous.id() != module.id() {
                self.unbind_id(&previous);
            }
        }

        if let Some(replaced) = self
            .modules_by_id
            .insert(module.id().to_string(), Arc::clone(&module))
        {
            if replaced.path() != module.path() {
                tracing::warn!(
                    id = module.id(),
                    path = %module.path().display(),
                    replaced = %replaced.path().display(),
                    "Top-level module name conflict; the later module wins"
                );
            }
        }

        module
    }

    /// Remove the module at `path`, marking it deleted.
    pub fn remove_module(&mut self, path: &Path) -> Option<Arc<Module>> {
        let module = self.modules_by_path.remove(path)?;
        module.mark_deleted();
        self.unbind_id(&module);
        Some(module)
    }

    /// Drop the id binding only if it still points at `module`.
    fn unbind_id(&mut self, module: &Arc<Module>) {
        let bound = self
            .modules_by_id
            .get(module.id())
            .is_some_and(|current| Arc::ptr_eq(current, module));
        if bound {
            self.modules_by_id.remove(module.id());
        }
    }

    pub fn register_package(&mut self, package: Package) {
        let package = Arc::new(package);

        if let Some(previous) = self
            .packages_by_root
            .insert(package.root().to_path_buf(), Arc::clone(&package))
        {
            self.unbind_package_name(&previous);
        }

        if let Some(other) = self
            .packages_by_name
            .insert(package.name().to_string(), Arc::clone(&package))
        {
            if other.root() != package.root() {
                tracing::warn!(
                    name = package.name(),
                    root = %package.root().display(),
                    replaced = %other.root().display(),
                    "Package name conflict; the later package wins"
                );
            }
        }
    }

    pub fn unregister_package(&mut self, root: &Path) -> Option<Arc<Package>> {
        let package = self.packages_by_root.remove(root)?;
        self.unbind_package_name(&package);
        Some(package)
    }

    fn unbind_package_name(&mut self, package: &Arc<Package>) {
        let bound = self
            .packages_by_name
            .get(package.name())
            .is_some_and(|current| Arc::ptr_eq(current, package));
        if bound {
            self.packages_by_name.remove(package.name());
        }
    }
}
