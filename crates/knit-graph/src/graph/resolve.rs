//! Dependency resolution.

use std::path::PathBuf;
use std::sync::Arc;

use path_clean::PathClean;

use super::state::{DependencyGraph, GraphInner};
use crate::error::{GraphError, Result};
use crate::extensions::Extensions;
use crate::module::Module;

/// Outcome of resolving one `require` string.
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(Arc<Module>),
    /// Not fatal: the reference is kept on the module but not traversed.
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn module(&self) -> Option<&Arc<Module>> {
        match self {
            Resolution::Resolved(module) => Some(module),
            Resolution::Unresolved(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Neither a known module id nor a known package name.
    UnknownModule { name: String },
    /// Relative reference whose target path is not in the graph.
    MissingFile { path: PathBuf },
}

impl DependencyGraph {
    /// Resolve `reference` as required from `from`.
    ///
    /// Top-level references match a module id first, then a package name
    /// (resolving to the package's main file). References starting with `.`
    /// are resolved against `from`'s directory and must live in a package.
    pub fn resolve_dependency(&self, from: &Module, reference: &str) -> Result<Resolution> {
        self.inner
            .read()
            .resolve(from, reference, &self.extensions, None)
    }
}

impl GraphInner {
    /// `shadow` overrides the id index for its own id.
    pub(super) fn resolve(
        &self,
        from: &Module,
        reference: &str,
        extensions: &Extensions,
        shadow: Option<&Arc<Module>>,
    ) -> Result<Resolution> {
        let name = extensions.strip_ext(reference);

        if !name.starts_with('.') {
            if let Some(module) = shadow.filter(|m| m.id() == name) {
                return Ok(Resolution::Resolved(Arc::clone(module)));
            }
            if let Some(module) = self.modules_by_id.get(name) {
                return Ok(Resolution::Resolved(Arc::clone(module)));
            }

            let Some(package) = self.packages_by_name.get(name) else {
                tracing::warn!(
                    reference,
                    from = from.id(),
                    "Cannot find required module"
                );
                return Ok(Resolution::Unresolved(UnresolvedReason::UnknownModule {
                    name: name.to_string(),
                }));
            };

            let main = package.main_path(extensions);
            return match self.modules_by_path.get(&main) {
                Some(module) => Ok(Resolution::Resolved(Arc::clone(module))),
                None => Err(GraphError::PackageMainNotFound {
                    package: package.name().to_string(),
                    root: package.root().to_path_buf(),
                    main,
                }),
            };
        }

        if self.lookup_package(from.path()).is_none() {
            return Err(GraphError::RelativeOutsidePackage {
                from: from.id().to_string(),
                reference: reference.to_string(),
            });
        }

        let dir = from.path().parent().unwrap_or(&self.root);
        let path = extensions.with_ext(&dir.join(name).clean());

        match self.modules_by_path.get(&path) {
            Some(module) => Ok(Resolution::Resolved(Arc::clone(module))),
            None => {
                tracing::warn!(
                    reference,
                    from = from.id(),
                    inferred = %path.display(),
                    "Cannot find required module"
                );
                Ok(Resolution::Unresolved(UnresolvedReason::MissingFile { path }))
            }
        }
    }
}
