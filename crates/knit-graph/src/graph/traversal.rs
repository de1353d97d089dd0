//! Ordered dependency listing.

use std::path::Path;
use std::sync::Arc;

use path_clean::PathClean;
use rustc_hash::FxHashSet as HashSet;

use super::resolve::Resolution;
use super::state::DependencyGraph;
use crate::error::{GraphError, Result};
use crate::module::Module;

/// One entry of an ordered listing, with the references of the module that
/// resolved in the same snapshot.
#[derive(Debug, Clone)]
pub struct OrderedModule {
    pub module: Arc<Module>,
    /// `(reference, target)` in require order. Unresolved references are left
    /// out; repeated references appear once per occurrence.
    pub resolved: Vec<(String, Arc<Module>)>,
}

impl DependencyGraph {
    /// Every module reachable from `entry`, in pre-order with the entry first.
    ///
    /// Each module appears once (keyed by id), dependencies are visited in
    /// the order they are required, and unresolved references are skipped.
    /// While the query runs the entry owns its id, so a same-named module
    /// elsewhere cannot take its place. Relative entry paths are taken from
    /// the project root.
    pub fn ordered_dependencies(&self, entry: impl AsRef<Path>) -> Result<Vec<Arc<Module>>> {
        Ok(self
            .ordered_resolutions(entry)?
            .into_iter()
            .map(|ordered| ordered.module)
            .collect())
    }

    /// Like [`ordered_dependencies`](Self::ordered_dependencies), but also
    /// returns how each module's references resolved. Listing and resolutions
    /// come from one read of the graph, so a concurrent change cannot make
    /// them disagree.
    pub fn ordered_resolutions(&self, entry: impl AsRef<Path>) -> Result<Vec<OrderedModule>> {
        let inner = self.inner.read();

        let entry = entry.as_ref();
        let path = if entry.is_absolute() {
            entry.clean()
        } else {
            inner.root.join(entry).clean()
        };

        let entry = inner
            .modules_by_path
            .get(&path)
            .cloned()
            .ok_or(GraphError::EntryNotFound { path })?;

        let mut visited: HashSet<String> = HashSet::default();
        visited.insert(entry.id().to_string());
        let mut ordered = vec![OrderedModule {
            module: Arc::clone(&entry),
            resolved: Vec::new(),
        }];

        // Explicit frame stack: (module, its slot in `ordered`, index of the
        // next dependency to visit).
        let mut stack = vec![(Arc::clone(&entry), 0usize, 0usize)];
        while let Some((module, slot, next)) = stack.last_mut() {
            let Some(reference) = module.dependencies().get(*next).cloned() else {
                stack.pop();
                continue;
            };
            *next += 1;
            let from = Arc::clone(module);
            let slot = *slot;

            let resolution = inner.resolve(&from, &reference, &self.extensions, Some(&entry))?;
            if let Resolution::Resolved(dep) = resolution {
                ordered[slot].resolved.push((reference, Arc::clone(&dep)));
                if visited.insert(dep.id().to_string()) {
                    ordered.push(OrderedModule {
                        module: Arc::clone(&dep),
                        resolved: Vec::new(),
                    });
                    stack.push((dep, ordered.len() - 1, 0));
                }
            }
        }

        Ok(ordered)
    }
}
