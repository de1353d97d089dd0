//! Incremental maintenance from file change events.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use tokio::sync::mpsc;

use super::state::DependencyGraph;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Change,
    Delete,
}

/// A change reported by a file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Path relative to the project root. Absolute paths are used as-is.
    pub path: PathBuf,
    /// Whether the path is a directory, when the watcher knows.
    pub is_dir: Option<bool>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
            is_dir: None,
        }
    }

    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Add, path)
    }

    pub fn change(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Change, path)
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::new(ChangeKind::Delete, path)
    }

    pub fn with_is_dir(mut self, is_dir: bool) -> Self {
        self.is_dir = Some(is_dir);
        self
    }

    /// Absolute path of the event under `root`.
    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        root.join(&self.path).clean()
    }
}

impl DependencyGraph {
    /// Apply one change event.
    ///
    /// Waits behind any mutation already in progress, including the initial
    /// crawl, so events apply in arrival order. Ignored paths and directories
    /// are dropped, as are symlinks to files. Paths are symlink-resolved
    /// first, so a change seen through a symlinked directory updates the
    /// module the crawl recorded. `package.json` changes re-register (or unregister) the
    /// package; module files are re-read and re-indexed.
    pub async fn process_change(&self, event: &ChangeEvent) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let Some(path) = self.event_path(&event.absolute_path(&self.root())).await? else {
            return Ok(());
        };
        if self.is_ignored(&path) {
            tracing::trace!(path = %path.display(), "Ignoring change");
            return Ok(());
        }

        tracing::debug!(kind = ?event.kind, path = %path.display(), "Processing change");

        match event.kind {
            ChangeKind::Delete => {
                self.forget(&path);
                Ok(())
            }
            ChangeKind::Add | ChangeKind::Change => self.refresh(&path, event.is_dir).await,
        }
    }

    /// Drain `events` into [`process_change`](Self::process_change) until the
    /// sender side closes. Failures are logged and do not stop the loop.
    pub async fn watch(&self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.process_change(&event).await {
                tracing::warn!(path = %event.path.display(), error = %e, "Failed to apply change");
            }
        }
    }

    /// Symlink-resolved form of an event path, as the crawl would record it.
    /// `None` for a symlink to a file. A path that no longer exists is
    /// resolved through its parent directory.
    async fn event_path(&self, path: &Path) -> Result<Option<PathBuf>> {
        match self.runtime.canonicalize(path).await {
            Ok(real) => {
                let link = self.runtime.symlink_metadata(path).await?;
                if link.is_symlink && !self.runtime.metadata(&real).await?.is_dir {
                    tracing::trace!(path = %path.display(), "Ignoring change to symlinked file");
                    return Ok(None);
                }
                Ok(Some(real))
            }
            Err(e) if e.is_not_found() => {
                let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
                    return Ok(Some(path.to_path_buf()));
                };
                match self.runtime.canonicalize(parent).await {
                    Ok(parent) => Ok(Some(parent.join(name))),
                    Err(e) if e.is_not_found() => Ok(Some(path.to_path_buf())),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn forget(&self, path: &Path) {
        let mut inner = self.inner.write();
        if is_manifest(path) {
            if let Some(root) = path.parent() {
                inner.unregister_package(root);
            }
        }
        if let Some(module) = inner.remove_module(path) {
            tracing::debug!(id = module.id(), "Module removed");
        }
    }

    async fn refresh(&self, path: &Path, is_dir: Option<bool>) -> Result<()> {
        let is_dir = match is_dir {
            Some(is_dir) => is_dir,
            None => match self.runtime.metadata(path).await {
                Ok(metadata) => metadata.is_dir,
                Err(e) if e.is_not_found() => {
                    self.forget(path);
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            },
        };
        if is_dir {
            return Ok(());
        }

        if is_manifest(path) {
            let package = self.read_package(path).await?;
            let mut inner = self.inner.write();
            match (package, path.parent()) {
                (Some(package), _) => inner.register_package(package),
                (None, Some(root)) => {
                    inner.unregister_package(root);
                }
                (None, None) => {}
            }
            return Ok(());
        }

        if !self.extensions.is_module(path) {
            return Ok(());
        }

        let source = match self.runtime.read_to_string(path).await {
            Ok(source) => source,
            Err(e) if e.is_not_found() => {
                self.forget(path);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let mut inner = self.inner.write();
        let module = inner.build_module(path.to_path_buf(), &source, &self.extensions);
        let module = inner.insert_module(module);
        tracing::debug!(id = module.id(), "Module updated");
        Ok(())
    }
}

fn is_manifest(path: &Path) -> bool {
    path.file_name().is_some_and(|name| name == "package.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_event_paths() {
        let root = Path::new("/root");
        assert_eq!(
            ChangeEvent::change("a/../b.js").absolute_path(root),
            PathBuf::from("/root/b.js")
        );
        assert_eq!(
            ChangeEvent::delete("/elsewhere/c.js").absolute_path(root),
            PathBuf::from("/elsewhere/c.js")
        );
    }

    #[test]
    fn directory_hint() {
        let event = ChangeEvent::change("pkg").with_is_dir(true);
        assert_eq!(event.is_dir, Some(true));
        assert_eq!(event.kind, ChangeKind::Change);
    }
}
