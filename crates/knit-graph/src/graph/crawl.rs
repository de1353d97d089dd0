//! Initial crawl of the project root.

use std::path::{Path, PathBuf};

use futures::future::{FutureExt, join, join_all};
use futures::stream::{FuturesUnordered, StreamExt};
use rustc_hash::FxHashSet as HashSet;

use super::state::{DependencyGraph, GraphInner, LoadState};
use crate::error::Result;
use crate::package::{Package, PackageJson};
use crate::runtime::RuntimeResult;

const PACKAGE_JSON: &str = "package.json";

/// Outcome of one unit of crawl work.
enum CrawlStep {
    Listed {
        position: Vec<usize>,
        subdirs: Vec<PathBuf>,
        manifest: Option<PathBuf>,
        modules: Vec<PathBuf>,
    },
    Read(DirScan),
}

/// Everything read from one directory.
struct DirScan {
    /// Child indices from the root down; sorting by (depth, position) gives
    /// breadth-first order.
    position: Vec<usize>,
    package: Option<Package>,
    sources: Vec<(PathBuf, RuntimeResult<String>)>,
}

/// What a directory entry turned out to be.
enum Entry {
    Dir(PathBuf),
    File { name: String, path: PathBuf },
}

impl DependencyGraph {
    /// Crawl the project root and build every index.
    ///
    /// Idempotent: the first call crawls, concurrent and later calls wait for
    /// that same crawl. A failed crawl leaves the graph unloaded so a later
    /// call can retry.
    pub async fn load(&self) -> Result<()> {
        self.loaded.get_or_try_init(|| self.crawl()).await?;
        Ok(())
    }

    async fn crawl(&self) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        self.set_state(LoadState::Loading);

        let result = self.crawl_locked().await;
        match &result {
            Ok(inner) => tracing::debug!(
                root = %inner.root.display(),
                modules = inner.modules_by_path.len(),
                packages = inner.packages_by_root.len(),
                "Dependency graph loaded"
            ),
            Err(e) => tracing::warn!(root = %self.root.display(), error = %e, "Crawl failed"),
        }

        match result {
            Ok(inner) => {
                // Publish in one step so readers never see a half-built graph.
                *self.inner.write() = inner;
                self.set_state(LoadState::Loaded);
                Ok(())
            }
            Err(e) => {
                self.set_state(LoadState::NotLoaded);
                Err(e)
            }
        }
    }

    /// Walk the tree with every listing and read in flight at once.
    ///
    /// A directory's subdirectories are scheduled as soon as its listing is
    /// in, alongside the reads of its own files. Results are then applied to
    /// the new indices in breadth-first order, so a package is always
    /// registered before the modules under it.
    async fn crawl_locked(&self) -> Result<GraphInner> {
        let root = self.runtime.canonicalize(&self.root).await?;

        // Symlinked directories can form cycles.
        let mut seen: HashSet<PathBuf> = HashSet::default();
        seen.insert(root.clone());

        let mut pending = FuturesUnordered::new();
        pending.push(self.list_dir(Vec::new(), root.clone()).boxed());

        let mut scans = Vec::new();
        while let Some(step) = pending.next().await {
            match step? {
                CrawlStep::Listed {
                    position,
                    subdirs,
                    manifest,
                    modules,
                } => {
                    for (index, dir) in subdirs.into_iter().enumerate() {
                        if seen.insert(dir.clone()) {
                            let mut child = position.clone();
                            child.push(index);
                            pending.push(self.list_dir(child, dir).boxed());
                        }
                    }
                    pending.push(self.read_dir_files(position, manifest, modules).boxed());
                }
                CrawlStep::Read(scan) => scans.push(scan),
            }
        }

        scans.sort_by(|a, b| {
            a.position
                .len()
                .cmp(&b.position.len())
                .then_with(|| a.position.cmp(&b.position))
        });

        let mut inner = GraphInner::new(root);
        for scan in scans {
            if let Some(package) = scan.package {
                inner.register_package(package);
            }
            for (path, source) in scan.sources {
                match source {
                    Ok(source) => {
                        let module = inner.build_module(path, &source, &self.extensions);
                        inner.insert_module(module);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable module");
                    }
                }
            }
        }

        Ok(inner)
    }

    /// List `dir` and sort its entries into subdirectories, the manifest and
    /// module files.
    async fn list_dir(&self, position: Vec<usize>, dir: PathBuf) -> Result<CrawlStep> {
        tracing::trace!(dir = %dir.display(), "Crawling directory");

        let mut names = self.runtime.read_dir(&dir).await?;
        names.sort();

        let entries = join_all(names.into_iter().map(|name| self.classify(&dir, name))).await;

        let mut subdirs = Vec::new();
        let mut manifest = None;
        let mut modules = Vec::new();
        for entry in entries {
            match entry? {
                Some(Entry::Dir(path)) => subdirs.push(path),
                Some(Entry::File { name, path }) => {
                    if name == PACKAGE_JSON {
                        manifest.get_or_insert(path);
                    } else if self.extensions.is_module(&path) {
                        modules.push(path);
                    }
                }
                None => {}
            }
        }

        Ok(CrawlStep::Listed {
            position,
            subdirs,
            manifest,
            modules,
        })
    }

    /// Read one directory's `package.json` and module files concurrently.
    async fn read_dir_files(
        &self,
        position: Vec<usize>,
        manifest: Option<PathBuf>,
        modules: Vec<PathBuf>,
    ) -> Result<CrawlStep> {
        let package = async {
            match &manifest {
                Some(manifest) => self.read_package(manifest).await,
                None => Ok(None),
            }
        };
        let sources = join_all(modules.into_iter().map(|path| async move {
            let source = self.runtime.read_to_string(&path).await;
            (path, source)
        }));
        let (package, sources) = join(package, sources).await;

        Ok(CrawlStep::Read(DirScan {
            position,
            package: package?,
            sources,
        }))
    }

    /// Resolve one directory entry. `None` for entries the crawl skips:
    /// ignored paths, dangling symlinks, symlinks to files, and anything that
    /// is neither a file nor a directory.
    async fn classify(&self, dir: &Path, name: String) -> Result<Option<Entry>> {
        let entry = dir.join(&name);

        let real = match self.runtime.canonicalize(&entry).await {
            Ok(real) => real,
            Err(e) if e.is_not_found() => {
                tracing::debug!(path = %entry.display(), "Skipping dangling entry");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if self.is_ignored(&real) {
            tracing::trace!(path = %real.display(), "Ignored");
            return Ok(None);
        }

        let link = self.runtime.symlink_metadata(&entry).await?;
        let metadata = if link.is_symlink {
            self.runtime.metadata(&real).await?
        } else {
            link
        };

        if metadata.is_dir {
            return Ok(Some(Entry::Dir(real)));
        }
        if link.is_symlink || !metadata.is_file {
            return Ok(None);
        }

        Ok(Some(Entry::File { name, path: real }))
    }

    /// Parse a `package.json`. Malformed or nameless manifests are logged and
    /// yield `None`.
    pub(super) async fn read_package(&self, manifest: &Path) -> Result<Option<Package>> {
        let content = match self.runtime.read_to_string(manifest).await {
            Ok(content) => content,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let parsed: PackageJson = match serde_json::from_str(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(path = %manifest.display(), error = %e, "Malformed package.json");
                return Ok(None);
            }
        };

        let Some(root) = manifest.parent() else {
            return Ok(None);
        };

        let package = Package::from_manifest(root, parsed);
        if package.is_none() {
            tracing::warn!(path = %manifest.display(), "package.json is missing a name field");
        }
        Ok(package)
    }
}
