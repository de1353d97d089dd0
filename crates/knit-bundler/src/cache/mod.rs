//! Transform cache.
//!
//! Memoizes [`TransformOutput`]s by absolute file path. An entry is fresh
//! while the file's modification time still equals the one recorded when the
//! entry was loaded. Change events drop entries outright, whatever the mtime
//! says, since filesystem clocks can be coarse.
//!
//! # Persistence
//!
//! With a cache directory configured, the table is loaded from
//! `<dir>/transform-<hash>.bin` on [`TransformCache::open`], keeping only
//! entries whose file still exists with the recorded mtime. Every population
//! schedules a debounced write of the whole table (see [`FlushSchedule`]), so
//! a burst of misses costs one write. Write failures are logged and never
//! reach callers of [`TransformCache::get`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use knit_bundler::TransformOutput;
//! use knit_bundler::cache::{CacheOptions, TransformCache};
//! use knit_graph::NativeRuntime;
//!
//! # async fn example() -> std::io::Result<()> {
//! let cache = TransformCache::open(
//!     Arc::new(NativeRuntime),
//!     CacheOptions::new("/project").dir("/tmp/knit"),
//! )
//! .await;
//!
//! let output = cache
//!     .get("/project/index.js".as_ref(), |path| async move {
//!         let source = std::fs::read_to_string(&path)?;
//!         Ok::<_, std::io::Error>(TransformOutput::identity(source, path))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod key;
pub mod schedule;
mod storage;

pub use key::cache_file_name;
pub use schedule::{FlushAction, FlushSchedule};
pub use storage::{CACHE_FORMAT_VERSION, CacheError, CacheResult, CachedEntry};

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use knit_config::CacheSettings;
use knit_graph::{ChangeEvent, Runtime};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use crate::transform::TransformOutput;

/// Default coalescing window for cache writes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2000);

/// How a [`TransformCache`] is set up.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Project root. Relative change-event paths resolve against it, and it
    /// is part of the cache file name.
    pub project_root: PathBuf,

    /// Directory holding the cache file. `None` keeps the cache in memory.
    pub dir: Option<PathBuf>,

    pub version: String,

    pub debounce: Duration,
}

impl CacheOptions {
    /// In-memory cache for `project_root` with the default debounce window.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            dir: None,
            version: "1".to_string(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Options from the project config. A disabled cache stays in memory.
    pub fn from_settings(project_root: impl Into<PathBuf>, settings: &CacheSettings) -> Self {
        Self {
            project_root: project_root.into(),
            dir: settings.enabled.then(|| settings.resolved_dir()),
            version: settings.version.clone(),
            debounce: Duration::from_millis(settings.debounce_ms),
        }
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Full path of the cache file, if persistence is on.
    pub fn file_path(&self) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(cache_file_name(&self.project_root, &self.version)))
    }
}

/// Memoizing, mtime-validated store of transform results.
///
/// Cheap to clone; clones share one table.
#[derive(Debug, Clone)]
pub struct TransformCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    runtime: Arc<dyn Runtime>,
    project_root: PathBuf,
    file: Option<PathBuf>,
    entries: RwLock<FxHashMap<PathBuf, CachedEntry>>,
    /// Per-path load locks, so concurrent misses on one path load once.
    /// Entries live only while a load for the path is in progress.
    loading: Mutex<FxHashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    /// Bumped on every invalidation. A load that overlaps one does not store
    /// its result.
    epoch: AtomicU64,
    schedule: Mutex<FlushSchedule>,
    /// Serialises disk writes.
    write_lock: tokio::sync::Mutex<()>,
}

impl TransformCache {
    /// An empty in-memory cache.
    pub fn new(runtime: Arc<dyn Runtime>, options: CacheOptions) -> Self {
        let file = options.file_path();
        Self {
            inner: Arc::new(CacheInner {
                runtime,
                project_root: options.project_root,
                file,
                entries: RwLock::new(FxHashMap::default()),
                loading: Mutex::new(FxHashMap::default()),
                epoch: AtomicU64::new(0),
                schedule: Mutex::new(FlushSchedule::new(options.debounce)),
                write_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Create the cache and load any persisted table.
    ///
    /// An unreadable or incompatible cache file is logged and treated as
    /// empty. Persisted entries are kept only if their file still exists with
    /// the recorded modification time.
    pub async fn open(runtime: Arc<dyn Runtime>, options: CacheOptions) -> Self {
        let cache = Self::new(runtime, options);
        if let Some(file) = cache.inner.file.clone() {
            cache.restore(&file).await;
        }
        cache
    }

    async fn restore(&self, file: &Path) {
        let persisted = match storage::read(self.inner.runtime.as_ref(), file).await {
            Ok(Some(entries)) => entries,
            Ok(None) => {
                tracing::debug!(path = %file.display(), "No transform cache on disk");
                return;
            }
            Err(e) => {
                tracing::warn!(path = %file.display(), error = %e, "Ignoring unreadable transform cache");
                return;
            }
        };

        let total = persisted.len();
        let mut kept = FxHashMap::default();
        for (path, entry) in persisted {
            if self.current_mtime(&path).await == Some(entry.modified) {
                kept.insert(path, entry);
            }
        }

        tracing::debug!(
            path = %file.display(),
            kept = kept.len(),
            dropped = total - kept.len(),
            "Loaded transform cache"
        );
        *self.inner.entries.write() = kept;
    }

    /// Cached transform of `path`, calling `loader` on a miss.
    ///
    /// An entry is a hit when the file's current modification time equals the
    /// recorded one. Concurrent calls for the same path wait for the first
    /// load and then re-check, so `loader` runs once. A failed load stores
    /// nothing.
    pub async fn get<F, Fut, E>(&self, path: &Path, loader: F) -> Result<TransformOutput, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<TransformOutput, E>>,
    {
        let lock = self.load_lock(path);
        let result = {
            let _guard = lock.lock().await;
            self.get_locked(path, loader).await
        };
        self.release_load_lock(path, &lock);
        result
    }

    async fn get_locked<F, Fut, E>(&self, path: &Path, loader: F) -> Result<TransformOutput, E>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<TransformOutput, E>>,
    {
        let epoch = self.inner.epoch.load(Ordering::Acquire);
        let modified = self.current_mtime(path).await;

        if let Some(modified) = modified {
            if let Some(entry) = self.inner.entries.read().get(path) {
                if entry.modified == modified {
                    tracing::trace!(path = %path.display(), "Transform cache hit");
                    return Ok(entry.data.clone());
                }
            }
        }

        tracing::trace!(path = %path.display(), "Transform cache miss");
        let value = loader(path.to_path_buf()).await?;

        match modified {
            Some(modified) if self.inner.epoch.load(Ordering::Acquire) == epoch => {
                self.inner.entries.write().insert(
                    path.to_path_buf(),
                    CachedEntry {
                        modified,
                        data: value.clone(),
                    },
                );
                self.schedule_flush();
            }
            Some(_) => {
                tracing::debug!(path = %path.display(), "Invalidated during load, not caching");
            }
            None => {
                tracing::debug!(path = %path.display(), "No modification time, not caching");
            }
        }

        Ok(value)
    }

    /// Drop the entry for `path`, whatever its modification time.
    pub fn invalidate(&self, path: &Path) {
        self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        if self.inner.entries.write().remove(path).is_some() {
            tracing::trace!(path = %path.display(), "Transform cache entry invalidated");
        }
    }

    /// Drop the entry a change event refers to.
    pub fn process_change(&self, event: &ChangeEvent) {
        self.invalidate(&event.absolute_path(&self.inner.project_root));
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.inner.entries.read().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.read().is_empty()
    }

    /// Cache file location, or `None` for an in-memory cache.
    pub fn file_path(&self) -> Option<&Path> {
        self.inner.file.as_deref()
    }

    /// Write the table to disk now. No-op for an in-memory cache.
    pub async fn flush(&self) -> CacheResult<()> {
        self.inner.schedule.lock().begin_flush();
        self.inner.persist().await
    }

    fn load_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut loading = self.inner.loading.lock();
        Arc::clone(loading.entry(path.to_path_buf()).or_default())
    }

    /// Drop the lock for `path` once no other caller holds or waits on it.
    fn release_load_lock(&self, path: &Path, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut loading = self.inner.loading.lock();
        // One reference is ours, the other the map's.
        if Arc::strong_count(lock) == 2 {
            loading.remove(path);
        }
    }

    async fn current_mtime(&self, path: &Path) -> Option<u64> {
        match self.inner.runtime.metadata(path).await {
            Ok(metadata) => metadata.modified,
            Err(e) => {
                if !e.is_not_found() {
                    tracing::debug!(path = %path.display(), error = %e, "Failed to stat cached file");
                }
                None
            }
        }
    }

    fn schedule_flush(&self) {
        if self.inner.file.is_none() {
            return;
        }

        let start = self.inner.schedule.lock().touch(now());
        if start {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_flusher().await });
        }
    }
}

impl CacheInner {
    /// Sleep until the table has been quiet for the debounce window, write it,
    /// and repeat while new touches keep arriving.
    async fn run_flusher(&self) {
        loop {
            let action = {
                let mut schedule = self.schedule.lock();
                let action = schedule.next_action(now());
                match action {
                    FlushAction::Idle => schedule.stop(),
                    FlushAction::Flush => schedule.begin_flush(),
                    FlushAction::Wait(_) => {}
                }
                action
            };

            match action {
                FlushAction::Idle => return,
                FlushAction::Wait(delay) => tokio::time::sleep(delay).await,
                FlushAction::Flush => {
                    if let Err(e) = self.persist().await {
                        tracing::warn!(error = %e, "Failed to write transform cache");
                    }
                }
            }
        }
    }

    async fn persist(&self) -> CacheResult<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };

        let _guard = self.write_lock.lock().await;
        let snapshot: BTreeMap<PathBuf, CachedEntry> = self
            .entries
            .read()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();

        let count = snapshot.len();
        storage::write(self.runtime.as_ref(), file, snapshot).await?;
        tracing::debug!(path = %file.display(), entries = count, "Transform cache written");
        Ok(())
    }
}

/// Tokio's clock, which follows paused time.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}
