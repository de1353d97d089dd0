//! Test runtime backed directly by `std::fs`.
//!
//! Tests run against real files in a `tempfile::TempDir` instead of a mocked
//! filesystem. Calls are made inline on the async task, which keeps test
//! behaviour deterministic under the current-thread executor.

// Test utilities are allowed to use std::fs
#![allow(clippy::disallowed_methods)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use super::native::{io_error, to_metadata};
use super::{FileMetadata, Runtime, RuntimeError, RuntimeResult};

/// Simple test runtime that wraps std::fs and counts file reads.
///
/// ```rust,ignore
/// use knit_graph::{Runtime, TestRuntime};
/// use tempfile::TempDir;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let temp = TempDir::new().unwrap();
/// std::fs::write(temp.path().join("a.js"), b"content").unwrap();
///
/// let runtime = TestRuntime::new();
/// let content = runtime.read_file(&temp.path().join("a.js")).await.unwrap();
/// assert_eq!(content, b"content");
/// assert_eq!(runtime.reads(), 1);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct TestRuntime {
    reads: Mutex<Vec<PathBuf>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `read_file` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.lock().len()
    }

    /// Paths passed to `read_file`, in call order.
    pub fn read_log(&self) -> Vec<PathBuf> {
        self.reads.lock().clone()
    }

    /// Make every subsequent `write_file` fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl Runtime for TestRuntime {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
        self.reads.lock().push(path.to_path_buf());
        std::fs::read(path).map_err(|e| io_error("read", path, e))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RuntimeError::Io(format!(
                "writes disabled: {}",
                path.display()
            )));
        }
        std::fs::write(path, content).map_err(|e| io_error("write", path, e))
    }

    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        std::fs::metadata(path)
            .map(|m| to_metadata(&m))
            .map_err(|e| io_error("stat", path, e))
    }

    async fn symlink_metadata(&self, path: &Path) -> RuntimeResult<FileMetadata> {
        std::fs::symlink_metadata(path)
            .map(|m| to_metadata(&m))
            .map_err(|e| io_error("lstat", path, e))
    }

    async fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf> {
        std::fs::canonicalize(path).map_err(|e| io_error("resolve", path, e))
    }

    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>> {
        let entries: Vec<String> = std::fs::read_dir(path)
            .map_err(|e| io_error("read directory", path, e))?
            .filter_map(|entry| {
                entry
                    .ok()
                    .and_then(|e| e.file_name().to_str().map(String::from))
            })
            .collect();
        Ok(entries)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()> {
        if recursive {
            std::fs::create_dir_all(path).map_err(|e| io_error("create directory", path, e))
        } else {
            std::fs::create_dir(path).map_err(|e| io_error("create directory", path, e))
        }
    }

    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()> {
        std::fs::rename(from, to).map_err(|e| io_error("rename", from, e))
    }

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()> {
        std::fs::remove_file(path).map_err(|e| io_error("remove", path, e))
    }
}
