//! Filesystem abstraction for the dependency graph and the transform cache.
//!
//! Everything that touches the disk goes through [`Runtime`], so the graph
//! can be driven by the native filesystem in production and by a plain
//! `std::fs` wrapper in tests.

pub mod native;

pub use native::NativeRuntime;

#[cfg(any(test, doctest, feature = "test-utils"))]
pub mod test_utils;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors that can occur during runtime operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Runtime error: {0}")]
    Other(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::FileNotFound(_))
    }
}

/// File metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,
    pub is_dir: bool,
    pub is_file: bool,
    /// Only ever true for metadata obtained through [`Runtime::symlink_metadata`].
    pub is_symlink: bool,
    /// Last modified timestamp (milliseconds since epoch)
    pub modified: Option<u64>,
}

/// Platform runtime trait
///
/// # Example
///
/// ```rust,ignore
/// use knit_graph::{Runtime, RuntimeError, RuntimeResult};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct MyRuntime;
///
/// #[async_trait]
/// impl Runtime for MyRuntime {
///     async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>> {
///         std::fs::read(path).map_err(|e| RuntimeError::Io(e.to_string()))
///     }
///
///     // ... implement other methods
/// }
/// ```
#[async_trait]
pub trait Runtime: Send + Sync + std::fmt::Debug {
    async fn read_file(&self, path: &Path) -> RuntimeResult<Vec<u8>>;

    /// Write `content` to `path`, replacing any existing file.
    async fn write_file(&self, path: &Path, content: &[u8]) -> RuntimeResult<()>;

    /// Metadata of `path`, following symlinks.
    async fn metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Metadata of `path` itself, without following a final symlink.
    async fn symlink_metadata(&self, path: &Path) -> RuntimeResult<FileMetadata>;

    /// Absolute path with every symlink resolved.
    async fn canonicalize(&self, path: &Path) -> RuntimeResult<PathBuf>;

    /// Entry names (not paths) of a directory, in no particular order.
    async fn read_dir(&self, path: &Path) -> RuntimeResult<Vec<String>>;

    fn exists(&self, path: &Path) -> bool;

    async fn create_dir(&self, path: &Path, recursive: bool) -> RuntimeResult<()>;

    /// Atomically move `from` over `to`.
    async fn rename(&self, from: &Path, to: &Path) -> RuntimeResult<()>;

    async fn remove_file(&self, path: &Path) -> RuntimeResult<()>;

    /// Read a file as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> RuntimeResult<String> {
        let bytes = self.read_file(path).await?;
        String::from_utf8(bytes)
            .map_err(|e| RuntimeError::Io(format!("{} is not valid UTF-8: {e}", path.display())))
    }
}
