//! On-disk format of the transform cache.
//!
//! The whole table is one bincode blob: a format version followed by a map
//! from absolute path to `{ modified, data }`. Writes go to a sibling temp
//! file that is then renamed over the cache file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use knit_graph::{Runtime, RuntimeError};
use serde::{Deserialize, Serialize};

use crate::transform::TransformOutput;

/// Current cache format version. Increment when the format changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Error types for cache operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] RuntimeError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("cache version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// One cached transform with the modification time (ms since epoch) the
/// file had when it was loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedEntry {
    pub modified: u64,
    pub data: TransformOutput,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    entries: BTreeMap<PathBuf, CachedEntry>,
}

pub fn encode(entries: BTreeMap<PathBuf, CachedEntry>) -> CacheResult<Vec<u8>> {
    let file = CacheFile {
        format_version: CACHE_FORMAT_VERSION,
        entries,
    };
    bincode::serialize(&file).map_err(|e| CacheError::Serialization(e.to_string()))
}

pub fn decode(bytes: &[u8]) -> CacheResult<BTreeMap<PathBuf, CachedEntry>> {
    // The version leads the blob, so it can be checked before the rest of the
    // layout is trusted.
    let found: u32 =
        bincode::deserialize(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))?;
    if found != CACHE_FORMAT_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: CACHE_FORMAT_VERSION,
            found,
        });
    }

    let file: CacheFile =
        bincode::deserialize(bytes).map_err(|e| CacheError::Deserialization(e.to_string()))?;
    Ok(file.entries)
}

/// Read the cache file. A missing file is an empty cache.
pub async fn read(
    runtime: &dyn Runtime,
    path: &Path,
) -> CacheResult<Option<BTreeMap<PathBuf, CachedEntry>>> {
    match runtime.read_file(path).await {
        Ok(bytes) => decode(&bytes).map(Some),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write the cache file atomically (temp file + rename).
pub async fn write(
    runtime: &dyn Runtime,
    path: &Path,
    entries: BTreeMap<PathBuf, CachedEntry>,
) -> CacheResult<()> {
    let bytes = encode(entries)?;

    if let Some(dir) = path.parent() {
        runtime.create_dir(dir, true).await?;
    }

    let temp_path = path.with_extension("tmp");
    runtime.write_file(&temp_path, &bytes).await?;
    if let Err(e) = runtime.rename(&temp_path, path).await {
        let _ = runtime.remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
