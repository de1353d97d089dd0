//! Cache file naming.
//!
//! One cache file per project and cache version, so unrelated projects that
//! share a cache directory never read each other's entries.

use std::path::Path;

use blake3::Hasher;

/// `transform-<hash>.bin`, where the hash covers the project root and the
/// configured cache version.
pub fn cache_file_name(project_root: &Path, version: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(version.as_bytes());
    hasher.update(b"\0"); // separator
    hasher.update(project_root.as_os_str().as_encoded_bytes());

    let hash = hasher.finalize();
    format!("transform-{}.bin", &hash.to_hex()[..32])
}
