//! Module file extensions.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The set of extensions (without the dot) that mark a file as a module.
///
/// The first extension is the one appended to extensionless references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions(Vec<String>);

impl Default for Extensions {
    fn default() -> Self {
        Self::new(["js"])
    }
}

impl Extensions {
    /// Empty input falls back to `js`.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list: Vec<String> = extensions
            .into_iter()
            .map(Into::into)
            .map(|e| e.trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();

        if list.is_empty() {
            Self::default()
        } else {
            Self(list)
        }
    }

    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// True when `path` ends in one of the extensions.
    pub fn is_module(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.0.iter().any(|known| known == ext))
    }

    /// `name` with a trailing module extension removed.
    pub fn strip_ext<'a>(&self, name: &'a str) -> &'a str {
        for ext in &self.0 {
            let stem = name
                .strip_suffix(ext.as_str())
                .and_then(|stem| stem.strip_suffix('.'));
            if let Some(stem) = stem {
                return stem;
            }
        }
        name
    }

    /// `path` with the primary extension appended unless it already has a
    /// module extension.
    pub fn with_ext(&self, path: &Path) -> PathBuf {
        if self.is_module(path) {
            return path.to_path_buf();
        }
        let mut os: OsString = path.as_os_str().to_owned();
        os.push(".");
        os.push(self.primary());
        PathBuf::from(os)
    }
}
