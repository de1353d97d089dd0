//! Configuration types for a knit project.

use std::path::{Path, PathBuf};

use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// Top-level project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnitConfig {
    /// Directory crawled for modules and packages.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,

    /// Regular expressions matched against absolute paths. Matching files and
    /// directories are never crawled and their change events are dropped.
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// File extensions (without the dot) treated as modules. The first one is
    /// appended to extensionless references during resolution.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Files prepended, unwrapped and in order, to every bundle.
    #[serde(default)]
    pub polyfills: Vec<PathBuf>,

    /// How module code is wrapped in the bundle.
    #[serde(default)]
    pub module_format: ModuleFormat,

    #[serde(default)]
    pub cache: CacheSettings,

    /// Opaque options handed to the transformer untouched.
    #[serde(default)]
    pub transform: Value,
}

/// Module transport wrapper used when concatenating modules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleFormat {
    /// `__d("id", [deps], function(...) { code });`
    #[default]
    Define,
    /// Code is emitted as-is.
    Raw,
}

/// Transform cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When false the cache still memoizes in memory but never touches disk.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory holding the cache file. Defaults to `<tmp>/knit`.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Bumping this orphans every previously written cache file.
    #[serde(default = "default_cache_version")]
    pub version: String,

    /// Quiet period after the last cache population before the table is
    /// written back to disk.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
            version: default_cache_version(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl CacheSettings {
    /// Directory the cache file lives in, falling back to the system temp dir.
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("knit"))
    }
}

impl Default for KnitConfig {
    fn default() -> Self {
        Self::new(default_project_root())
    }
}

impl KnitConfig {
    /// Defaults for a project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: root.into(),
            blacklist: Vec::new(),
            extensions: default_extensions(),
            polyfills: Vec::new(),
            module_format: ModuleFormat::default(),
            cache: CacheSettings::default(),
            transform: Value::Null,
        }
    }

    /// Compile the blacklist into a single matcher.
    ///
    /// Returns `None` when nothing is blacklisted.
    pub fn blacklist_set(&self) -> Result<Option<RegexSet>> {
        if self.blacklist.is_empty() {
            return Ok(None);
        }

        // Compile one by one first so the error names the offending pattern.
        for pattern in &self.blacklist {
            Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        }

        RegexSet::new(&self.blacklist)
            .map(Some)
            .map_err(|e| ConfigError::InvalidPattern {
                pattern: self.blacklist.join(" | "),
                message: e.to_string(),
            })
    }

    /// Polyfill paths made absolute against the project root.
    pub fn resolved_polyfills(&self) -> Vec<PathBuf> {
        self.polyfills
            .iter()
            .map(|p| absolutize(&self.project_root, p))
            .collect()
    }
}

pub(crate) fn absolutize(base: &Path, path: &Path) -> PathBuf {
    use path_clean::PathClean;

    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path).clean()
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_extensions() -> Vec<String> {
    vec!["js".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_cache_version() -> String {
    "1".to_string()
}

fn default_debounce_ms() -> u64 {
    2000
}
