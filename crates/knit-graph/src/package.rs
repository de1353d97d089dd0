//! `package.json` handling.

use std::path::{Path, PathBuf};

use path_clean::PathClean;
use serde::Deserialize;

use crate::extensions::Extensions;

/// Default entry file when `main` is absent.
pub const DEFAULT_MAIN: &str = "index";

/// The fields of `package.json` the graph cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageJson {
    pub name: Option<String>,
    pub main: Option<String>,
}

/// A directory registered as a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    root: PathBuf,
    name: String,
    main: String,
}

impl Package {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>, main: Option<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            main: main
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MAIN.to_string()),
        }
    }

    /// Build a package from parsed `package.json` contents. Returns `None`
    /// when the manifest has no usable `name`.
    pub fn from_manifest(root: impl Into<PathBuf>, manifest: PackageJson) -> Option<Self> {
        let name = manifest.name.filter(|n| !n.trim().is_empty())?;
        Some(Self::new(root, name, manifest.main))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn main(&self) -> &str {
        &self.main
    }

    /// Absolute path of the main module, extension normalised.
    pub fn main_path(&self, extensions: &Extensions) -> PathBuf {
        extensions.with_ext(&self.root.join(&self.main).clean())
    }

    /// Id for a module at `path` inside this package:
    /// `<name>/<relative path without extension>`.
    pub fn module_id(&self, path: &Path, extensions: &Extensions) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Some(format!("{}/{}", self.name, extensions.strip_ext(&relative)))
    }
}
