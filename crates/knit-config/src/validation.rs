//! Pluggable config validation strategies
//!
//! Schema checks need nothing but the config value. Filesystem checks also
//! look at the project root and the polyfill files.

use std::path::{Path, PathBuf};

use crate::config::KnitConfig;
use crate::error::{ConfigError, Result};

/// Upper bound for `cache.debounce_ms` (ten minutes).
pub const MAX_DEBOUNCE_MS: u64 = 600_000;

/// Trait for pluggable config validation strategies
pub trait ConfigValidator {
    fn validate(&self, config: &KnitConfig) -> Result<()>;
}

/// Schema-only validation (no filesystem checks)
///
/// # Example
///
/// ```
/// use knit_config::{KnitConfig, SchemaValidator, ConfigValidator};
///
/// let config = KnitConfig::new("/project");
/// SchemaValidator.validate(&config).unwrap();
/// ```
pub struct SchemaValidator;

impl ConfigValidator for SchemaValidator {
    fn validate(&self, config: &KnitConfig) -> Result<()> {
        if config.extensions.is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "at least one module extension is required".to_string(),
                hint: Some("Set extensions = [\"js\"]".to_string()),
            });
        }

        for ext in &config.extensions {
            if ext.trim().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "extensions cannot be empty".to_string(),
                    hint: Some("Remove empty strings from the 'extensions' array".to_string()),
                });
            }
            if ext.starts_with('.') {
                return Err(ConfigError::SchemaValidation {
                    message: format!("extension '{ext}' must not start with a dot"),
                    hint: Some(format!("Use '{}' instead", ext.trim_start_matches('.'))),
                });
            }
        }

        config.blacklist_set()?;

        for polyfill in &config.polyfills {
            if polyfill.as_os_str().is_empty() {
                return Err(ConfigError::SchemaValidation {
                    message: "polyfill path cannot be empty".to_string(),
                    hint: None,
                });
            }
        }

        if config.cache.version.trim().is_empty() {
            return Err(ConfigError::SchemaValidation {
                message: "cache version cannot be empty".to_string(),
                hint: Some("Any non-empty string works, e.g. version = \"1\"".to_string()),
            });
        }

        if config.cache.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::SchemaValidation {
                message: format!(
                    "cache debounce_ms {} exceeds the maximum of {MAX_DEBOUNCE_MS}",
                    config.cache.debounce_ms
                ),
                hint: Some("Use a window of a few seconds, e.g. 2000".to_string()),
            });
        }

        if !(config.transform.is_null() || config.transform.is_object()) {
            return Err(ConfigError::InvalidValue {
                field: "transform".to_string(),
                message: "expected a table of transformer options".to_string(),
            });
        }

        Ok(())
    }
}

/// Filesystem validator (for CLI use)
///
/// Checks that the project root is a directory and every polyfill exists.
pub struct FsValidator {
    root: PathBuf,
}

impl FsValidator {
    /// Relative config paths are resolved against `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ConfigValidator for FsValidator {
    fn validate(&self, config: &KnitConfig) -> Result<()> {
        SchemaValidator.validate(config)?;

        let project_root = self.root.join(&config.project_root);
        if !project_root.is_dir() {
            return Err(ConfigError::RootNotFound { path: project_root });
        }

        for polyfill in &config.polyfills {
            let path = project_root.join(polyfill);
            if !path.is_file() {
                return Err(ConfigError::PolyfillNotFound { path });
            }
        }

        Ok(())
    }
}

/// Convenience function for schema-only validation
pub fn validate_schema(config: &KnitConfig) -> Result<()> {
    SchemaValidator.validate(config)
}

/// Convenience function for filesystem validation
///
/// ```no_run
/// use knit_config::{KnitConfig, validate_fs};
///
/// let config = KnitConfig::load(".").unwrap();
/// validate_fs(&config, ".").unwrap();
/// ```
pub fn validate_fs(config: &KnitConfig, root: impl AsRef<Path>) -> Result<()> {
    FsValidator::new(root).validate(config)
}
