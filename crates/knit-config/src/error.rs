//! Error types for configuration validation and loading.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Filesystem validation errors
    #[error("project root is not a directory: {path}")]
    RootNotFound { path: PathBuf },

    #[error("polyfill not found: {path}")]
    PolyfillNotFound { path: PathBuf },

    // Config parsing/loading errors
    #[error("invalid config value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid blacklist pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    // Schema validation errors (no filesystem checks)
    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
