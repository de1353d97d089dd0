//! The per-file transform seam.
//!
//! The packager never looks inside module code. It hands the source text to a
//! [`Transformer`] and bundles whatever comes back, so any source-to-source
//! compiler can be plugged in.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of transforming one file. This is the value the transform cache
/// stores and persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformOutput {
    /// Transformed code, not yet wrapped with its module identity.
    pub code: String,
    /// Original source text, embedded in the bundle source map.
    pub source_code: String,
    pub source_path: PathBuf,
    /// Source map (JSON) from `code` back to `source_code`, if the
    /// transformer produced one.
    pub map: Option<String>,
}

impl TransformOutput {
    /// Output that is the source itself, with no map.
    pub fn identity(source: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let source = source.into();
        Self {
            code: source.clone(),
            source_code: source,
            source_path: path.into(),
            map: None,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    /// The transformer rejected the input.
    #[error("{message}")]
    Failed { message: String },

    #[error("transformer returned an invalid source map: {0}")]
    InvalidSourceMap(String),
}

impl TransformError {
    pub fn failed(message: impl Into<String>) -> Self {
        TransformError::Failed {
            message: message.into(),
        }
    }
}

/// A source-to-source transform.
///
/// `options` is the free-form `transform` table from the project config,
/// forwarded untouched.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
///
/// use async_trait::async_trait;
/// use knit_bundler::{TransformError, TransformOutput, Transformer};
/// use serde_json::Value;
///
/// #[derive(Debug)]
/// struct Uppercase;
///
/// #[async_trait]
/// impl Transformer for Uppercase {
///     async fn transform(
///         &self,
///         source: &str,
///         path: &Path,
///         _options: &Value,
///     ) -> Result<TransformOutput, TransformError> {
///         let mut output = TransformOutput::identity(source, path);
///         output.code = source.to_uppercase();
///         Ok(output)
///     }
/// }
/// ```
#[async_trait]
pub trait Transformer: Send + Sync + std::fmt::Debug {
    async fn transform(
        &self,
        source: &str,
        path: &Path,
        options: &Value,
    ) -> Result<TransformOutput, TransformError>;
}

/// Passes sources through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransformer;

#[async_trait]
impl Transformer for IdentityTransformer {
    async fn transform(
        &self,
        source: &str,
        path: &Path,
        _options: &Value,
    ) -> Result<TransformOutput, TransformError> {
        Ok(TransformOutput::identity(source, path))
    }
}
