#![cfg_attr(docsrs, feature(doc_cfg))]

//! # knit-bundler
//!
//! Knit bundler - turns an entry module and everything it requires into one
//! bundle with a source map.
//!
//! The dependency order comes from [`knit_graph::DependencyGraph`]. Each
//! module is run through a pluggable [`Transformer`] behind a
//! modification-time-validated [`TransformCache`], wrapped with its module
//! id, and concatenated by a [`BundleBuilder`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use knit_bundler::Packager;
//! use knit_config::KnitConfig;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = KnitConfig::load(".")?;
//! let packager = Packager::from_config(&config).await?;
//!
//! let bundle = packager.package("index.js", true, "index.map").await?;
//! std::fs::write("bundle.js", bundle.source())?;
//! # Ok(()) }
//! ```

pub mod bundle;
pub mod cache;
pub mod packager;
pub mod transform;
pub mod wrapper;

pub use bundle::{Bundle, BundleBuilder, BundleModule, FinalizeOptions};
pub use cache::{CacheError, CacheOptions, TransformCache};
pub use knit_config::{KnitConfig, ModuleFormat};
pub use knit_graph::{ChangeEvent, ChangeKind, DependencyGraph, Module, Runtime};
pub use packager::{Packager, PackagerBuilder};
pub use transform::{IdentityTransformer, TransformError, TransformOutput, Transformer};

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

use std::path::PathBuf;

/// Error types for knit-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from the dependency graph.
    #[error("Graph error: {0}")]
    Graph(#[from] knit_graph::GraphError),

    /// A module failed to transform.
    #[error("Failed to transform {}: {source}", .path.display())]
    Transform {
        path: PathBuf,
        #[source]
        source: TransformError,
    },

    /// Filesystem error while reading a module or polyfill.
    #[error("Runtime error: {0}")]
    Runtime(#[from] knit_graph::RuntimeError),

    /// Transform cache error (only surfaced by an explicit flush).
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The bundle source map could not be serialized.
    #[error("Source map error: {0}")]
    SourceMap(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for knit-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<knit_config::ConfigError> for Error {
    fn from(err: knit_config::ConfigError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::Graph(knit_graph::GraphError::EntryNotFound { .. }) => "ENTRY_NOT_FOUND",
            Error::Graph(knit_graph::GraphError::RelativeOutsidePackage { .. }) => {
                "RELATIVE_OUTSIDE_PACKAGE"
            }
            Error::Graph(knit_graph::GraphError::PackageMainNotFound { .. }) => {
                "PACKAGE_MAIN_NOT_FOUND"
            }
            Error::Graph(knit_graph::GraphError::Runtime(_)) => "GRAPH_IO_ERROR",
            Error::Transform { .. } => "TRANSFORM_FAILED",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Cache(_) => "CACHE_ERROR",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::SourceMap(_) => "SOURCE_MAP_ERROR",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::Graph(knit_graph::GraphError::EntryNotFound { path }) => Some(Box::new(format!(
                "'{}' was not found by the crawl.\nCheck that it exists under the project root, has a module extension, and is not blacklisted.",
                path.display()
            ))),
            Error::Graph(knit_graph::GraphError::RelativeOutsidePackage { from, .. }) => {
                Some(Box::new(format!(
                    "Relative requires only work inside a package.\nAdd a package.json with a \"name\" above '{}', or require the module by id.",
                    from
                )))
            }
            Error::Graph(knit_graph::GraphError::PackageMainNotFound { package, main, .. }) => {
                Some(Box::new(format!(
                    "Package '{}' declares main file '{}' but no such module was crawled.\nFix the \"main\" field in its package.json.",
                    package,
                    main.display()
                )))
            }
            Error::Transform { path, .. } => Some(Box::new(format!(
                "The transformer rejected '{}'. The bundle was not produced.",
                path.display()
            ))),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your knit.toml and KNIT_* environment variables.\nError: {}",
                msg
            ))),
            Error::Cache(_) => Some(Box::new(
                "The transform cache file can be deleted safely; it is rebuilt on the next run.",
            )),
            _ => None,
        }
    }
}
