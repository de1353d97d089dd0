//! # knit-config
//!
//! Project configuration for the knit packager.
//!
//! A [`KnitConfig`] describes one project: where its sources live, which
//! paths the crawler skips, which extensions count as modules, how modules
//! are wrapped in the bundle, and where the transform cache is persisted.
//!
//! Configuration is layered with `figment`: built-in defaults, then
//! `knit.toml` in the project root, then `KNIT_`-prefixed environment
//! variables (nested keys separated by `__`, e.g. `KNIT_CACHE__DEBOUNCE_MS`).
//!
//! ```no_run
//! use knit_config::{KnitConfig, validate_schema};
//!
//! let config = KnitConfig::load(".").unwrap();
//! validate_schema(&config).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod loading;
pub mod validation;

pub use config::*;
pub use error::*;

pub use validation::{ConfigValidator, FsValidator, SchemaValidator, validate_fs, validate_schema};
