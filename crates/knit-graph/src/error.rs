//! Error types for graph loading and queries.

use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::RuntimeError;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Fatal graph errors. Tolerated conditions (dangling requires, nameless
/// packages, id conflicts) are logged instead.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("module with path \"{}\" is not in the graph", .path.display())]
    EntryNotFound { path: PathBuf },

    #[error(
        "expected relative module lookup from `{from}` to `{reference}` to be within a package, but no package.json was found"
    )]
    RelativeOutsidePackage { from: String, reference: String },

    #[error("cannot find main file {} for package `{package}` at {}", .main.display(), .root.display())]
    PackageMainNotFound {
        package: String,
        root: PathBuf,
        main: PathBuf,
    },

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
