//! # knit-graph
//!
//! Module registry and dependency graph for the knit packager.
//!
//! The graph crawls a project root, indexes every module file by path and by
//! id, registers `package.json` directories as packages, and answers two
//! questions: what does a `require("...")` string refer to, and which modules
//! (in which order) does an entry module need.
//!
//! ## Ids
//!
//! A module's id comes from its leading doc block (`@providesModule` or
//! `@provides`). Without one, a module inside a package is named
//! `<package name>/<path inside the package, extension stripped>`, and any
//! other module is named by its absolute path. Ids are not unique; the last
//! module processed wins the id.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use knit_graph::DependencyGraph;
//!
//! # async fn run() -> knit_graph::Result<()> {
//! let graph = DependencyGraph::builder("/path/to/project").build();
//! graph.load().await?;
//!
//! for module in graph.ordered_dependencies("index.js")? {
//!     println!("{} -> {}", module.id(), module.path().display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Reads take a short `parking_lot` read lock. Every mutation, the initial
//! crawl included, goes through a single FIFO write gate, so change events
//! queued during the crawl apply after it in arrival order.

pub mod docblock;
pub mod error;
pub mod extensions;
pub mod graph;
pub mod module;
pub mod package;
pub mod requires;
pub mod runtime;

pub use docblock::Docblock;
pub use error::{GraphError, Result};
pub use extensions::Extensions;
pub use graph::{
    ChangeEvent, ChangeKind, DependencyGraph, GraphBuilder, IgnoreFn, LoadState, OrderedModule,
    Resolution, UnresolvedReason,
};
pub use module::{Module, ModuleSummary};
pub use package::{Package, PackageJson};
pub use requires::extract_requires;
pub use runtime::{FileMetadata, NativeRuntime, Runtime, RuntimeError, RuntimeResult};

// Test utilities (available in test builds)
#[cfg(any(test, doctest, feature = "test-utils"))]
pub use runtime::test_utils::TestRuntime;
