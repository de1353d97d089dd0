//! The dependency graph.
//!
//! [`DependencyGraph`] owns every index (modules by path and by id, packages
//! by root and by name). Methods are spread over a few files, each adding an
//! `impl` block:
//!
//! - `state` - the graph type, its builder and the index bookkeeping
//! - `crawl` - the initial concurrent directory walk behind [`DependencyGraph::load`]
//! - `resolve` - turning a `require` string into a module
//! - `traversal` - ordered dependency listing for an entry module
//! - `changes` - incremental maintenance from file change events

mod changes;
mod crawl;
mod resolve;
mod state;
mod traversal;

pub use changes::{ChangeEvent, ChangeKind};
pub use resolve::{Resolution, UnresolvedReason};
pub use state::{DependencyGraph, GraphBuilder, IgnoreFn, LoadState};
pub use traversal::OrderedModule;
