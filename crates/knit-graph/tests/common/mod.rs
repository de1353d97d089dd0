//! Shared fixtures: a real project tree in a temp directory.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use knit_graph::{DependencyGraph, ModuleSummary};
use tempfile::TempDir;

pub struct Project {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        // Compare against resolved paths (temp dirs may sit behind a symlink).
        let root = temp.path().canonicalize().unwrap().join("root");
        fs::create_dir_all(&root).unwrap();
        Self { _temp: temp, root }
    }

    /// Write `contents` to `rel` under the project root, creating parents.
    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    /// A directory next to the project root, outside it.
    pub fn outside(&self, rel: &str) -> PathBuf {
        self.root.parent().unwrap().join(rel)
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.root.join(rel)).unwrap();
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn graph(&self) -> DependencyGraph {
        DependencyGraph::builder(&self.root).build()
    }
}

/// Module source with a `@providesModule` doc block followed by `body` lines.
pub fn provides(id: &str, body: &[&str]) -> String {
    let mut lines = vec![
        "/**".to_string(),
        format!(" * @providesModule {id}"),
        " */".to_string(),
    ];
    lines.extend(body.iter().map(|l| l.to_string()));
    lines.join("\n")
}

pub fn package_json(name: &str, main: &str) -> String {
    serde_json::json!({ "name": name, "main": main }).to_string()
}

pub fn m(id: &str, path: impl AsRef<Path>, deps: &[&str]) -> ModuleSummary {
    ModuleSummary {
        id: id.to_string(),
        path: path.as_ref().to_path_buf(),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
    }
}

pub fn ordered(graph: &DependencyGraph, entry: impl AsRef<Path>) -> Vec<ModuleSummary> {
    graph
        .ordered_dependencies(entry)
        .unwrap()
        .iter()
        .map(ModuleSummary::from)
        .collect()
}
