//! Shared test utilities for knit-bundler tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use knit_bundler::{TransformError, TransformOutput, Transformer};
use serde_json::Value;
use tempfile::TempDir;

/// A project tree in a temp directory, with its root canonicalized.
pub struct Project {
    _temp: TempDir,
    pub root: PathBuf,
}

impl Project {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap().join("root");
        fs::create_dir_all(&root).unwrap();
        Self { _temp: temp, root }
    }

    pub fn file(&self, rel: &str, contents: &str) -> &Self {
        let path = self.root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        self
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// A directory next to the project root, for cache files.
    pub fn cache_dir(&self) -> PathBuf {
        self.root.parent().unwrap().join("cache")
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

/// Set a file's modification time to `secs` seconds after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Upper-cases code and counts calls. Fails on files containing `FAIL`.
#[derive(Debug, Default)]
pub struct CountingTransformer {
    calls: AtomicUsize,
}

impl CountingTransformer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transformer for CountingTransformer {
    async fn transform(
        &self,
        source: &str,
        path: &Path,
        options: &Value,
    ) -> Result<TransformOutput, TransformError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.contains("FAIL") {
            return Err(TransformError::failed("refusing to transform FAIL"));
        }

        let mut output = TransformOutput::identity(source, path);
        output.code = match options.get("prefix").and_then(Value::as_str) {
            Some(prefix) => format!("{prefix}{}", source.to_uppercase()),
            None => source.to_uppercase(),
        };
        Ok(output)
    }
}

pub fn package_json(name: &str, main: &str) -> String {
    serde_json::json!({ "name": name, "main": main }).to_string()
}
