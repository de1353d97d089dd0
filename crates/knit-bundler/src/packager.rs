//! The packager: graph + transform cache + bundle assembly.
//!
//! [`Packager::package`] asks the graph for the entry's ordered dependencies,
//! transforms every module (and every polyfill) concurrently through the
//! cache, restores dependency order, wraps each module with its id and
//! finalizes the bundle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use knit_config::{KnitConfig, ModuleFormat, validate_fs};
use knit_graph::{
    ChangeEvent, DependencyGraph, Extensions, NativeRuntime, OrderedModule, Runtime, RuntimeError,
};
use regex::RegexSet;
use serde_json::Value;
use sourcemap::SourceMap;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::bundle::{Bundle, BundleBuilder, BundleModule, FinalizeOptions};
use crate::cache::{CacheOptions, TransformCache};
use crate::transform::{IdentityTransformer, TransformError, TransformOutput, Transformer};
use crate::wrapper::{ResolvedDependencies, wrap_module};
use crate::{Error, Result};

/// Builder for [`Packager`].
#[derive(Debug)]
pub struct PackagerBuilder {
    root: PathBuf,
    runtime: Option<Arc<dyn Runtime>>,
    transformer: Arc<dyn Transformer>,
    extensions: Extensions,
    blacklist: Option<RegexSet>,
    polyfills: Vec<PathBuf>,
    module_format: ModuleFormat,
    transform_options: Value,
    cache: Option<CacheOptions>,
}

impl PackagerBuilder {
    pub fn runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn transformer(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.transformer = transformer;
        self
    }

    pub fn extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Paths matching any pattern are never crawled.
    pub fn blacklist(mut self, patterns: RegexSet) -> Self {
        self.blacklist = Some(patterns);
        self
    }

    /// Absolute paths of files prepended, unwrapped and in order, to every
    /// bundle.
    pub fn polyfills(mut self, polyfills: Vec<PathBuf>) -> Self {
        self.polyfills = polyfills;
        self
    }

    pub fn module_format(mut self, format: ModuleFormat) -> Self {
        self.module_format = format;
        self
    }

    /// Options forwarded untouched to every transform call.
    pub fn transform_options(mut self, options: Value) -> Self {
        self.transform_options = options;
        self
    }

    /// Cache settings. Defaults to an in-memory cache.
    pub fn cache(mut self, options: CacheOptions) -> Self {
        self.cache = Some(options);
        self
    }

    /// Build the packager, loading the persisted transform cache if one is
    /// configured. The graph is crawled lazily on the first package call.
    pub async fn build(self) -> Packager {
        let runtime = self
            .runtime
            .unwrap_or_else(|| Arc::new(NativeRuntime::new()));

        let mut graph = DependencyGraph::builder(&self.root)
            .runtime(Arc::clone(&runtime))
            .extensions(self.extensions);
        if let Some(patterns) = self.blacklist {
            graph = graph.ignore_patterns(patterns);
        }

        let cache_options = self
            .cache
            .unwrap_or_else(|| CacheOptions::new(self.root.clone()));
        let cache = TransformCache::open(Arc::clone(&runtime), cache_options).await;

        Packager {
            graph: Arc::new(graph.build()),
            cache,
            runtime,
            transformer: self.transformer,
            polyfills: Arc::new(self.polyfills),
            module_format: self.module_format,
            transform_options: Arc::new(self.transform_options),
        }
    }
}

/// Bundles entry modules of one project.
#[derive(Debug, Clone)]
pub struct Packager {
    graph: Arc<DependencyGraph>,
    cache: TransformCache,
    runtime: Arc<dyn Runtime>,
    transformer: Arc<dyn Transformer>,
    polyfills: Arc<Vec<PathBuf>>,
    module_format: ModuleFormat,
    transform_options: Arc<Value>,
}

impl Packager {
    pub fn builder(root: impl Into<PathBuf>) -> PackagerBuilder {
        PackagerBuilder {
            root: root.into(),
            runtime: None,
            transformer: Arc::new(IdentityTransformer),
            extensions: Extensions::default(),
            blacklist: None,
            polyfills: Vec::new(),
            module_format: ModuleFormat::default(),
            transform_options: Value::Null,
            cache: None,
        }
    }

    /// Packager for a loaded project config, using the identity transform.
    ///
    /// The config is validated first, including the filesystem checks.
    pub async fn from_config(config: &KnitConfig) -> Result<Self> {
        Ok(Self::builder_from_config(config)?.build().await)
    }

    /// Like [`from_config`](Self::from_config), but returns the builder so
    /// the transformer or runtime can still be swapped.
    pub fn builder_from_config(config: &KnitConfig) -> Result<PackagerBuilder> {
        validate_fs(config, &config.project_root)?;

        let root = config.project_root.clone();
        let mut builder = Self::builder(&root)
            .extensions(Extensions::new(&config.extensions))
            .polyfills(config.resolved_polyfills())
            .module_format(config.module_format)
            .transform_options(config.transform.clone())
            .cache(CacheOptions::from_settings(&root, &config.cache));
        if let Some(patterns) = config.blacklist_set()? {
            builder = builder.blacklist(patterns);
        }
        Ok(builder)
    }

    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    pub fn cache(&self) -> &TransformCache {
        &self.cache
    }

    /// Bundle `entry` and everything it requires.
    ///
    /// Crawls the project on first use. Any transform failure fails the
    /// whole call; no partial bundle is produced.
    pub async fn package(
        &self,
        entry: impl AsRef<Path>,
        run_main_module: bool,
        source_map_url: &str,
    ) -> Result<Bundle> {
        self.graph.load().await?;

        // Listing and resolutions from one snapshot of the graph.
        let modules = self.graph.ordered_resolutions(entry)?;
        tracing::debug!(
            modules = modules.len(),
            polyfills = self.polyfills.len(),
            "Packaging"
        );

        let mut bundle = BundleBuilder::new(source_map_url);
        if let Some(main) = modules.first() {
            bundle.set_main_module_id(main.module.id());
        }

        let mut jobs: JoinSet<Result<(usize, BundleModule)>> = JoinSet::new();
        for (index, path) in self.polyfills.iter().enumerate() {
            let job = self.transform_job(path.clone());
            jobs.spawn(async move {
                let output = job.run().await?;
                Ok((index, bundle_module(output.code.clone(), output)))
            });
        }

        let offset = self.polyfills.len();
        for (index, listed) in modules.iter().enumerate() {
            let dependencies = self.resolved_dependencies(listed);
            let id = listed.module.id().to_string();
            let format = self.module_format;
            let job = self.transform_job(listed.module.path().to_path_buf());
            jobs.spawn(async move {
                let output = job.run().await?;
                let code = wrap_module(format, &id, &dependencies, &output.code);
                Ok((offset + index, bundle_module(code, output)))
            });
        }

        let mut ordered: Vec<Option<BundleModule>> = vec![None; offset + modules.len()];
        while let Some(joined) = jobs.join_next().await {
            let (index, module) = joined.map_err(|e| {
                Error::Runtime(RuntimeError::Other(format!("Transform task failed: {e}")))
            })??;
            ordered[index] = Some(module);
        }

        for module in ordered.into_iter().flatten() {
            bundle.push(module);
        }

        bundle.finalize(FinalizeOptions { run_main_module })
    }

    /// Forward a change event to the transform cache and the graph.
    pub async fn process_change(&self, event: &ChangeEvent) -> Result<()> {
        self.cache
            .invalidate(&event.absolute_path(&self.graph.root()));
        self.graph.process_change(event).await?;
        Ok(())
    }

    /// Apply change events until the sender side closes. Failures are logged.
    pub async fn watch(&self, mut events: mpsc::Receiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.process_change(&event).await {
                tracing::warn!(path = %event.path.display(), error = %e, "Failed to apply change");
            }
        }
    }

    /// Write the transform cache to disk now.
    pub async fn flush_cache(&self) -> Result<()> {
        self.cache.flush().await?;
        Ok(())
    }

    /// Reference string to resolved id for the define wrapper. Unresolved
    /// references are left out.
    fn resolved_dependencies(&self, listed: &OrderedModule) -> ResolvedDependencies {
        let mut resolved = ResolvedDependencies::new();
        if self.module_format == ModuleFormat::Raw {
            return resolved;
        }

        for (reference, dep) in &listed.resolved {
            resolved.insert(reference.as_str(), dep.id());
        }
        resolved
    }

    fn transform_job(&self, path: PathBuf) -> TransformJob {
        TransformJob {
            path,
            cache: self.cache.clone(),
            runtime: Arc::clone(&self.runtime),
            transformer: Arc::clone(&self.transformer),
            options: Arc::clone(&self.transform_options),
        }
    }
}

/// Everything one spawned transform needs, owned.
struct TransformJob {
    path: PathBuf,
    cache: TransformCache,
    runtime: Arc<dyn Runtime>,
    transformer: Arc<dyn Transformer>,
    options: Arc<Value>,
}

impl TransformJob {
    async fn run(self) -> Result<TransformOutput> {
        let Self {
            path,
            cache,
            runtime,
            transformer,
            options,
        } = self;

        cache
            .get(&path, |path| async move {
                let source = runtime.read_to_string(&path).await?;
                let output = transformer
                    .transform(&source, &path, &options)
                    .await
                    .map_err(|source| Error::Transform {
                        path: path.clone(),
                        source,
                    })?;

                if let Some(map) = &output.map {
                    SourceMap::from_slice(map.as_bytes()).map_err(|e| Error::Transform {
                        path: path.clone(),
                        source: TransformError::InvalidSourceMap(e.to_string()),
                    })?;
                }
                Ok::<_, Error>(output)
            })
            .await
    }
}

fn bundle_module(code: String, output: TransformOutput) -> BundleModule {
    BundleModule::new(
        code,
        output.source_code,
        output.source_path.to_string_lossy(),
    )
    .with_map(output.map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builder_from_config_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let config = KnitConfig::new(temp.path().join("missing"));
        assert!(matches!(
            Packager::builder_from_config(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn empty_polyfill_list_and_raw_format() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().canonicalize().unwrap();
        fs::write(
            root.join("index.js"),
            "/**\n * @providesModule index\n */\nrun();",
        )
        .unwrap();

        let packager = Packager::builder(&root)
            .module_format(ModuleFormat::Raw)
            .build()
            .await;
        let bundle = packager.package("index.js", false, "map").await.unwrap();

        assert!(
            bundle
                .source()
                .starts_with("/**\n * @providesModule index\n */\nrun();\nRAW_SOURCE_MAP = ")
        );
        assert_eq!(bundle.main_module_id(), Some("index"));
    }
}
