//! Bundle assembly.
//!
//! A [`BundleBuilder`] collects transformed modules in order. Finalizing it
//! produces an immutable [`Bundle`] whose text is
//!
//! ```text
//! <module 1>
//! <module 2>
//! ;require("<main id>");            (only with run_main_module)
//! RAW_SOURCE_MAP = <source map>;
//! //@ sourceMappingURL=<url>
//! ```
//!
//! The source map maps the first column of every bundle line back to a line
//! of the module it came from, and embeds each module's original source.

use sourcemap::{SourceMap, SourceMapBuilder};

use crate::{Error, Result};

/// `file` field of the bundle source map.
pub const SOURCE_MAP_FILE: &str = "bundle.js";

/// Source path of the synthetic module that requires the main module.
pub const RUN_MAIN_MODULE_PATH: &str = "RunMainModule.js";

/// One module as it appears in the bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleModule {
    pub transformed_code: String,
    pub source_code: String,
    pub source_path: String,
    /// Map from `transformed_code` lines back to `source_code`.
    pub map: Option<String>,
}

impl BundleModule {
    pub fn new(
        transformed_code: impl Into<String>,
        source_code: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            transformed_code: transformed_code.into(),
            source_code: source_code.into(),
            source_path: source_path.into(),
            map: None,
        }
    }

    pub fn with_map(mut self, map: Option<String>) -> Self {
        self.map = map;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeOptions {
    /// Append a statement requiring the main module.
    pub run_main_module: bool,
}

/// Append-only bundle under construction.
#[derive(Debug, Clone)]
pub struct BundleBuilder {
    source_map_url: String,
    modules: Vec<BundleModule>,
    main_module_id: Option<String>,
}

impl BundleBuilder {
    pub fn new(source_map_url: impl Into<String>) -> Self {
        Self {
            source_map_url: source_map_url.into(),
            modules: Vec::new(),
            main_module_id: None,
        }
    }

    pub fn add_module(
        &mut self,
        transformed_code: impl Into<String>,
        source_code: impl Into<String>,
        source_path: impl Into<String>,
    ) -> &mut Self {
        self.push(BundleModule::new(transformed_code, source_code, source_path))
    }

    pub fn push(&mut self, module: BundleModule) -> &mut Self {
        self.modules.push(module);
        self
    }

    pub fn set_main_module_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.main_module_id = Some(id.into());
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Fix the bundle text and source map.
    ///
    /// With `run_main_module` and a main module id, a `;require("<id>");`
    /// module is appended first. Without a main module id the option has no
    /// effect.
    pub fn finalize(mut self, options: FinalizeOptions) -> Result<Bundle> {
        if options.run_main_module {
            match &self.main_module_id {
                Some(id) => {
                    let trailer = format!(";require({});", serde_json::Value::from(id.as_str()));
                    self.modules
                        .push(BundleModule::new(trailer, "", RUN_MAIN_MODULE_PATH));
                }
                None => tracing::warn!("run_main_module requested without a main module id"),
            }
        }

        let source_map = build_source_map(&self.modules)?;

        let mut lines: Vec<&str> = self
            .modules
            .iter()
            .map(|m| m.transformed_code.as_str())
            .collect();
        let assignment = format!("RAW_SOURCE_MAP = {source_map};");
        let url_comment = format!("//@ sourceMappingURL={}", self.source_map_url);
        lines.push(&assignment);
        lines.push(&url_comment);
        let source = lines.join("\n");

        Ok(Bundle {
            source,
            source_map,
            source_map_url: self.source_map_url,
            main_module_id: self.main_module_id,
            modules: self.modules,
        })
    }
}

/// A finalized bundle.
#[derive(Debug, Clone)]
pub struct Bundle {
    source: String,
    source_map: String,
    source_map_url: String,
    main_module_id: Option<String>,
    modules: Vec<BundleModule>,
}

impl Bundle {
    /// Full bundle text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source map as JSON.
    pub fn source_map(&self) -> &str {
        &self.source_map
    }

    pub fn source_map_url(&self) -> &str {
        &self.source_map_url
    }

    pub fn main_module_id(&self) -> Option<&str> {
        self.main_module_id.as_deref()
    }

    /// Modules in bundle order, including the run-main trailer if any.
    pub fn modules(&self) -> &[BundleModule] {
        &self.modules
    }
}

fn build_source_map(modules: &[BundleModule]) -> Result<String> {
    let mut builder = SourceMapBuilder::new(Some(SOURCE_MAP_FILE));
    let mut bundle_line: u32 = 0;

    for module in modules {
        let src_id = builder.add_source(&module.source_path);
        builder.set_source_contents(src_id, Some(module.source_code.as_str()));

        let original_lines = module
            .map
            .as_deref()
            .and_then(|map| original_line_table(map, &module.source_path));

        let mut module_line: u32 = 0;
        let mut line_start = true;
        for ch in module.transformed_code.chars() {
            if line_start {
                let src_line = original_lines
                    .as_ref()
                    .and_then(|table| table.get(module_line as usize).copied().flatten())
                    .unwrap_or(module_line);
                builder.add_raw(bundle_line, 0, src_line, 0, Some(src_id), None, false);
            }
            line_start = ch == '\n';
            if line_start {
                module_line += 1;
                bundle_line += 1;
            }
        }

        // The newline joining this module to the next.
        bundle_line += 1;
    }

    let map = builder.into_sourcemap();
    let mut out = Vec::new();
    map.to_writer(&mut out)
        .map_err(|e| Error::SourceMap(e.to_string()))?;
    String::from_utf8(out).map_err(|e| Error::SourceMap(e.to_string()))
}

/// For each generated line of a module's own map, the original line of its
/// first token.
fn original_line_table(map: &str, source_path: &str) -> Option<Vec<Option<u32>>> {
    let map = match SourceMap::from_slice(map.as_bytes()) {
        Ok(map) => map,
        Err(e) => {
            tracing::warn!(path = source_path, error = %e, "Ignoring unreadable module source map");
            return None;
        }
    };

    let mut table: Vec<Option<u32>> = Vec::new();
    for token in map.tokens() {
        let line = token.get_dst_line() as usize;
        if table.len() <= line {
            table.resize(line + 1, None);
        }
        if table[line].is_none() {
            table[line] = Some(token.get_src_line());
        }
    }
    Some(table)
}
