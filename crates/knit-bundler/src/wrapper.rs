//! Module transport wrappers.
//!
//! In the `define` format each module registers itself with the bundle's
//! runtime module system under its id:
//!
//! ```text
//! __d("id",["dep"],function(global, require, requireDynamic, requireLazy, module, exports) {<code>
//! });
//! ```
//!
//! The code starts on the wrapper's own line so line numbers inside the module
//! are unchanged. `require` calls whose reference resolved are rewritten to
//! the resolved id, since the runtime looks modules up by id only.

use std::sync::LazyLock;

use knit_config::ModuleFormat;
use regex::{Captures, Regex};
use rustc_hash::FxHashMap;

static REQUIRE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\brequire\s*\(\s*(['"])([^"']+)(['"])\s*\)"#).expect("valid require regex")
});

/// Reference string to resolved module id, in first-occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedDependencies {
    order: Vec<String>,
    ids: FxHashMap<String, String>,
}

impl ResolvedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `reference` resolved to `id`. Repeated references keep
    /// their first position.
    pub fn insert(&mut self, reference: impl Into<String>, id: impl Into<String>) {
        let reference = reference.into();
        if !self.ids.contains_key(&reference) {
            self.order.push(reference.clone());
        }
        self.ids.insert(reference, id.into());
    }

    pub fn get(&self, reference: &str) -> Option<&str> {
        self.ids.get(reference).map(String::as_str)
    }

    /// Resolved ids in the order their references first appeared.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().filter_map(|r| self.get(r))
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Wrap `code` for the bundle.
pub fn wrap_module(
    format: ModuleFormat,
    id: &str,
    dependencies: &ResolvedDependencies,
    code: &str,
) -> String {
    match format {
        ModuleFormat::Raw => code.to_string(),
        ModuleFormat::Define => {
            let code = rewrite_requires(code, dependencies);
            let deps: Vec<&str> = dependencies.ids().collect();
            format!(
                "__d({},{},function(global, require, requireDynamic, requireLazy, module, exports) {{{}\n}});",
                quote(id),
                serde_json::Value::from(deps),
                code
            )
        }
    }
}

/// Replace each `require("<reference>")` whose reference resolved with
/// `require('<id>')`. Unresolved references are left alone.
pub fn rewrite_requires(code: &str, dependencies: &ResolvedDependencies) -> String {
    if dependencies.is_empty() {
        return code.to_string();
    }

    REQUIRE_CALL
        .replace_all(code, |caps: &Captures<'_>| match dependencies.get(&caps[2]) {
            Some(id) if caps[1] == caps[3] => format!("require('{id}')"),
            _ => caps[0].to_string(),
        })
        .into_owned()
}

fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(pairs: &[(&str, &str)]) -> ResolvedDependencies {
        let mut deps = ResolvedDependencies::new();
        for (reference, id) in pairs {
            deps.insert(*reference, *id);
        }
        deps
    }

    #[test]
    fn raw_leaves_code_alone() {
        let deps = deps(&[("./a", "pkg/a")]);
        assert_eq!(
            wrap_module(ModuleFormat::Raw, "index", &deps, "require('./a');"),
            "require('./a');"
        );
    }

    #[test]
    fn define_wraps_on_the_first_line() {
        let wrapped = wrap_module(
            ModuleFormat::Define,
            "index",
            &deps(&[("a", "a")]),
            "var a = require(\"a\");",
        );
        assert_eq!(
            wrapped,
            "__d(\"index\",[\"a\"],function(global, require, requireDynamic, requireLazy, module, exports) {var a = require('a');\n});"
        );
    }

    #[test]
    fn define_rewrites_resolved_requires_only() {
        let deps = deps(&[("./b", "pkg/b")]);
        let code = "require('./b'); require(\"./b\"); require('missing');";
        assert_eq!(
            rewrite_requires(code, &deps),
            "require('pkg/b'); require('pkg/b'); require('missing');"
        );
    }

    #[test]
    fn mismatched_quotes_are_not_rewritten() {
        let deps = deps(&[("./b", "pkg/b")]);
        assert_eq!(rewrite_requires("require('./b\")", &deps), "require('./b\")");
    }

    #[test]
    fn deps_keep_first_occurrence_order() {
        let deps = deps(&[("b", "b"), ("a", "a"), ("b", "b")]);
        assert_eq!(deps.ids().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn ids_are_json_escaped() {
        let wrapped = wrap_module(
            ModuleFormat::Define,
            "we\"ird",
            &ResolvedDependencies::new(),
            "",
        );
        assert!(wrapped.starts_with("__d(\"we\\\"ird\",[],"));
    }
}
