//! End-to-end packaging against real project trees.

mod helpers;

use std::fs;
use std::sync::Arc;

use helpers::{CountingTransformer, Project, package_json, provides};
use knit_bundler::cache::CacheOptions;
use knit_bundler::{ChangeEvent, Error, KnitConfig, ModuleFormat, Packager};
use serde_json::json;

const WRAPPER_ARGS: &str = "function(global, require, requireDynamic, requireLazy, module, exports) {";

fn index_and_a() -> Project {
    let project = Project::new();
    project
        .file("index.js", &provides("index", &["require(\"a\");"]))
        .file("a.js", &provides("a", &["module.exports = 1;"]));
    project
}

#[tokio::test]
async fn test_packages_entry_with_define_wrappers() {
    let project = index_and_a();
    let packager = Packager::builder(&project.root).build().await;

    let bundle = packager
        .package(project.path("index.js"), true, "index.map")
        .await
        .unwrap();

    let expected_modules = [
        format!(
            "__d(\"index\",[\"a\"],{WRAPPER_ARGS}{}\n}});",
            provides("index", &["require('a');"])
        ),
        format!(
            "__d(\"a\",[],{WRAPPER_ARGS}{}\n}});",
            provides("a", &["module.exports = 1;"])
        ),
        ";require(\"index\");".to_string(),
    ];
    assert!(bundle.source().starts_with(&expected_modules.join("\n")));
    assert!(bundle.source().ends_with("\n//@ sourceMappingURL=index.map"));
    assert_eq!(bundle.main_module_id(), Some("index"));

    let paths: Vec<&str> = bundle
        .modules()
        .iter()
        .map(|m| m.source_path.as_str())
        .collect();
    assert_eq!(
        paths,
        vec![
            project.path("index.js").to_str().unwrap(),
            project.path("a.js").to_str().unwrap(),
            "RunMainModule.js",
        ]
    );
}

#[tokio::test]
async fn test_relative_requires_are_rewritten_to_ids() {
    let project = Project::new();
    project
        .file("index.js", &provides("index", &["require(\"aPackage\");"]))
        .file("aPackage/package.json", &package_json("aPackage", "main.js"))
        .file("aPackage/main.js", "require(\"./lib/util\");\nrequire(\"missing\");")
        .file("aPackage/lib/util.js", "exports.util = true;");

    let packager = Packager::builder(&project.root).build().await;
    let bundle = packager.package("index.js", false, "map").await.unwrap();

    let main = &bundle.modules()[1].transformed_code;
    assert!(main.starts_with("__d(\"aPackage/main\",[\"aPackage/lib/util\"],"));
    assert!(main.contains("require('aPackage/lib/util');"));
    // Unresolved references stay as written.
    assert!(main.contains("require(\"missing\");"));

    let index = &bundle.modules()[0].transformed_code;
    assert!(index.contains("require('aPackage/main');"));
}

#[tokio::test]
async fn test_dependency_order_survives_concurrent_transforms() {
    let project = Project::new();
    let count = 24;
    for i in 0..count {
        let body = if i + 1 < count {
            format!("require(\"m{}\");", i + 1)
        } else {
            "leaf();".to_string()
        };
        project.file(&format!("m{i}.js"), &provides(&format!("m{i}"), &[&body]));
    }

    let packager = Packager::builder(&project.root)
        .module_format(ModuleFormat::Raw)
        .transformer(Arc::new(CountingTransformer::default()))
        .build()
        .await;
    let bundle = packager.package("m0.js", false, "map").await.unwrap();

    let paths: Vec<String> = bundle
        .modules()
        .iter()
        .map(|m| m.source_path.clone())
        .collect();
    let expected: Vec<String> = (0..count)
        .map(|i| project.path(&format!("m{i}.js")).display().to_string())
        .collect();
    assert_eq!(paths, expected);
}

#[tokio::test]
async fn test_polyfills_come_first_and_unwrapped() {
    let project = index_and_a();
    project
        .file("polyfills/console.js", "console.log = noop;")
        .file("polyfills/promise.js", "Promise = P;");

    let packager = Packager::builder(&project.root)
        .polyfills(vec![
            project.path("polyfills/console.js"),
            project.path("polyfills/promise.js"),
        ])
        .build()
        .await;
    let bundle = packager.package("index.js", false, "map").await.unwrap();

    let codes: Vec<&str> = bundle
        .modules()
        .iter()
        .map(|m| m.transformed_code.as_str())
        .collect();
    assert_eq!(codes.len(), 4);
    assert_eq!(codes[0], "console.log = noop;");
    assert_eq!(codes[1], "Promise = P;");
    assert!(codes[2].starts_with("__d(\"index\""));
    assert!(codes[3].starts_with("__d(\"a\""));
    // The main module is still the entry, not a polyfill.
    assert_eq!(bundle.main_module_id(), Some("index"));
}

#[tokio::test]
async fn test_transform_options_are_forwarded() {
    let project = Project::new();
    project.file("index.js", &provides("index", &["run();"]));

    let packager = Packager::builder(&project.root)
        .module_format(ModuleFormat::Raw)
        .transformer(Arc::new(CountingTransformer::default()))
        .transform_options(json!({ "prefix": "/* dev */" }))
        .build()
        .await;
    let bundle = packager.package("index.js", false, "map").await.unwrap();

    let module = &bundle.modules()[0];
    assert!(module.transformed_code.starts_with("/* dev *//**"));
    assert!(module.transformed_code.ends_with("RUN();"));
    assert_eq!(module.source_code, provides("index", &["run();"]));
}

#[tokio::test]
async fn test_transform_failure_fails_the_whole_package() {
    let project = Project::new();
    project
        .file("index.js", &provides("index", &["require(\"bad\");"]))
        .file("bad.js", &provides("bad", &["FAIL"]));

    let packager = Packager::builder(&project.root)
        .transformer(Arc::new(CountingTransformer::default()))
        .build()
        .await;
    let err = packager.package("index.js", true, "map").await.unwrap_err();

    match err {
        Error::Transform { path, .. } => assert_eq!(path, project.path("bad.js")),
        other => panic!("expected a transform error, got {other:?}"),
    }
    assert!(!packager.cache().contains(&project.path("bad.js")));
}

#[tokio::test]
async fn test_missing_entry_is_an_error() {
    let project = index_and_a();
    let packager = Packager::builder(&project.root).build().await;

    let err = packager.package("nope.js", false, "map").await.unwrap_err();
    assert!(matches!(err, Error::Graph(_)));
}

#[tokio::test]
async fn test_second_package_reuses_cached_transforms() {
    let project = index_and_a();
    let transformer = Arc::new(CountingTransformer::default());
    let packager = Packager::builder(&project.root)
        .transformer(transformer.clone())
        .build()
        .await;

    let first = packager.package("index.js", false, "map").await.unwrap();
    assert_eq!(transformer.calls(), 2);

    let second = packager.package("index.js", false, "map").await.unwrap();
    assert_eq!(transformer.calls(), 2);
    assert_eq!(first.source(), second.source());
}

#[tokio::test]
async fn test_change_event_refreshes_graph_and_cache() {
    let project = index_and_a();
    project.file("b.js", &provides("b", &["b();"]));
    let transformer = Arc::new(CountingTransformer::default());
    let packager = Packager::builder(&project.root)
        .module_format(ModuleFormat::Raw)
        .transformer(transformer.clone())
        .build()
        .await;

    packager.package("index.js", false, "map").await.unwrap();
    assert_eq!(transformer.calls(), 2);

    project.file("index.js", &provides("index", &["require(\"b\");"]));
    packager
        .process_change(&ChangeEvent::change("index.js"))
        .await
        .unwrap();

    let bundle = packager.package("index.js", false, "map").await.unwrap();
    let codes: Vec<&str> = bundle
        .modules()
        .iter()
        .map(|m| m.transformed_code.as_str())
        .collect();
    assert_eq!(codes.len(), 2);
    assert!(codes[0].ends_with("REQUIRE(\"B\");"));
    assert!(codes[1].ends_with("B();"));
    // index.js was re-transformed and b.js transformed for the first time.
    assert_eq!(transformer.calls(), 4);
}

#[tokio::test]
async fn test_from_config_applies_project_settings() {
    let project = index_and_a();
    project
        .file("polyfills/env.js", "var __DEV__ = true;")
        .file("ignored/index.js", &provides("ignored", &[]))
        .file(
            "knit.toml",
            r#"
module_format = "raw"
polyfills = ["polyfills/env.js"]
blacklist = ["/ignored/"]

[cache]
enabled = false
"#,
        );

    let config = KnitConfig::load(&project.root).unwrap();
    let packager = Packager::from_config(&config).await.unwrap();
    let bundle = packager.package("index.js", false, "map").await.unwrap();

    let codes: Vec<&str> = bundle
        .modules()
        .iter()
        .map(|m| m.transformed_code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec![
            "var __DEV__ = true;".to_string(),
            provides("index", &["require(\"a\");"]),
            provides("a", &["module.exports = 1;"]),
        ]
    );
    assert!(packager.graph().module_by_id("ignored").is_none());
    assert!(packager.cache().file_path().is_none());
}

#[tokio::test]
async fn test_flush_cache_persists_transforms_across_packagers() {
    let project = index_and_a();
    let transformer = Arc::new(CountingTransformer::default());
    let options = || CacheOptions::new(&project.root).dir(project.cache_dir());

    let first = Packager::builder(&project.root)
        .transformer(transformer.clone())
        .cache(options())
        .build()
        .await;
    first.package("index.js", false, "map").await.unwrap();
    first.flush_cache().await.unwrap();
    assert_eq!(transformer.calls(), 2);

    let second = Packager::builder(&project.root)
        .transformer(transformer.clone())
        .cache(options())
        .build()
        .await;
    second.package("index.js", false, "map").await.unwrap();
    assert_eq!(transformer.calls(), 2);
}

#[tokio::test]
async fn test_lone_entry_with_run_main() {
    let project = Project::new();
    project.file("solo.js", &provides("solo", &[]));
    fs::write(project.path("notes.txt"), "not a module").unwrap();

    let packager = Packager::builder(&project.root).build().await;
    let bundle = packager.package("solo.js", true, "map").await.unwrap();

    assert_eq!(bundle.modules().len(), 2);
    assert!(bundle.source().contains(";require(\"solo\");"));
}
