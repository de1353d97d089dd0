//! Incremental maintenance through change events.

mod common;

use std::sync::Arc;

use common::{Project, m, ordered, package_json, provides};
use knit_graph::{ChangeEvent, DependencyGraph};
use tokio::sync::mpsc;

fn standard_project() -> Project {
    let project = Project::new();
    project
        .file(
            "index.js",
            &provides("index", &["require(\"aPackage\")", "require(\"foo\")"]),
        )
        .file("foo.js", &provides("foo", &["require(\"aPackage\")"]))
        .file("aPackage/package.json", &package_json("aPackage", "main.js"))
        .file("aPackage/main.js", "main");
    project
}

#[tokio::test]
async fn updates_module_dependencies_on_file_change() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    project.file(
        "index.js",
        &provides("index", &["require(\"aPackage\")", ""]),
    );
    graph
        .process_change(&ChangeEvent::change("index.js"))
        .await
        .unwrap();

    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage"]),
            m("aPackage/main", project.path("aPackage/main.js"), &[]),
        ]
    );
}

#[tokio::test]
async fn updates_module_dependencies_on_file_delete() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();
    let foo = graph.module_by_id("foo").unwrap();

    project.remove("foo.js");
    graph
        .process_change(&ChangeEvent::delete("foo.js"))
        .await
        .unwrap();

    assert!(foo.is_deleted());
    assert!(graph.module_by_path(&project.path("foo.js")).is_none());
    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage", "foo"]),
            m("aPackage/main", project.path("aPackage/main.js"), &[]),
        ]
    );
}

#[tokio::test]
async fn updates_module_dependencies_on_file_add() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    project.file("bar.js", &provides("bar", &["require(\"foo\")"]));
    graph.process_change(&ChangeEvent::add("bar.js")).await.unwrap();

    project.file("aPackage/main.js", "require(\"bar\")");
    graph
        .process_change(&ChangeEvent::change("aPackage/main.js"))
        .await
        .unwrap();

    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage", "foo"]),
            m("aPackage/main", project.path("aPackage/main.js"), &["bar"]),
            m("bar", project.path("bar.js"), &["foo"]),
            m("foo", project.path("foo.js"), &["aPackage"]),
        ]
    );
}

#[tokio::test]
async fn runs_changes_through_ignore_filter() {
    let project = standard_project();
    let ignored = project.path("bar.js");
    let graph = DependencyGraph::builder(&project.root)
        .ignore(move |path| path == ignored)
        .build();
    graph.load().await.unwrap();

    project.file("bar.js", &provides("bar", &["require(\"foo\")"]));
    graph.process_change(&ChangeEvent::add("bar.js")).await.unwrap();

    project.file("aPackage/main.js", "require(\"bar\")");
    graph
        .process_change(&ChangeEvent::change("aPackage/main.js"))
        .await
        .unwrap();

    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage", "foo"]),
            m("aPackage/main", project.path("aPackage/main.js"), &["bar"]),
            m("foo", project.path("foo.js"), &["aPackage"]),
        ]
    );
}

#[tokio::test]
async fn should_ignore_directory_updates() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    graph
        .process_change(&ChangeEvent::change("aPackage").with_is_dir(true))
        .await
        .unwrap();
    // Without a hint the runtime is asked.
    graph
        .process_change(&ChangeEvent::change("aPackage"))
        .await
        .unwrap();

    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage", "foo"]),
            m("aPackage/main", project.path("aPackage/main.js"), &[]),
            m("foo", project.path("foo.js"), &["aPackage"]),
        ]
    );
}

#[tokio::test]
async fn change_for_vanished_file_removes_it() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    project.remove("foo.js");
    graph
        .process_change(&ChangeEvent::change("foo.js"))
        .await
        .unwrap();

    assert!(graph.module_by_id("foo").is_none());
}

#[tokio::test]
async fn package_json_change_reregisters_package() {
    let project = standard_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    project
        .file("aPackage/package.json", &package_json("renamed", "other.js"))
        .file("aPackage/other.js", "other");
    graph
        .process_change(&ChangeEvent::add("aPackage/other.js"))
        .await
        .unwrap();
    graph
        .process_change(&ChangeEvent::change("aPackage/package.json"))
        .await
        .unwrap();

    assert!(graph.package_by_name("aPackage").is_none());
    let renamed = graph.package_by_name("renamed").unwrap();
    assert_eq!(renamed.main(), "other.js");
}

#[tokio::test]
async fn watch_drains_event_stream() {
    let project = standard_project();
    let graph = Arc::new(project.graph());
    graph.load().await.unwrap();

    let (tx, rx) = mpsc::channel(8);
    let watcher = {
        let graph = Arc::clone(&graph);
        tokio::spawn(async move { graph.watch(rx).await })
    };

    project.file("bar.js", &provides("bar", &[]));
    tx.send(ChangeEvent::add("bar.js")).await.unwrap();
    project.remove("foo.js");
    tx.send(ChangeEvent::delete("foo.js")).await.unwrap();
    drop(tx);
    watcher.await.unwrap();

    assert!(graph.module_by_id("bar").is_some());
    assert!(graph.module_by_id("foo").is_none());
}

#[tokio::test]
async fn change_queued_during_load_applies_after_crawl() {
    let project = standard_project();
    let graph = project.graph();

    project.file("bar.js", &provides("bar", &[]));
    let event = ChangeEvent::change("bar.js");
    let (loaded, changed) = tokio::join!(graph.load(), graph.process_change(&event));
    loaded.unwrap();
    changed.unwrap();

    assert!(graph.module_by_id("bar").is_some());
    assert_eq!(graph.module_count(), 4);
}

#[cfg(unix)]
fn symlinked_package_project() -> (Project, std::path::PathBuf) {
    let project = Project::new();
    let linked = project.outside("symlinkedPackage");
    std::fs::create_dir_all(linked.join("subdir")).unwrap();
    std::fs::write(linked.join("package.json"), package_json("aPackage", "main.js")).unwrap();
    std::fs::write(linked.join("main.js"), "lol").unwrap();
    std::fs::write(linked.join("subdir/lolynot.js"), "lolynot").unwrap();
    project.file(
        "index.js",
        &provides("index", &["require(\"aPackage/subdir/lolynot\")"]),
    );
    std::os::unix::fs::symlink(&linked, project.path("aPackage")).unwrap();
    (project, linked)
}

#[cfg(unix)]
#[tokio::test]
async fn change_through_symlinked_dir_updates_the_real_module() {
    let (project, linked) = symlinked_package_project();
    let graph = project.graph();
    graph.load().await.unwrap();
    assert_eq!(graph.module_count(), 3);

    project.file("aPackage/subdir/lolynot.js", "require(\"../main\")");
    graph
        .process_change(&ChangeEvent::change("aPackage/subdir/lolynot.js"))
        .await
        .unwrap();

    assert_eq!(graph.module_count(), 3);
    assert!(
        graph
            .module_by_path(&project.path("aPackage/subdir/lolynot.js"))
            .is_none()
    );
    assert_eq!(
        ordered(&graph, project.path("index.js")),
        vec![
            m("index", project.path("index.js"), &["aPackage/subdir/lolynot"]),
            m(
                "aPackage/subdir/lolynot",
                linked.join("subdir/lolynot.js"),
                &["../main"]
            ),
            m("aPackage/main", linked.join("main.js"), &[]),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn delete_through_symlinked_dir_removes_the_real_module() {
    let (project, linked) = symlinked_package_project();
    let graph = project.graph();
    graph.load().await.unwrap();

    project.remove("aPackage/subdir/lolynot.js");
    graph
        .process_change(&ChangeEvent::delete("aPackage/subdir/lolynot.js"))
        .await
        .unwrap();

    assert!(graph.module_by_path(&linked.join("subdir/lolynot.js")).is_none());
    assert!(graph.module_by_id("aPackage/subdir/lolynot").is_none());
    assert_eq!(graph.module_count(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn change_to_symlinked_file_is_ignored() {
    let project = Project::new();
    project.file("real.js", &provides("real", &[]));
    std::os::unix::fs::symlink(project.path("real.js"), project.path("alias.js")).unwrap();
    let graph = project.graph();
    graph.load().await.unwrap();

    graph
        .process_change(&ChangeEvent::change("alias.js"))
        .await
        .unwrap();

    assert_eq!(graph.module_count(), 1);
    assert!(graph.module_by_path(&project.path("alias.js")).is_none());
}
