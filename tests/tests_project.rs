//! Directory loading and discovery, end to end.

use std::fs;
use std::path::Path;

use docpeek::{
    extract, load_directory, ExtractOptions, Host, RunCtx, UnitName, ValueKind,
};
use smol_str::SmolStr;

fn name(s: &str) -> UnitName {
    UnitName::new(s).unwrap()
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn project_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "mypkg.unit", "package; doc \"Top package.\";");
    write(
        dir.path(),
        "mypkg/models.unit",
        "marker ext.framework::Meta: metaclass;\n\
         use ext.framework::Meta;\n\
         use ext.framework::Base;\n\
         class Widget(Base) meta Meta { doc \"A widget.\"; let size = 3; }\n\
         export Widget;",
    );
    write(
        dir.path(),
        "mypkg/util.unit",
        "doc \"Utilities.\"; fn helper(x) -> out.T { doc \"Helps.\"; }",
    );
    dir
}

#[test]
fn test_extract_from_directory() {
    let dir = project_dir();
    let mut host = Host::new();
    let loaded = load_directory(&mut host, dir.path()).unwrap();
    assert_eq!(loaded.len(), 3);

    let results = extract(
        &mut host,
        &ExtractOptions::for_packages([SmolStr::new("mypkg")]),
    )
    .unwrap();
    assert_eq!(results.len(), 3);
    // Parents come before children.
    let order: Vec<_> = results.keys().map(|n| n.as_str()).collect();
    assert_eq!(order, ["mypkg", "mypkg.models", "mypkg.util"]);
    assert!(results[&name("mypkg")].unit.is_package());
    assert_eq!(
        results[&name("mypkg")].unit.doc().as_deref(),
        Some("Top package.")
    );

    let models = &results[&name("mypkg.models")];
    let mut ctx = RunCtx::default();
    match &models.unit.attr(&mut ctx, "Widget").unwrap().kind {
        ValueKind::Class(c) => {
            assert_eq!(c.doc.as_deref(), Some("A widget."));
            assert_eq!(c.bases.len(), 1);
            assert!(matches!(c.bases[0].kind, ValueKind::Placeholder(_)));
            assert!(c.metaclass.is_some());
        }
        other => panic!("expected class, got {other:?}"),
    }

    // Origin metadata points back at the file the source came from.
    let origin = models.unit.origin().expect("origin recorded");
    assert!(origin.ends_with("models.unit"), "origin was {origin}");
}

#[test]
fn test_discovery_ignores_foreign_packages() {
    let dir = project_dir();
    write(dir.path(), "vendored/thing.unit", "let v = 1;");
    let mut host = Host::new();
    load_directory(&mut host, dir.path()).unwrap();

    let results = extract(
        &mut host,
        &ExtractOptions::for_packages([SmolStr::new("mypkg")]),
    )
    .unwrap();
    assert!(!results.contains_key(&name("vendored.thing")));
    assert_eq!(results.len(), 3);
}

#[test]
fn test_dotted_access_through_attached_children() {
    let dir = project_dir();
    write(
        dir.path(),
        "mypkg/consumer.unit",
        "use mypkg.models;\n\
         use mypkg as root;\n\
         let widget = root.models.Widget;",
    );
    let mut host = Host::new();
    load_directory(&mut host, dir.path()).unwrap();

    let results = extract(
        &mut host,
        &ExtractOptions::for_packages([SmolStr::new("mypkg")]),
    )
    .unwrap();
    let consumer = &results[&name("mypkg.consumer")];
    let mut ctx = RunCtx::default();
    match &consumer.unit.attr(&mut ctx, "widget").unwrap().kind {
        ValueKind::Placeholder(p) => {
            assert_eq!(p.unit.as_str(), "mypkg.models");
            assert_eq!(p.attr, "Widget");
        }
        other => panic!("expected placeholder, got {other:?}"),
    }
}
