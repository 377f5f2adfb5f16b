//! The `include` command: path resolution, splicing, error attribution.

use std::fs;
use std::path::Path;

use serde_json::json;
use stencil::{Options, RuntimeErrorKind};
use tempfile::TempDir;

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_include() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "t1", "T-1");
    write(dir.path(), "sub1/a", "SUB-1-A");
    write(dir.path(), "sub2/b", "SUB-2-B");
    write(
        dir.path(),
        "sub2/c",
        "
            SUB-2-C
            |
            @include ../sub1/a
            |
            @include ../t1
            |
            @include b
    ",
    );

    let s = stencil::render_path(dir.path().join("sub2/c"), &json!({}), &mut Options::new())
        .unwrap();
    assert_eq!(nows(&s), "SUB-2-C|SUB-1-A|T-1|SUB-2-B");
}

#[test]
fn test_include_errors() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "defs",
        "
        *
        @def foo x
            <{42//x}>
        @end
        *
    ",
    );
    write(
        dir.path(),
        "uses",
        "
        2
        @include defs
        4
        @foo 1
        @foo 0
        7
    ",
    );

    let mut seen = Vec::new();
    let mut opts = Options::new().on_error(|e| {
        let file = Path::new(&e.path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        seen.push((e.kind, file, e.line));
    });
    let s = stencil::render_path(dir.path().join("uses"), &json!({}), &mut opts).unwrap();
    drop(opts);

    assert_eq!(nows(&s), "2**4<42><>7");
    assert_eq!(
        seen,
        vec![(RuntimeErrorKind::DivideByZero, "defs".to_string(), 4)]
    );
}

#[test]
fn test_include_finder() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main",
        "
            @include foo
            |
            @include bar
    ",
    );
    write(dir.path(), "inc", "INC");

    let inc = dir.path().join("inc");
    let mut opts = Options::new().finder(move |_current, _request| Some(inc.clone()));
    let s = stencil::render_path(dir.path().join("main"), &json!({}), &mut opts).unwrap();
    assert_eq!(nows(&s), "INC|INC");
}

#[test]
fn test_include_missing_is_compile_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main", "@include nothing-here\n");

    let result = stencil::render_path(dir.path().join("main"), &json!({}), &mut Options::new());
    match result {
        Err(stencil::Error::Compile(e)) => {
            assert_eq!(e.category, stencil::Category::FileNotFound);
            assert_eq!(e.line, 1);
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}

#[test]
fn test_include_cycle_is_rejected() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a", "@include b\n");
    write(dir.path(), "b", "@include a\n");

    let result = stencil::render_path(dir.path().join("a"), &json!({}), &mut Options::new());
    match result {
        Err(stencil::Error::Compile(e)) => {
            assert_eq!(e.category, stencil::Category::FileNotFound);
        }
        other => panic!("expected a compile error, got {other:?}"),
    }
}
