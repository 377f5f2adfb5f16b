//! String interpolation and the expression language.

use serde_json::json;
use stencil::{Map, Options, Value};

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

fn render(src: &str, ctx: serde_json::Value) -> String {
    stencil::render(src, &ctx, &mut Options::new()).unwrap()
}

#[test]
fn test_simple_property() {
    let s = render(">{aa}<", json!({"aa": 123}));
    assert_eq!(s, ">123<");
}

#[test]
fn test_nested_property() {
    let s = render(
        ">{aa[\"bb\"][0][\"cc\"]}<",
        json!({"aa": {"bb": [{"cc": 123}]}}),
    );
    assert_eq!(s, ">123<");
}

#[test]
fn test_nested_property_dot_notation() {
    let s = render(">{aa.bb[0].cc}<", json!({"aa": {"bb": [{"cc": 123}]}}));
    assert_eq!(s, ">123<");
}

#[test]
fn test_deep_dot_notation() {
    let s = render(">{aa.bb.xx.yy}<", json!({"aa": {"bb": {"xx": {"yy": "zz"}}}}));
    assert_eq!(s, ">zz<");
}

#[test]
fn test_methods() {
    let t = "
        @each aa.values() as v
            [ {v} ]
        @end
    ";
    let s = render(t, json!({"aa": {"a": 1, "b": 2, "c": 3}}));
    assert_eq!(nows(&s), "[1][2][3]");
}

#[test]
fn test_operators() {
    let t = "
        [ {aa.x + bb.y * 4} ]
        [ {cc.z in [1,2,3]} ]
        [ {cc.z not in [4,5,6]} ]
        [ {3 < dd.w < 5} ]
    ";
    let s = render(
        t,
        json!({"aa": {"x": 2}, "bb": {"y": 10}, "cc": {"z": 1}, "dd": {"w": 4}}),
    );
    assert_eq!(nows(&s), "[42][true][true][true]");
}

#[test]
fn test_if_expression() {
    let t = "
        [ {'yes' if aa else 'no'} ]
        [ {'yes' if bb else 'no'} ]
    ";
    let s = render(t, json!({"aa": true, "bb": false}));
    assert_eq!(nows(&s), "[yes][no]");
}

#[test]
fn test_local_var() {
    let t = "
        [{aa.bb}]
        [{xx}]

        @let aa {'bb': 'new'}
        @let xx 'new2'

        [{aa.bb}]
        [{xx}]
    ";
    let s = render(t, json!({"aa": {"bb": "old"}, "xx": "old2"}));
    assert_eq!(nows(&s), "[old][old2][new][new2]");
}

#[test]
fn test_built_in_name() {
    let s = render(">{abs.__name__}{len(\"hello\")}<", json!({}));
    assert_eq!(s, ">abs5<");
}

#[test]
fn test_comprehension() {
    let s = render(">{[x * 2 for x in xs if x > 1] | join}<", json!({"xs": [1, 2, 3]}));
    assert_eq!(s, ">4,6<");
}

#[test]
fn test_slices() {
    let s = render(">{s[1:4]},{s[-2:]}<", json!({"s": "0123456"}));
    assert_eq!(s, ">123,56<");
}

#[test]
fn test_var_and_code() {
    let t = "
        @var k
        @code
            k = {'val': 123, 'd': {'p': 'q'}}
        @end

        >{k.val}<>{k.d.p}<
    ";
    let s = render(t, json!({}));
    assert_eq!(nows(&s), ">123<>q<");
}

#[test]
fn test_code_single_line_print() {
    let t = "
        @code print(2+2)
    ";
    let s = render(t, json!({}));
    assert_eq!(nows(&s), "4");
}

#[test]
fn test_var_alone_reads_as_null() {
    let s = render("@var k\n>{k}<", json!({}));
    // Declared but unassigned names read as null, which renders empty.
    assert_eq!(nows(&s), "><");
}

#[test]
fn test_import() {
    let t = "
        @import sys
        >{sys.version}<
    ";
    let mut version = Map::new();
    version.insert("version", Value::str("3.0.0"));
    let mut opts = Options::new().module("sys", Value::Map(version));
    let s = stencil::render(t, &json!({}), &mut opts).unwrap();
    assert_eq!(nows(&s), ">3.0.0<");
}
