//! The `each` command.

use serde_json::json;
use stencil::Options;

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

fn render(src: &str, ctx: serde_json::Value) -> String {
    stencil::render(src, &ctx, &mut Options::new()).unwrap()
}

#[test]
fn test_nokey() {
    let t = "
        @each it
            *
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "***");
}

#[test]
fn test_value() {
    let t = "
        @each it as e
            {e}!
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "aaa!bbb!ccc!");
}

#[test]
fn test_key_value() {
    let t = "
        @each it as n, e
            {n}={e}!
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "0=aaa!1=bbb!2=ccc!");
}

#[test]
fn test_index() {
    let t = "
        @each it index k
            {k}!
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "1!2!3!");
}

#[test]
fn test_index_len() {
    let t = "
        @each it index k, total
            {k}-{total}!
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "1-3!2-3!3-3!");
}

#[test]
fn test_value_index() {
    let t = "
        @each it as e index k
            {k}={e}!
        @end
    ";
    let s = render(t, json!({"it": ["aaa", "bbb", "ccc"]}));
    assert_eq!(nows(&s), "1=aaa!2=bbb!3=ccc!");
}

#[test]
fn test_dict_value() {
    let t = "
        @each it as key, val
            {key}={val}!
        @end
    ";
    // JSON contexts arrive with sorted keys.
    let s = render(t, json!({"it": {"a": "aaa", "c": "ccc", "b": "bbb"}}));
    assert_eq!(nows(&s), "a=aaa!b=bbb!c=ccc!");
}

#[test]
fn test_dict_single_var_is_key() {
    let t = "
        @each it as k
            {k}!
        @end
    ";
    let s = render(t, json!({"it": {"x": 1, "y": 2}}));
    assert_eq!(nows(&s), "x!y!");
}

#[test]
fn test_string_iteration() {
    let t = "
        @each s as c
            [{c}]
        @end
    ";
    let s = render(t, json!({"s": "ab"}));
    assert_eq!(nows(&s), "[a][b]");
}

#[test]
fn test_empty() {
    let t = "
        >
        @each it as e
            {e}
        @end
        <
    ";
    let s = render(t, json!({"it": []}));
    assert_eq!(nows(&s), "><");
}

#[test]
fn test_empty_else() {
    let t = "
        >
        @each it as e
            {e}
        @else
            EMPTY!
        @end
        <
    ";
    let s = render(t, json!({"it": []}));
    assert_eq!(nows(&s), ">EMPTY!<");
}

#[test]
fn test_else_skipped_when_not_empty() {
    let t = "
        @each it as e
            {e}
        @else
            EMPTY!
        @end
    ";
    let s = render(t, json!({"it": ["x"]}));
    assert_eq!(nows(&s), "x");
}

#[test]
fn test_nested_each() {
    let t = "
        @each rows as row
            @each row as cell
                {cell},
            @end
            ;
        @end
    ";
    let s = render(t, json!({"rows": [[1, 2], [3]]}));
    assert_eq!(nows(&s), "1,2,;3,;");
}
