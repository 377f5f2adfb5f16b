//! The `if` command.

use serde_json::json;
use stencil::Options;

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

fn render(src: &str, ctx: serde_json::Value) -> String {
    stencil::render(src, &ctx, &mut Options::new()).unwrap()
}

#[test]
fn test_if() {
    let t = "
        @if aa > 1
            yes
        @end
    ";
    assert_eq!(nows(&render(t, json!({"aa": 0}))), "");
    assert_eq!(nows(&render(t, json!({"aa": 2}))), "yes");
}

#[test]
fn test_if_else() {
    let t = "
        @if aa > 1
            yes
        @else
            no
        @end
    ";
    assert_eq!(nows(&render(t, json!({"aa": 2}))), "yes");
    assert_eq!(nows(&render(t, json!({"aa": 0}))), "no");
}

#[test]
fn test_if_elif() {
    let t = "
        @if aa > 10
            >10
        @elif aa > 5
            >5
        @else
            <=5
        @end
    ";
    assert_eq!(nows(&render(t, json!({"aa": 20}))), ">10");
    assert_eq!(nows(&render(t, json!({"aa": 8}))), ">5");
    assert_eq!(nows(&render(t, json!({"aa": 4}))), "<=5");
}

#[test]
fn test_nested_if() {
    let t = "
        @if aa > 5
            >5
            @if aa > 10
                >10
                @if aa > 20
                    >20
                @end
            @else
                <10
            @end
        @elif aa > 2
            >2
        @else
            <=2
            @if aa > 1
                =2
            @else
                =1
            @end
        @end
    ";
    assert_eq!(nows(&render(t, json!({"aa": 25}))), ">5>10>20");
    assert_eq!(nows(&render(t, json!({"aa": 15}))), ">5>10");
    assert_eq!(nows(&render(t, json!({"aa": 5}))), ">2");
    assert_eq!(nows(&render(t, json!({"aa": 2}))), "<=2=2");
    assert_eq!(nows(&render(t, json!({"aa": 1}))), "<=2=1");
}

#[test]
fn test_truthiness_of_collections() {
    let t = "
        @if items
            full
        @else
            empty
        @end
    ";
    assert_eq!(nows(&render(t, json!({"items": []}))), "empty");
    assert_eq!(nows(&render(t, json!({"items": [1]}))), "full");
}
