//! Procedure definitions and the four call forms.

use serde_json::json;
use stencil::Options;

fn nows(s: &str) -> String {
    s.split_whitespace().collect()
}

fn render(src: &str, ctx: serde_json::Value) -> String {
    stencil::render(src, &ctx, &mut Options::new()).unwrap()
}

#[test]
fn test_def() {
    let t = "
        @def myfun (a, b)
            arg1={a}
            |
            arg2={b}
            |
            {a}/{b}
        @end

        |
        {myfun(x, y)}
        |
        {myfun(u, w)}
        |
    ";
    let s = render(
        t,
        json!({"x": "xx", "y": "yy", "u": "uu", "w": "ww"}),
    );
    assert_eq!(nows(&s), "|arg1=xx|arg2=yy|xx/yy|arg1=uu|arg2=ww|uu/ww|");
}

#[test]
fn test_noargs() {
    let t = "
        @def myfun
            bb
        @end
        |
        {myfun()}
        |
    ";
    assert_eq!(nows(&render(t, json!({}))), "|bb|");
}

#[test]
fn test_name_case() {
    let t = "
        @def myFunAb
            bb
        @end
        |
        {myFunAb()}
        |
        @myFunAb
        |
    ";
    assert_eq!(nows(&render(t, json!({}))), "|bb|bb|");
}

#[test]
fn test_sloppy_args() {
    let t = "
        @def f1 a b
            [ {a}-{b} ]
        @end
        @def f2 a, b
            [ {a}-{b} ]
        @end

        {f1('aa', 'bb')}
        {f2('xx', 'yy')}
    ";
    assert_eq!(nows(&render(t, json!({}))), "[aa-bb][xx-yy]");
}

#[test]
fn test_default_args() {
    let t = "
        @def myfun(a, b='DEF')
            [ {a}-{b} ]
        @end

        {myfun('aa')}
        {myfun('aa', 'XYZ')}
        {myfun('aa', b='UWV')}
    ";
    assert_eq!(nows(&render(t, json!({}))), "[aa-DEF][aa-XYZ][aa-UWV]");
}

#[test]
fn test_star_args() {
    let t = "
        @def myfun(a, *b)
            [ {a}-{b | join} ]
        @end

        {myfun('aa')}
        {myfun('aa', 'X')}
        {myfun('aa', 'X', 'Y')}
    ";
    assert_eq!(nows(&render(t, json!({}))), "[aa-][aa-X][aa-X,Y]");
}

#[test]
fn test_2star_args() {
    let t = "
        @def myfun(a, **b)
            [ {a}-{b | json} ]
        @end

        {myfun('aa', p=11, q=22)}
    ";
    assert_eq!(nows(&render(t, json!({}))), "[aa-{\"p\":11,\"q\":22}]");
}

#[test]
fn test_explicit_return() {
    let t = "
        @def myfun(a, b)
            @return a + b
        @end

        |
        {myfun(10, 200)}
        |
    ";
    assert_eq!(nows(&render(t, json!({}))), "|210|");
}

#[test]
fn test_return_none() {
    let t = "
        @def myfun(a, b)
            begin
            @if a > b
                @return
            @end
            end
        @end

        |
        {myfun(10, 200)}
        |
        {myfun(1000, 200)}
    ";
    // A bare return discards the body's partial output entirely.
    assert_eq!(nows(&render(t, json!({}))), "|beginend|");
}

#[test]
fn test_as_command() {
    let t = "
        @def myfun(a, b)
            {a + b}
        @end

        |
        @myfun 10, 200
        |
        @myfun 10  200
        |
        @myfun (10, 200)
        |
    ";
    assert_eq!(nows(&render(t, json!({}))), "|210|210|210|");
}

#[test]
fn test_as_command_with_keyword_args() {
    let t = "
        @def myfun(a, b)
            {a + b}
        @end
        |
        @myfun a=10, b=200
        |
    ";
    assert_eq!(nows(&render(t, json!({}))), "|210|");
}

#[test]
fn test_as_filter() {
    let t = "
        @def myfun(a, b=200)
            {a + b}
        @end

        |
        {aa | myfun}
        |
        {aa | myfun(300)}
        |
    ";
    assert_eq!(nows(&render(t, json!({"aa": 5}))), "|205|305|");
}

#[test]
fn test_block() {
    let t = "
        @block myblock(text, a, b)
            {a} {text} {b}
        @end

        @myblock '>', '<'
            some
            text
        @end
    ";
    assert_eq!(nows(&render(t, json!({}))), ">sometext<");
}

#[test]
fn test_block_implicit_text_param() {
    let t = "
        @block wrap(tag)
            <{tag}>{text | strip}</{tag}>
        @end

        @wrap 'b'
            hi
        @end
    ";
    assert_eq!(nows(&render(t, json!({}))), "<b>hi</b>");
}

#[test]
fn test_scope() {
    let t = "
        @let c = 'C'

        @def use():
            [ {a},{b},{c} ]
        @end

        @def overwrite(b):
            @let c = 'newC'
            [ {a},{b},{c} ]
        @end

        [ {a},{b},{c}]
        {use()}
        {overwrite('newB')}
    ";
    let s = render(t, json!({"a": "A", "b": "B"}));
    assert_eq!(nows(&s), "[A,B,C][A,B,C][A,newB,newC]");
}

#[test]
fn test_dynamic_scope() {
    let t = "
        @let c = 0
        @let d = 0

        @def use():
            [ {a},{b},{c} ]
        @end

        @def overwrite(b):
            @let c = 'newC'
            [ {a},{b},{c} ]
        @end

        @let c = 'C'

        [ {a},{b},{c}]
        {use()}
        {overwrite('newB')}
    ";
    let s = render(t, json!({"a": "A", "b": "B"}));
    assert_eq!(nows(&s), "[A,B,C][A,B,C][A,newB,newC]");
}

#[test]
fn test_local_let_does_not_leak() {
    let t = "
        @let c 'outer'
        @def f():
            @let c 'inner'
            [{c}]
        @end
        {f()}
        [{c}]
    ";
    assert_eq!(nows(&render(t, json!({}))), "[inner][outer]");
}

#[test]
fn test_call_forms_are_equivalent() {
    let t = "
        @def twice(v)
            {v}{v}
        @end
        {twice('a')}|
        @twice 'a'
        |{'a' | twice}
    ";
    assert_eq!(nows(&render(t, json!({}))), "aa|aa|aa");
}
