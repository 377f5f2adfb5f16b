//! Compile-time failures: the fixed category enumeration and exact line
//! attribution.

use stencil::{Category, CompileError, Options};

fn compile_err(src: &str) -> CompileError {
    stencil::compile(src, &Options::new()).unwrap_err()
}

#[test]
fn test_error_syntax() {
    assert_eq!(compile_err("{1+}").category, Category::Syntax);
}

#[test]
fn test_error_command() {
    assert_eq!(compile_err("@blah").category, Category::UnknownCommand);
}

#[test]
fn test_error_ident() {
    assert_eq!(compile_err("@let $$$").category, Category::InvalidIdentifier);
}

#[test]
fn test_error_eof() {
    let err = compile_err("@if a");
    assert_eq!(err.category, Category::UnexpectedEof);
    assert_eq!(err.line, 1);
}

#[test]
fn test_error_def() {
    assert_eq!(compile_err("@def ...").category, Category::BadDefinition);
}

#[test]
fn test_error_file() {
    assert_eq!(compile_err("@include bleh").category, Category::FileNotFound);
}

#[test]
fn test_error_not_supported() {
    assert_eq!(compile_err("{a & b}").category, Category::NotSupported);
}

#[test]
fn test_error_filter() {
    assert_eq!(compile_err("{a | 3}").category, Category::BadFilter);
}

#[test]
fn test_line_number() {
    let t = "\
        @each x
        ...
        ...
        @let 123 = ''
        ...
        ...
        @end
    ";
    let err = compile_err(t);
    assert_eq!(err.category, Category::InvalidIdentifier);
    assert_eq!(err.line, 4);
    assert!(err.to_string().contains("line 4"));
}

#[test]
fn test_unexpected_end() {
    let err = compile_err("hello\n@end");
    assert_eq!(err.category, Category::Syntax);
    assert_eq!(err.line, 2);
}

#[test]
fn test_unterminated_reports_opener_line() {
    let err = compile_err("one\ntwo\n@each xs\nbody");
    assert_eq!(err.category, Category::UnexpectedEof);
    assert_eq!(err.line, 3);
}

#[test]
fn test_return_outside_procedure() {
    assert_eq!(compile_err("@return 1").category, Category::Syntax);
}

#[test]
fn test_elif_without_if() {
    assert_eq!(compile_err("@elif x").category, Category::Syntax);
}

#[test]
fn test_compile_never_partially_succeeds() {
    // Either a template or an error, nothing in between.
    assert!(stencil::compile("ok {fine} ok", &Options::new()).is_ok());
    assert!(stencil::compile("ok {fine} {1+}", &Options::new()).is_err());
}
