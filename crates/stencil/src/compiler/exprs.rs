//! The expression sub-parser.
//!
//! Locates expression spans inside content lines, splits each span into its
//! base expression and pipe chain, validates every pipe segment as a usable
//! filter, and hands the pieces to the expression parser. This is a pure
//! rewrite stage: nothing is evaluated here.

use stencil_expr::{parse_args, parse_expr, Expr, SyntaxError, SyntaxErrorKind, Value};

use crate::error::{Category, CompileError};
use crate::ir::{FilterCall, OutExpr};
use crate::syntax::Syntax;

/// A content line split into literal and expression segments.
#[derive(Debug)]
pub(crate) enum Segment {
    Literal(String),
    Expr(OutExpr),
}

pub(crate) fn map_syntax_error(err: SyntaxError, line: u32) -> CompileError {
    let category = match err.kind {
        SyntaxErrorKind::Invalid => Category::Syntax,
        SyntaxErrorKind::Unsupported => Category::NotSupported,
    };
    CompileError::new(category, err.message, line)
}

/// Splits a content line on the configured expression markers.
pub(crate) fn split_segments(
    text: &str,
    syntax: &Syntax,
    line: u32,
) -> Result<Vec<Segment>, CompileError> {
    let start = syntax.expr_start();
    let end = syntax.expr_end();
    let mut segments = Vec::new();
    let mut rest = text;

    if start.is_empty() || end.is_empty() {
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }
        return Ok(segments);
    }

    while let Some(pos) = rest.find(start) {
        if pos > 0 {
            segments.push(Segment::Literal(rest[..pos].to_string()));
        }
        let after = &rest[pos + start.len()..];
        let (raw, remainder) = take_span(after, start, end, line)?;
        segments.push(Segment::Expr(compile_span(raw, line)?));
        rest = remainder;
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    Ok(segments)
}

/// Finds the end marker that closes an already-opened span, honouring
/// string literals and (for single-character brace markers) nesting, so a
/// dict literal inside a span does not end it early.
fn take_span<'t>(
    text: &'t str,
    start: &str,
    end: &str,
    line: u32,
) -> Result<(&'t str, &'t str), CompileError> {
    let bytes = text.as_bytes();
    let nested = start.len() == 1 && end.len() == 1 && start != end;
    let (open, close) = (start.as_bytes()[0], end.as_bytes()[0]);
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\'' || c == b'"' {
            i = skip_string(bytes, i);
            continue;
        }
        if nested {
            if c == open {
                depth += 1;
            } else if c == close {
                if depth == 0 {
                    return Ok((&text[..i], &text[i + 1..]));
                }
                depth -= 1;
            }
            i += 1;
        } else {
            if text.is_char_boundary(i) && text[i..].starts_with(end) {
                return Ok((&text[..i], &text[i + end.len()..]));
            }
            i += 1;
        }
    }

    Err(CompileError::new(
        Category::Syntax,
        format!("missing '{end}'"),
        line,
    ))
}

/// Advances past a quoted string starting at `start`; returns the index
/// just after the closing quote (or the end of the text).
pub(crate) fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
            continue;
        }
        if bytes[i] == quote {
            return i + 1;
        }
        i += 1;
    }
    i
}

/// Compiles one expression span: top-level pipe split, base expression
/// parse, filter validation.
pub(crate) fn compile_span(raw: &str, line: u32) -> Result<OutExpr, CompileError> {
    let pieces = split_pipes(raw);
    let mut iter = pieces.into_iter();
    let base = iter.next().unwrap_or_default();
    if base.trim().is_empty() {
        return Err(CompileError::new(Category::Syntax, "empty expression", line));
    }
    let expr = parse_expr(base.trim()).map_err(|e| map_syntax_error(e, line))?;

    let mut filters = Vec::new();
    for piece in iter {
        filters.push(parse_filter(piece.trim(), line)?);
    }
    Ok(OutExpr { expr, filters })
}

/// Splits on `|` at the top level only: outside string literals, parens,
/// brackets and braces.
fn split_pipes(raw: &str) -> Vec<String> {
    let bytes = raw.as_bytes();
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'|' if depth == 0 => {
                pieces.push(raw[start..i].to_string());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    pieces.push(raw[start..].to_string());
    pieces
}

/// Validates a pipe segment: a bare name, a name with arguments, or a
/// string literal (format sugar). Anything else is an invalid filter.
fn parse_filter(piece: &str, line: u32) -> Result<FilterCall, CompileError> {
    if piece.is_empty() {
        return Err(CompileError::new(Category::BadFilter, "empty filter", line));
    }

    if piece.starts_with('\'') || piece.starts_with('"') {
        // `expr | "{:.2f}"` is sugar for a format call with that spec.
        let expr = parse_expr(piece).map_err(|e| map_syntax_error(e, line))?;
        return match expr {
            Expr::Literal(Value::Str(spec)) => Ok(FilterCall {
                name: "format".to_string(),
                args: vec![Expr::Literal(Value::Str(spec))],
            }),
            _ => Err(CompileError::new(
                Category::BadFilter,
                format!("'{piece}' is not a valid filter"),
                line,
            )),
        };
    }

    let (name, args_src) = match piece.find('(') {
        Some(pos) if piece.ends_with(')') => {
            (&piece[..pos], Some(&piece[pos + 1..piece.len() - 1]))
        }
        Some(_) => {
            return Err(CompileError::new(
                Category::Syntax,
                format!("malformed filter call '{piece}'"),
                line,
            ))
        }
        None => (piece, None),
    };

    let name = name.trim();
    if !is_identifier(name) {
        return Err(CompileError::new(
            Category::BadFilter,
            format!("'{piece}' is not a valid filter"),
            line,
        ));
    }

    let args = match args_src {
        Some(src) => {
            let (args, kwargs) = parse_args(src).map_err(|e| map_syntax_error(e, line))?;
            if !kwargs.is_empty() {
                return Err(CompileError::new(
                    Category::BadFilter,
                    "filters take positional arguments only",
                    line,
                ));
            }
            args
        }
        None => Vec::new(),
    };

    Ok(FilterCall {
        name: name.to_string(),
        args,
    })
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &str) -> Vec<Segment> {
        split_segments(text, &Syntax::new(), 1).unwrap()
    }

    #[test]
    fn test_literal_only_line() {
        let segments = spans("no expressions here");
        assert_eq!(segments.len(), 1);
        assert!(matches!(&segments[0], Segment::Literal(s) if s == "no expressions here"));
    }

    #[test]
    fn test_mixed_segments() {
        let segments = spans(">{aa}<");
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[1], Segment::Expr(_)));
    }

    #[test]
    fn test_nested_braces_in_span() {
        let segments = spans("{ {'a': 1} | json }");
        assert_eq!(segments.len(), 1);
        match &segments[0] {
            Segment::Expr(out) => assert_eq!(out.filters[0].name, "json"),
            other => panic!("unexpected segment: {other:?}"),
        }
    }

    #[test]
    fn test_pipe_chain_order() {
        let segments = spans("{aa | upper | html}");
        match &segments[0] {
            Segment::Expr(out) => {
                assert_eq!(out.filters[0].name, "upper");
                assert_eq!(out.filters[1].name, "html");
            }
            other => panic!("unexpected segment: {other:?}"),
        }
    }

    #[test]
    fn test_format_literal_sugar() {
        let segments = spans("{aa | \"{:.2f}\"}");
        match &segments[0] {
            Segment::Expr(out) => {
                assert_eq!(out.filters[0].name, "format");
                assert_eq!(out.filters[0].args.len(), 1);
            }
            other => panic!("unexpected segment: {other:?}"),
        }
    }

    #[test]
    fn test_number_is_invalid_filter() {
        let err = split_segments("{a | 3}", &Syntax::new(), 7).unwrap_err();
        assert_eq!(err.category, Category::BadFilter);
        assert_eq!(err.line, 7);
    }

    #[test]
    fn test_bitwise_and_is_unsupported() {
        let err = split_segments("{a & b}", &Syntax::new(), 1).unwrap_err();
        assert_eq!(err.category, Category::NotSupported);
    }

    #[test]
    fn test_truncated_expression_is_syntax_error() {
        let err = split_segments("{1+}", &Syntax::new(), 1).unwrap_err();
        assert_eq!(err.category, Category::Syntax);
    }

    #[test]
    fn test_unclosed_span() {
        let err = split_segments("{aa", &Syntax::new(), 2).unwrap_err();
        assert_eq!(err.category, Category::Syntax);
    }

    #[test]
    fn test_custom_markers() {
        let syntax = Syntax::new().markers("{{", "}}");
        let segments = split_segments("{{5+5}}...{{aa}}", &syntax, 1).unwrap();
        assert_eq!(segments.len(), 3);
        assert!(matches!(&segments[1], Segment::Literal(s) if s == "..."));
    }

    #[test]
    fn test_pipe_inside_string_is_not_a_split() {
        let segments = spans("{'a|b' | upper}");
        match &segments[0] {
            Segment::Expr(out) => assert_eq!(out.filters.len(), 1),
            other => panic!("unexpected segment: {other:?}"),
        }
    }
}
