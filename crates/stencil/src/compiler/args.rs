//! The procedure builder's parsing half: `def`/`block` signatures and
//! directive-call argument lists.
//!
//! Signatures accept comma- or whitespace-separated names, optionally
//! parenthesized, with `name=expr` defaults, one `*rest` and one
//! `**kwrest`, and an optional trailing `:`. Directive calls accept the
//! same sloppiness: `@f 10, 200`, `@f 10 200`, `@f (10, 200)` and
//! `@f a=10, b=200` all bind identically.

use stencil_expr::parse_args;

use crate::error::{Category, CompileError};
use crate::ir::{CallArgs, Param, ParamKind};

use super::exprs::{is_identifier, map_syntax_error, skip_string};

/// Parses the text after `def` / `block`: the procedure name and its
/// parameter list.
pub(crate) fn parse_signature(
    arg: &str,
    line: u32,
) -> Result<(String, Vec<Param>), CompileError> {
    let arg = arg.trim().trim_end_matches(':').trim_end();
    let (name, rest) = split_leading_name(arg);
    if !is_identifier(name) {
        return Err(CompileError::new(
            Category::BadDefinition,
            format!("invalid procedure name '{}'", truncate(arg)),
            line,
        ));
    }

    let rest = rest.trim();
    let inner = match strip_parens(rest) {
        Some(inner) => inner,
        None => rest,
    };

    let mut params = Vec::new();
    let mut seen_default = false;
    let mut seen_rest = false;
    let mut seen_kwrest = false;

    for piece in split_sloppy(inner) {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let param = if let Some(name) = piece.strip_prefix("**") {
            if seen_kwrest {
                return Err(bad_def("duplicate '**' parameter", line));
            }
            seen_kwrest = true;
            Param {
                name: check_param_name(name.trim(), line)?,
                kind: ParamKind::KwRest,
            }
        } else if let Some(name) = piece.strip_prefix('*') {
            if seen_rest {
                return Err(bad_def("duplicate '*' parameter", line));
            }
            if seen_kwrest {
                return Err(bad_def("'*' parameter after '**'", line));
            }
            seen_rest = true;
            Param {
                name: check_param_name(name.trim(), line)?,
                kind: ParamKind::Rest,
            }
        } else if let Some(eq) = find_top_level_eq(piece) {
            let (name, default_src) = piece.split_at(eq);
            let default = stencil_expr::parse_expr(default_src[1..].trim())
                .map_err(|e| map_syntax_error(e, line))?;
            seen_default = true;
            Param {
                name: check_param_name(name.trim(), line)?,
                kind: ParamKind::Default(default),
            }
        } else {
            if seen_default || seen_rest || seen_kwrest {
                return Err(bad_def(
                    format!("required parameter '{piece}' after defaults"),
                    line,
                ));
            }
            Param {
                name: check_param_name(piece, line)?,
                kind: ParamKind::Required,
            }
        };

        if params.iter().any(|p: &Param| p.name == param.name) {
            return Err(bad_def(format!("duplicate parameter '{}'", param.name), line));
        }
        params.push(param);
    }

    Ok((name.to_string(), params))
}

fn bad_def(message: impl Into<String>, line: u32) -> CompileError {
    CompileError::new(Category::BadDefinition, message, line)
}

fn check_param_name(name: &str, line: u32) -> Result<String, CompileError> {
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        Err(bad_def(format!("invalid parameter name '{name}'"), line))
    }
}

fn truncate(s: &str) -> String {
    if s.len() > 32 {
        format!("{}...", &s[..32])
    } else {
        s.to_string()
    }
}

/// Parses a directive-call argument list in any of its sloppy forms.
pub(crate) fn parse_call_args(arg: &str, line: u32) -> Result<CallArgs, CompileError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Ok(CallArgs::default());
    }
    let inner = strip_parens(arg).unwrap_or(arg);
    let normalized = split_sloppy(inner).join(", ");
    let (args, kwargs) = parse_args(&normalized).map_err(|e| map_syntax_error(e, line))?;
    Ok(CallArgs { args, kwargs })
}

/// Splits off a leading identifier.
fn split_leading_name(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

/// Strips one balanced pair of outer parentheses, if the whole text is
/// enclosed by it.
fn strip_parens(s: &str) -> Option<&str> {
    let s = s.trim();
    if !(s.starts_with('(') && s.ends_with(')')) {
        return None;
    }
    // The closing paren must match the opening one.
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return if i == bytes.len() - 1 {
                        Some(&s[1..s.len() - 1])
                    } else {
                        None
                    };
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Splits on top-level commas; when there are none, splits on top-level
/// whitespace instead (the "sloppy" form).
pub(crate) fn split_sloppy(s: &str) -> Vec<String> {
    let by_comma = split_top_level(s, |c| c == b',');
    if by_comma.len() > 1 {
        return by_comma.into_iter().map(|p| p.trim().to_string()).collect();
    }
    split_top_level(s, |c| c == b' ' || c == b'\t')
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Finds the byte index of the first top-level `=`, skipping strings and
/// nested brackets/parens. Used to split `name=default` parameters.
fn find_top_level_eq(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = skip_string(bytes, i);
                continue;
            }
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'=' if depth == 0 => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn split_top_level(s: &str, is_sep: impl Fn(u8) -> bool) -> Vec<&str> {
    let bytes = s.as_bytes();
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
            c if depth == 0 && is_sep(c) => {
                pieces.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    pieces.push(&s[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_forms() {
        for src in ["myfun (a, b)", "myfun(a, b)", "myfun a b", "myfun a, b"] {
            let (name, params) = parse_signature(src, 1).unwrap();
            assert_eq!(name, "myfun", "source: {src}");
            assert_eq!(params.len(), 2, "source: {src}");
        }
    }

    #[test]
    fn test_signature_trailing_colon() {
        let (name, params) = parse_signature("use():", 1).unwrap();
        assert_eq!(name, "use");
        assert!(params.is_empty());
    }

    #[test]
    fn test_signature_defaults_and_collectors() {
        let (_, params) = parse_signature("f(a, b='DEF', *rest, **kw)", 1).unwrap();
        assert!(matches!(params[0].kind, ParamKind::Required));
        assert!(matches!(params[1].kind, ParamKind::Default(_)));
        assert!(matches!(params[2].kind, ParamKind::Rest));
        assert!(matches!(params[3].kind, ParamKind::KwRest));
    }

    #[test]
    fn test_signature_rejects_garbage() {
        assert_eq!(
            parse_signature("...", 3).unwrap_err().category,
            Category::BadDefinition
        );
        assert!(parse_signature("f(a, a)", 1).is_err());
        assert!(parse_signature("f(a='x', b)", 1).is_err());
    }

    #[test]
    fn test_call_args_forms() {
        for src in ["10, 200", "10  200", "(10, 200)"] {
            let call = parse_call_args(src, 1).unwrap();
            assert_eq!(call.args.len(), 2, "source: {src}");
            assert!(call.kwargs.is_empty(), "source: {src}");
        }
        let call = parse_call_args("a=10, b=200", 1).unwrap();
        assert_eq!(call.kwargs.len(), 2);
    }

    #[test]
    fn test_call_args_strings_with_commas() {
        let call = parse_call_args("'a,b', 'c'", 1).unwrap();
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn test_sloppy_split_respects_nesting() {
        assert_eq!(split_sloppy("f(1, 2) g"), vec!["f(1, 2)", "g"]);
        assert_eq!(split_sloppy("[1, 2]"), vec!["[1, 2]"]);
    }
}
