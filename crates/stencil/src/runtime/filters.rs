//! Built-in filters and the format-spec mini-interpreter.
//!
//! Every filter is a pure function of one value plus optional arguments;
//! callers extend the set through `Options::add_filter`. Filter names in
//! pipe position resolve scope-first (so a template-defined procedure can
//! be piped into), then against the caller registry, then this table.

use once_cell::sync::Lazy;
use regex::Regex;

use stencil_expr::{coerce_float, coerce_int, to_json, EvalError, Value};

pub(crate) type BuiltinFilter = fn(&Value, &[Value]) -> Result<Value, EvalError>;

pub(crate) fn builtin(name: &str) -> Option<BuiltinFilter> {
    Some(match name {
        "raw" => |v, _| Ok(v.clone()),
        "as_int" => |v, _| coerce_int(v).map(Value::Int),
        "as_float" => |v, _| coerce_float(v).map(Value::Float),
        "as_str" => |v, _| Ok(Value::str(v.to_string())),
        "html" => |v, _| Ok(Value::str(escape_html(&v.to_string()))),
        "unhtml" => |v, _| Ok(Value::str(unescape_html(&v.to_string()))),
        "nl2br" => |v, _| Ok(Value::str(v.to_string().replace('\n', "<br/>"))),
        "strip" => |v, _| Ok(Value::str(v.to_string().trim().to_string())),
        "upper" => |v, _| Ok(Value::str(v.to_string().to_uppercase())),
        "lower" => |v, _| Ok(Value::str(v.to_string().to_lowercase())),
        "linkify" => |v, _| Ok(Value::str(linkify(&v.to_string()))),
        "cut" => filter_cut,
        "slice" => filter_slice,
        "json" => |v, _| to_json(v).map(Value::Str),
        "format" => filter_format,
        "join" => filter_join,
        _ => return None,
    })
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"]+"#).expect("url pattern"));

fn linkify(s: &str) -> String {
    URL.replace_all(s, r#"<a href="$0">$0</a>"#).into_owned()
}

fn filter_cut(value: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let n = match args.first() {
        Some(arg) => coerce_int(arg)?.max(0) as usize,
        None => return Err(EvalError::typ("cut() takes a length argument")),
    };
    Ok(Value::str(value.to_string().chars().take(n).collect::<String>()))
}

fn filter_slice(value: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let (start, end) = match args {
        [start, end] => (coerce_int(start)?, coerce_int(end)?),
        _ => return Err(EvalError::typ("slice() takes start and end arguments")),
    };
    stencil_expr::slice_value(value, Some(start), Some(end))
}

fn filter_join(value: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let sep = match args.first() {
        Some(Value::Str(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => ",".to_string(),
    };
    match value {
        Value::List(items) => Ok(Value::str(
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(&sep),
        )),
        other => Err(EvalError::typ(format!(
            "join() expects a list, got {}",
            other.type_name()
        ))),
    }
}

fn filter_format(value: &Value, args: &[Value]) -> Result<Value, EvalError> {
    let spec = match args.first() {
        Some(Value::Str(spec)) => spec.clone(),
        _ => return Err(EvalError::typ("format() takes a format spec string")),
    };
    apply_format(value, &spec).map(Value::Str)
}

/// Applies a format spec. Three accepted shapes:
/// a full format string with one `{...}` placeholder (`"{:03d}"`,
/// `"[{:.2f}]"`), a bare spec (`":.2f"`, `".2f"`), or a conversion
/// (`"!r"`, `"!s"`).
pub(crate) fn apply_format(value: &Value, spec: &str) -> Result<String, EvalError> {
    if let Some(open) = spec.find('{') {
        let close = spec[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| EvalError::value(format!("bad format spec '{spec}'")))?;
        let inner = &spec[open + 1..close];
        let body = format_core(value, inner)?;
        return Ok(format!("{}{}{}", &spec[..open], body, &spec[close + 1..]));
    }
    format_core(value, spec)
}

/// The spec core: optional `!r`/`!s` conversion, else
/// `[0][width][.precision][type]` with types `d`, `f`, `s`.
fn format_core(value: &Value, spec: &str) -> Result<String, EvalError> {
    let spec = spec.strip_prefix(':').unwrap_or(spec);
    if let Some(conv) = spec.strip_prefix('!') {
        return match conv {
            "r" => Ok(value.repr()),
            "s" => Ok(value.to_string()),
            other => Err(EvalError::value(format!("unknown conversion '!{other}'"))),
        };
    }
    if spec.is_empty() {
        return Ok(value.to_string());
    }

    let (spec, ty) = match spec.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&spec[..spec.len() - 1], Some(c)),
        _ => (spec, None),
    };

    let (spec, zero) = match spec.strip_prefix('0') {
        Some(rest) if !rest.is_empty() || ty.is_some() => (rest, true),
        _ => (spec, false),
    };

    let (width_src, precision) = match spec.find('.') {
        Some(dot) => {
            let precision = spec[dot + 1..]
                .parse::<usize>()
                .map_err(|_| EvalError::value("bad precision in format spec"))?;
            (&spec[..dot], Some(precision))
        }
        None => (spec, None),
    };
    let width = if width_src.is_empty() {
        0
    } else {
        width_src
            .parse::<usize>()
            .map_err(|_| EvalError::value(format!("bad width in format spec '{width_src}'")))?
    };

    match ty {
        Some('d') => {
            let n = coerce_int(value)?;
            Ok(if zero {
                format!("{n:0width$}")
            } else {
                format!("{n:width$}")
            })
        }
        Some('f') => {
            let x = coerce_float(value)?;
            let precision = precision.unwrap_or(6);
            Ok(if zero {
                format!("{x:0width$.precision$}")
            } else {
                format!("{x:width$.precision$}")
            })
        }
        Some('s') | None => {
            let mut s = value.to_string();
            if let Some(precision) = precision {
                s = s.chars().take(precision).collect();
            }
            Ok(format!("{s:<width$}"))
        }
        Some(other) => Err(EvalError::value(format!(
            "unsupported format type '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(name: &str, value: Value, args: &[Value]) -> Value {
        builtin(name).expect("filter exists")(&value, args).unwrap()
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(apply("html", Value::str("<b>"), &[]), Value::str("&lt;b&gt;"));
    }

    #[test]
    fn test_unhtml() {
        assert_eq!(
            apply("unhtml", Value::str("<b> abc &lt;b&gt;"), &[]),
            Value::str("<b> abc <b>")
        );
    }

    #[test]
    fn test_nl2br() {
        assert_eq!(
            apply("nl2br", Value::str("aa\nbb"), &[]),
            Value::str("aa<br/>bb")
        );
    }

    #[test]
    fn test_linkify() {
        assert_eq!(
            apply("linkify", Value::str("abc https://www.com def"), &[]),
            Value::str("abc <a href=\"https://www.com\">https://www.com</a> def")
        );
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(apply("as_int", Value::str("0000099"), &[]), Value::Int(99));
        assert_eq!(
            apply("as_float", Value::str("0000099.770000"), &[]),
            Value::Float(99.77)
        );
    }

    #[test]
    fn test_cut_and_slice() {
        assert_eq!(
            apply("cut", Value::str("0123456"), &[Value::Int(3)]),
            Value::str("012")
        );
        assert_eq!(
            apply("slice", Value::str("0123456"), &[Value::Int(1), Value::Int(4)]),
            Value::str("123")
        );
    }

    #[test]
    fn test_join() {
        let list = Value::List(vec![Value::str("X"), Value::str("Y")]);
        assert_eq!(apply("join", list, &[]), Value::str("X,Y"));
    }

    #[test]
    fn test_format_specs() {
        assert_eq!(apply_format(&Value::Int(7), "{:03d}").unwrap(), "007");
        assert_eq!(apply_format(&Value::str("123"), "{:.2f}").unwrap(), "123.00");
        assert_eq!(apply_format(&Value::str("123"), ":.2f").unwrap(), "123.00");
        assert_eq!(
            apply_format(&Value::str("&lt;B&gt;A"), "!r").unwrap(),
            "'&lt;B&gt;A'"
        );
    }

    #[test]
    fn test_format_rejects_bad_spec() {
        assert!(apply_format(&Value::Int(1), "{:qq}").is_err());
    }

    #[test]
    fn test_unknown_filter() {
        assert!(builtin("nope").is_none());
    }
}
