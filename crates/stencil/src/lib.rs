//! A line-directive template engine.
//!
//! Templates are ordinary text with two embedded notations: expressions
//! between `{` and `}` markers, and line-level directives starting with
//! `@`. Both notations are configurable per compile (see [`Syntax`]).
//!
//! ```text
//! @each users as u index i, n
//!     {i}/{n} {u.name | upper}
//! @else
//!     nobody here
//! @end
//! ```
//!
//! # Rendering
//!
//! Anything `serde::Serialize` works as a context:
//!
//! ```rust
//! use serde_json::json;
//! use stencil::Options;
//!
//! let out = stencil::render(
//!     "@each it as e\n{e}!\n@end",
//!     &json!({"it": ["a", "b"]}),
//!     &mut Options::new().strip(true),
//! ).unwrap();
//! assert_eq!(out, "a!b!");
//! ```
//!
//! Compile once, render many times — a [`Template`] is immutable and every
//! render call keeps its own state, so concurrent renders of one compiled
//! template are safe by construction:
//!
//! ```rust
//! use serde_json::json;
//! use stencil::Options;
//!
//! let template = stencil::compile(">{aa}<", &Options::new()).unwrap();
//! let a = template.render(&json!({"aa": 1}), &mut Options::new()).unwrap();
//! let b = template.render(&json!({"aa": 2}), &mut Options::new()).unwrap();
//! assert_eq!((a.as_str(), b.as_str()), (">1<", ">2<"));
//! ```
//!
//! # Directives
//!
//! `if`/`elif`/`else`, `each` (with `as` value/key-value and 1-based
//! `index` variables, plus an `else` branch for empty subjects), `with`,
//! `let` (expression, multi-target, and output-capturing block forms),
//! `def`/`block` procedures callable as expressions, directives, filters
//! or block calls, `quote`/`comment` raw blocks, `code`, `import`, `var`,
//! `include`, and `return`. Unknown directive names dispatch to defined
//! procedures and then to caller-registered [`CommandSet`] handlers.
//!
//! # Error policy
//!
//! Compilation either fully succeeds or fails with a categorized
//! [`CompileError`]. Runtime errors follow the render call's policy:
//! strict (default) raises the first [`RuntimeError`]; an
//! [`on_error`](Options::on_error) hook switches to recovery (failing
//! expressions render as empty, the hook sees every error with its path
//! and line); [`silent`](Options::silent) never raises at all.

mod compiler;
mod error;
mod ir;
mod lexer;
mod options;
mod runtime;
mod syntax;

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;

pub use compiler::commands::{CommandContext, CommandSet};
pub use error::{Category, CompileError, Error, RuntimeError, RuntimeErrorKind};
pub use ir::Template;
pub use options::{Filter, Finder, Hook, Options};
pub use syntax::Syntax;

// The expression language is part of the public surface: custom filters
// and commands receive and produce its values.
pub use stencil_expr::{Expr, Map, Value};

/// Compiles template source into a reusable [`Template`].
pub fn compile(source: &str, opts: &Options<'_>) -> Result<Template, CompileError> {
    compiler::compile_source(source, opts)
}

/// Compiles and renders in one step.
pub fn render<T: Serialize>(
    source: &str,
    context: &T,
    opts: &mut Options<'_>,
) -> Result<String, Error> {
    let template = compile(source, opts)?;
    template.render(context, opts)
}

/// Reads, compiles and renders a template file. The file's path becomes
/// the error-attribution path and the base for relative `include`s.
pub fn render_path<T: Serialize>(
    path: impl AsRef<Path>,
    context: &T,
    opts: &mut Options<'_>,
) -> Result<String, Error> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)?;
    if opts.path.is_none() {
        opts.path = Some(path.to_path_buf());
    }
    let template = compile(&source, opts)?;
    template.render(context, opts)
}

impl Template {
    /// Renders with the given context and options.
    pub fn render<T: Serialize>(
        &self,
        context: &T,
        opts: &mut Options<'_>,
    ) -> Result<String, Error> {
        let globals = context_globals(context)?;
        runtime::render_template(self, globals, opts).map_err(Error::from)
    }
}

/// Serializes the context and converts it into the engine's value model.
/// The context must be a structure/map (or null for none).
fn context_globals<T: Serialize>(context: &T) -> Result<HashMap<String, Value>, Error> {
    let json = serde_json::to_value(context).map_err(|e| Error::Context(e.to_string()))?;
    match json {
        serde_json::Value::Null => Ok(HashMap::new()),
        serde_json::Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect()),
        other => Err(Error::Context(format!(
            "context must serialize to an object, got {}",
            match other {
                serde_json::Value::Array(_) => "an array",
                serde_json::Value::String(_) => "a string",
                serde_json::Value::Number(_) => "a number",
                serde_json::Value::Bool(_) => "a bool",
                _ => "something else",
            }
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_passthrough() {
        let out = render("aa bb cc dd", &json!({}), &mut Options::new()).unwrap();
        assert_eq!(out, "aa bb cc dd");
    }

    #[test]
    fn test_empty_template() {
        let out = render("", &json!({}), &mut Options::new()).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn test_context_must_be_object() {
        assert!(render("x", &json!([1, 2]), &mut Options::new()).is_err());
        assert!(render("x", &json!(null), &mut Options::new()).is_ok());
    }

    #[test]
    fn test_template_dump_is_readable() {
        let template = compile("@if aa\nhi\n@end", &Options::new()).unwrap();
        let listing = template.dump();
        assert!(listing.contains("if <expr>:"));
        assert!(listing.contains("text"));
    }
}
