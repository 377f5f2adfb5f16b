//! Per-call options for compilation and rendering.
//!
//! One bag covers both halves, mirroring how every entry point accepts the
//! same set: `compile` reads the syntax/strip/commands/finder half, a
//! render call reads the filter/policy/module half.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use stencil_expr::Value;

use crate::compiler::commands::CommandSet;
use crate::error::RuntimeError;
use crate::syntax::Syntax;

/// Resolves an `include` path: receives the including file (if any) and the
/// requested path, returns the file to read.
pub type Finder<'a> = Box<dyn Fn(Option<&Path>, &str) -> Option<PathBuf> + 'a>;

/// A caller-registered filter: value in, optional arguments, value out.
pub type Filter<'a> = Box<dyn Fn(&Value, &[Value]) -> Result<Value, String> + 'a>;

/// Error / warning callback.
pub type Hook<'a> = Box<dyn FnMut(&RuntimeError) + 'a>;

/// Options for [`compile`](crate::compile) and [`render`](crate::render).
///
/// # Example
///
/// ```rust
/// use stencil::Options;
///
/// let mut failures = Vec::new();
/// let mut opts = Options::new()
///     .strip(true)
///     .filter("html")
///     .on_error(|err| failures.push(err.to_string()));
/// let out = stencil::render("{aa}", &serde_json::json!({"aa": "<b>"}), &mut opts).unwrap();
/// drop(opts);
/// assert_eq!(out, "&lt;b&gt;");
/// assert!(failures.is_empty());
/// ```
#[derive(Default)]
pub struct Options<'a> {
    pub(crate) strip: bool,
    pub(crate) silent: bool,
    pub(crate) filter: Option<String>,
    pub(crate) path: Option<PathBuf>,
    pub(crate) syntax: Option<Syntax>,
    pub(crate) commands: Option<&'a dyn CommandSet>,
    pub(crate) finder: Option<Finder<'a>>,
    pub(crate) on_error: Option<Hook<'a>>,
    pub(crate) on_warn: Option<Hook<'a>>,
    pub(crate) filters: HashMap<String, Filter<'a>>,
    pub(crate) modules: HashMap<String, Value>,
}

impl<'a> Options<'a> {
    pub fn new() -> Self {
        Options::default()
    }

    /// Enables whitespace compaction: content lines are trimmed, lines that
    /// trim to nothing vanish, and no newlines are emitted between lines.
    pub fn strip(mut self, on: bool) -> Self {
        self.strip = on;
        self
    }

    /// Applies a named filter to every expression span that has no explicit
    /// pipe chain (`| raw` opts a span out).
    pub fn filter(mut self, name: &str) -> Self {
        self.filter = Some(name.to_string());
        self
    }

    /// Silent mode: runtime errors produce empty output, never propagate,
    /// and invoke the warning hook when one is registered.
    pub fn silent(mut self, on: bool) -> Self {
        self.silent = on;
        self
    }

    /// Source identifier used in error messages for string templates.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Overrides the template syntax for this compilation.
    pub fn syntax(mut self, syntax: Syntax) -> Self {
        self.syntax = Some(syntax);
        self
    }

    /// Registers caller-supplied directive handlers.
    pub fn commands(mut self, commands: &'a dyn CommandSet) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Registers an `include` path resolver.
    pub fn finder(
        mut self,
        finder: impl Fn(Option<&Path>, &str) -> Option<PathBuf> + 'a,
    ) -> Self {
        self.finder = Some(Box::new(finder));
        self
    }

    /// Recovery mode: the hook receives each runtime error, the failing
    /// expression contributes empty output, and rendering continues.
    pub fn on_error(mut self, hook: impl FnMut(&RuntimeError) + 'a) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    /// Warning hook for silent mode.
    pub fn on_warn(mut self, hook: impl FnMut(&RuntimeError) + 'a) -> Self {
        self.on_warn = Some(Box::new(hook));
        self
    }

    /// Registers a named filter usable in pipe position.
    pub fn add_filter(
        mut self,
        name: &str,
        filter: impl Fn(&Value, &[Value]) -> Result<Value, String> + 'a,
    ) -> Self {
        self.filters.insert(name.to_string(), Box::new(filter));
        self
    }

    /// Registers a module value for `@import`. The name is the root
    /// segment import statements bind.
    pub fn module(mut self, name: &str, value: Value) -> Self {
        self.modules.insert(name.to_string(), value);
        self
    }
}
