//! Error types for compilation and rendering.
//!
//! Two independent taxonomies: [`CompileError`] has a fixed category
//! enumeration and is never recovered from — a template compiles fully or
//! not at all. [`RuntimeError`] is raised while executing a compiled
//! template and is subject to the render call's error policy (strict,
//! recovery callback, or silent).

use std::fmt;

use stencil_expr::EvalErrorKind;

/// Category of a compile-time failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Malformed directive or expression.
    Syntax,
    /// Directive name matched no built-in, defined procedure, or custom
    /// command.
    UnknownCommand,
    /// A binding target that is not a valid identifier.
    InvalidIdentifier,
    /// Input ended with unterminated blocks open.
    UnexpectedEof,
    /// Malformed `def` / `block` signature.
    BadDefinition,
    /// An `include` path that cannot be resolved (or includes itself).
    FileNotFound,
    /// A construct the expression language rejects by design.
    NotSupported,
    /// A pipe segment that is not a usable filter.
    BadFilter,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Syntax => "syntax error",
            Category::UnknownCommand => "unknown command",
            Category::InvalidIdentifier => "invalid identifier",
            Category::UnexpectedEof => "unexpected end of input",
            Category::BadDefinition => "invalid definition",
            Category::FileNotFound => "file not found",
            Category::NotSupported => "unsupported construct",
            Category::BadFilter => "invalid filter",
        };
        f.write_str(name)
    }
}

/// A structured compile-time error: category, message, 1-based source line,
/// and the path of the file it occurred in (empty for string templates).
#[derive(Debug, Clone)]
pub struct CompileError {
    pub category: Category,
    pub message: String,
    pub line: u32,
    pub path: String,
}

impl CompileError {
    pub fn new(category: Category, message: impl Into<String>, line: u32) -> Self {
        CompileError {
            category,
            message: message.into(),
            line,
            path: String::new(),
        }
    }

    pub(crate) fn at_path(mut self, path: &str) -> Self {
        if self.path.is_empty() {
            self.path = path.to_string();
        }
        self
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(
                f,
                "{}: {} (line {})",
                self.category, self.message, self.line
            )
        } else {
            write!(
                f,
                "{}: {} ({}, line {})",
                self.category, self.message, self.path, self.line
            )
        }
    }
}

/// Kind of a runtime failure, mirroring the evaluator's classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// A bare name bound nowhere in the scope chain.
    Undefined,
    /// Attribute / key / index resolution failed on an existing value.
    Lookup,
    /// Wrong shape: non-iterable `each` subject, calling a non-callable,
    /// argument mismatch, mixed-type arithmetic.
    Type,
    /// Division by zero.
    DivideByZero,
    /// A conversion rejected the value (e.g. `as_int` on `"abc"`).
    Value,
}

impl From<EvalErrorKind> for RuntimeErrorKind {
    fn from(kind: EvalErrorKind) -> Self {
        match kind {
            EvalErrorKind::Undefined => RuntimeErrorKind::Undefined,
            EvalErrorKind::Lookup => RuntimeErrorKind::Lookup,
            EvalErrorKind::Type => RuntimeErrorKind::Type,
            EvalErrorKind::DivideByZero => RuntimeErrorKind::DivideByZero,
            EvalErrorKind::Value => RuntimeErrorKind::Value,
        }
    }
}

/// A runtime failure with full source attribution. In recovery and silent
/// modes this is what the `on_error` / `on_warn` callbacks receive.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    /// Path of the template (or included file) whose line raised the error;
    /// empty for string templates.
    pub path: String,
    /// 1-based line within that file.
    pub line: u32,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{} (line {})", self.message, self.line)
        } else {
            write!(f, "{} ({}, line {})", self.message, self.path, self.line)
        }
    }
}

impl std::error::Error for CompileError {}

impl std::error::Error for RuntimeError {}

/// Top-level error type of the public API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("context error: {0}")]
    Context(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display_carries_line() {
        let err = CompileError::new(Category::Syntax, "bad expression", 4);
        let text = err.to_string();
        assert!(text.contains("syntax error"));
        assert!(text.contains("line 4"));
    }

    #[test]
    fn test_runtime_error_display_carries_path() {
        let err = RuntimeError {
            kind: RuntimeErrorKind::Lookup,
            message: "no attribute or key 'bb'".into(),
            path: "defs".into(),
            line: 4,
        };
        let text = err.to_string();
        assert!(text.contains("defs"));
        assert!(text.contains("line 4"));
    }
}
