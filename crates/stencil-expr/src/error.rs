//! Error types for expression parsing and evaluation.

use std::fmt;

/// What went wrong while parsing an expression or statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Malformed input: unbalanced parens, truncated operand, stray token.
    Invalid,
    /// A construct the expression language deliberately does not carry
    /// (bitwise and shift operators, mostly).
    Unsupported,
}

/// Parse-time error. Carries no source position of its own; the template
/// compiler attaches the line number of the enclosing template line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub message: String,
}

impl SyntaxError {
    pub fn invalid(message: impl Into<String>) -> Self {
        SyntaxError {
            kind: SyntaxErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        SyntaxError {
            kind: SyntaxErrorKind::Unsupported,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyntaxError {}

/// Classification of an evaluation failure. The engine maps these onto its
/// runtime error kinds one to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// A bare name that is bound nowhere in the scope chain.
    Undefined,
    /// Attribute, key or index resolution failed on an existing value.
    Lookup,
    /// Operand or argument of the wrong shape: non-iterable iteration,
    /// calling a non-callable, arity mismatch, mixed-type arithmetic.
    Type,
    /// Integer or float division by zero.
    DivideByZero,
    /// A conversion rejected the value itself (e.g. `int("abc")`).
    Value,
}

/// Evaluation failure, raised by [`crate::eval`] and the built-in functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub message: String,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind, message: impl Into<String>) -> Self {
        EvalError {
            kind,
            message: message.into(),
        }
    }

    pub fn undefined(name: &str) -> Self {
        Self::new(EvalErrorKind::Undefined, format!("'{name}' is not defined"))
    }

    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Lookup, message)
    }

    pub fn typ(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Type, message)
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Value, message)
    }

    pub fn zero_division() -> Self {
        Self::new(EvalErrorKind::DivideByZero, "division by zero")
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EvalError {}
