//! Caller-supplied directives.
//!
//! A [`CommandSet`] extends the directive language: when the compiler meets
//! a directive name that is neither a built-in nor a defined procedure, it
//! asks the command set. The handler compiles itself through a
//! [`CommandContext`], which exposes the same primitives the built-in
//! handlers use — emit output, capture nested content, parse ahead to a
//! closing directive.

use stencil_expr::Expr;

use crate::error::{Category, CompileError};
use crate::ir::{FilterCall, Instr, OutExpr};

use super::Compiler;

/// A set of caller-defined directive handlers, looked up by (lowercased)
/// directive name.
pub trait CommandSet {
    /// Whether this set handles the given directive name.
    fn contains(&self, name: &str) -> bool;

    /// Compiles one occurrence of the directive. The raw argument text and
    /// emission primitives are on the context.
    fn compile(&self, name: &str, cc: &mut CommandContext<'_, '_, '_>) -> Result<(), CompileError>;
}

/// The compiler surface handed to custom command handlers.
pub struct CommandContext<'c, 'l, 'o> {
    pub(crate) compiler: &'c mut Compiler<'l, 'o>,
    pub(crate) arg: String,
    pub(crate) line: u32,
}

impl CommandContext<'_, '_, '_> {
    /// The raw argument text after the directive name.
    pub fn arg(&self) -> &str {
        self.arg.trim()
    }

    /// The 1-based line the directive occurred on.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Parses expression source, e.g. the directive argument or something
    /// assembled around it.
    pub fn parse_expression(&self, src: &str) -> Result<Expr, CompileError> {
        stencil_expr::parse_expr(src).map_err(|e| {
            self.compiler
                .locate(super::exprs::map_syntax_error(e, self.line))
        })
    }

    /// Emits literal output.
    pub fn emit_text(&mut self, text: &str) {
        self.compiler.emitter.add(Instr::Text(text.to_string()));
    }

    /// Emits an instruction that evaluates the expression and writes its
    /// value (no default filter applies).
    pub fn emit_output(&mut self, expr: Expr) {
        let loc = self.compiler.loc(self.line);
        self.compiler.emitter.add(Instr::Output {
            value: OutExpr {
                expr,
                filters: Vec::new(),
            },
            default_filter: false,
            loc,
        });
    }

    /// Emits an instruction that evaluates the expression, pipes it through
    /// the named filters, and writes the result.
    pub fn emit_filtered(&mut self, expr: Expr, filters: &[&str]) {
        let loc = self.compiler.loc(self.line);
        self.compiler.emitter.add(Instr::Output {
            value: OutExpr {
                expr,
                filters: filters
                    .iter()
                    .map(|name| FilterCall {
                        name: name.to_string(),
                        args: Vec::new(),
                    })
                    .collect(),
            },
            default_filter: false,
            loc,
        });
    }

    /// Opens a capture buffer; everything emitted until the matching
    /// [`pop_buffer_into`](Self::pop_buffer_into) renders into it instead
    /// of the output.
    pub fn push_buffer(&mut self) {
        self.compiler.emitter.add(Instr::PushBuf);
    }

    /// Closes the top capture buffer and binds the captured text to a
    /// variable, ready to be referenced from an emitted expression.
    pub fn pop_buffer_into(&mut self, name: &str) {
        self.compiler.emitter.add(Instr::PopBufLet {
            name: name.to_string(),
        });
    }

    /// Compiles template lines (directives included) until one of the
    /// stopping directive names appears at this nesting level, consuming
    /// it. Returns the stopping name.
    pub fn parse_until(&mut self, stops: &[&str]) -> Result<String, CompileError> {
        match self.compiler.parse_until(stops)? {
            Some(found) => Ok(found),
            None => Err(self.compiler.locate(CompileError::new(
                Category::UnexpectedEof,
                format!("missing '{}'", stops.join("' or '")),
                self.line,
            ))),
        }
    }
}
