//! The compiled instruction stream.
//!
//! Compilation turns a template into a [`Program`]: an ordered list of
//! instructions whose block-structured members own their nested programs.
//! Every instruction that can fail at runtime carries a [`Loc`] — a source
//! index plus 1-based line — which the interpreter tracks as it executes,
//! so runtime errors always know which template line raised them.

use std::sync::Arc;

use stencil_expr::{Expr, Stmt};

/// Source attribution: which file (index into the template's source table)
/// and which 1-based line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Loc {
    pub source: u32,
    pub line: u32,
}

/// One filter application in a pipe chain.
#[derive(Debug, Clone)]
pub(crate) struct FilterCall {
    pub name: String,
    pub args: Vec<Expr>,
}

/// An expression with its pipe chain, as written in an expression span.
#[derive(Debug, Clone)]
pub(crate) struct OutExpr {
    pub expr: Expr,
    pub filters: Vec<FilterCall>,
}

/// Variable bindings of an `each` loop.
#[derive(Debug, Clone, Default)]
pub(crate) struct EachBind {
    /// `as A` — element (lists) or key (maps).
    pub var: Option<String>,
    /// `as A, B` — B receives the value, A the key/index.
    pub var2: Option<String>,
    /// `index I` — 1-based position.
    pub index: Option<String>,
    /// `index I, T` — T receives the collection length.
    pub total: Option<String>,
}

/// Positional and keyword arguments of a procedure call site.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArgs {
    pub args: Vec<Expr>,
    pub kwargs: Vec<(String, Expr)>,
}

/// How a parameter binds.
#[derive(Debug, Clone)]
pub(crate) enum ParamKind {
    Required,
    Default(Expr),
    /// `*rest`: collects extra positional arguments into a list.
    Rest,
    /// `**kwrest`: collects extra keyword arguments into a map.
    KwRest,
}

#[derive(Debug, Clone)]
pub(crate) struct Param {
    pub name: String,
    pub kind: ParamKind,
}

/// Whether a procedure was defined with `def` or `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcKind {
    Def,
    Block,
}

/// A compiled procedure. Shared because the defining instruction stays in
/// the template while every invocation references it from the interpreter's
/// procedure table.
#[derive(Debug)]
pub(crate) struct ProcDef {
    pub name: String,
    pub kind: ProcKind,
    pub params: Vec<Param>,
    pub body: Program,
}

pub(crate) type Program = Vec<Instr>;

#[derive(Debug, Clone)]
pub(crate) enum Instr {
    /// Literal output.
    Text(String),
    /// Evaluate, filter, and write an expression span. `default_filter`
    /// is false for spans with an explicit pipe chain and for directive
    /// call results.
    Output {
        value: OutExpr,
        default_filter: bool,
        loc: Loc,
    },
    /// `let` with an expression value; several targets distribute the
    /// elements (or characters) of the value.
    Let {
        targets: Vec<String>,
        value: Expr,
        loc: Loc,
    },
    /// Block form of `let`: capture nested output into a variable.
    LetCapture { name: String, body: Program },
    /// `var`: treat names as bound from here on.
    Declare { names: Vec<String> },
    /// `import`: bind registered modules by their root segment.
    Import { names: Vec<String>, loc: Loc },
    /// `code`: host-language statements, one `Loc` each.
    Code { stmts: Vec<(Stmt, Loc)> },
    /// `if` / `elif` arms plus optional `else`.
    If {
        arms: Vec<(Expr, Program)>,
        orelse: Option<Program>,
        loc: Loc,
    },
    /// `each` over a subject, with an `else` program for empty subjects.
    Each {
        subject: Expr,
        bind: EachBind,
        body: Program,
        empty: Option<Program>,
        loc: Loc,
    },
    /// `with`: run the body only when the subject is non-empty.
    With {
        subject: Expr,
        alias: Option<String>,
        body: Program,
        loc: Loc,
    },
    /// `def` / `block`: bind the procedure into the current scope.
    Define { proc: Arc<ProcDef> },
    /// Directive-form call of a defined procedure; `body` is present for
    /// block calls and captured as the implicit `text` argument.
    Call {
        name: String,
        args: CallArgs,
        body: Option<Program>,
        loc: Loc,
    },
    /// `return` inside a procedure body.
    Return { value: Option<Expr>, loc: Loc },
    /// Open a capture buffer (custom commands).
    PushBuf,
    /// Close the top capture buffer and bind the captured text.
    PopBufLet { name: String },
}

/// A compiled template: the executable artifact `compile` produces. Safe to
/// render repeatedly and concurrently — all per-render state lives in the
/// interpreter a render call creates.
#[derive(Debug)]
pub struct Template {
    pub(crate) program: Program,
    /// Display paths by source index; entry 0 is the main template and is
    /// empty for string-compiled templates.
    pub(crate) sources: Vec<String>,
}

impl Template {
    /// Renders a readable listing of the instruction stream, mostly useful
    /// for debugging and golden tests.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        dump_program(&self.program, 0, &mut out);
        out
    }
}

fn dump_program(program: &Program, depth: usize, out: &mut String) {
    for instr in program {
        dump_instr(instr, depth, out);
    }
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(text);
    out.push('\n');
}

fn dump_instr(instr: &Instr, depth: usize, out: &mut String) {
    match instr {
        Instr::Text(text) => line(out, depth, &format!("text {text:?}")),
        Instr::Output { value, loc, .. } => line(
            out,
            depth,
            &format!(
                "output <expr> | {} filters (line {})",
                value.filters.len(),
                loc.line
            ),
        ),
        Instr::Let { targets, loc, .. } => line(
            out,
            depth,
            &format!("let {} (line {})", targets.join(", "), loc.line),
        ),
        Instr::LetCapture { name, body } => {
            line(out, depth, &format!("let {name} = capture:"));
            dump_program(body, depth + 1, out);
        }
        Instr::Declare { names } => line(out, depth, &format!("var {}", names.join(", "))),
        Instr::Import { names, .. } => line(out, depth, &format!("import {}", names.join(", "))),
        Instr::Code { stmts } => line(out, depth, &format!("code ({} statements)", stmts.len())),
        Instr::If { arms, orelse, .. } => {
            for (i, (_, body)) in arms.iter().enumerate() {
                line(out, depth, if i == 0 { "if <expr>:" } else { "elif <expr>:" });
                dump_program(body, depth + 1, out);
            }
            if let Some(body) = orelse {
                line(out, depth, "else:");
                dump_program(body, depth + 1, out);
            }
        }
        Instr::Each { body, empty, .. } => {
            line(out, depth, "each <expr>:");
            dump_program(body, depth + 1, out);
            if let Some(body) = empty {
                line(out, depth, "else:");
                dump_program(body, depth + 1, out);
            }
        }
        Instr::With { alias, body, .. } => {
            match alias {
                Some(name) => line(out, depth, &format!("with <expr> as {name}:")),
                None => line(out, depth, "with <expr>:"),
            }
            dump_program(body, depth + 1, out);
        }
        Instr::Define { proc } => {
            line(
                out,
                depth,
                &format!("def {}({} params):", proc.name, proc.params.len()),
            );
            dump_program(&proc.body, depth + 1, out);
        }
        Instr::Call { name, body, .. } => {
            line(out, depth, &format!("call {name}"));
            if let Some(body) = body {
                dump_program(body, depth + 1, out);
            }
        }
        Instr::Return { .. } => line(out, depth, "return"),
        Instr::PushBuf => line(out, depth, "pushbuf"),
        Instr::PopBufLet { name } => line(out, depth, &format!("popbuf -> {name}")),
    }
}
