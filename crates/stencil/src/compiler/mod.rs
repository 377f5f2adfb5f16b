//! The directive parser and block compiler.
//!
//! A line-at-a-time driver with an explicit block stack: content lines go
//! through the expression sub-parser and emit output instructions,
//! directive lines dispatch by (case-normalized) name. Block-opening
//! handlers push a stack frame and open an emitter buffer; `end` pops and
//! assembles the finished instruction. The explicit stack is what lets
//! "unexpected end" and "unterminated block" report exact line numbers —
//! the latter always names the opener's line, even across `include`
//! boundaries.

pub(crate) mod args;
pub(crate) mod commands;
pub(crate) mod emit;
pub(crate) mod exprs;

use std::collections::HashMap;
use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use stencil_expr::{parse_stmt, Expr, Stmt};

use crate::error::{Category, CompileError};
use crate::ir::{
    CallArgs, EachBind, Instr, Loc, Param, ParamKind, ProcDef, ProcKind, Template,
};
use crate::lexer::{split_lines, LineKind, LineRecord};
use crate::options::Options;
use crate::syntax::Syntax;

use commands::CommandContext;
use emit::Emitter;
use exprs::{is_identifier, map_syntax_error, skip_string, Segment};

/// Compiles template source into an executable [`Template`].
pub(crate) fn compile_source(
    source: &str,
    options: &Options<'_>,
) -> Result<Template, CompileError> {
    let syntax = options.syntax.clone().unwrap_or_default();
    let main_path = options
        .path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut compiler = Compiler {
        lines: split_lines(source, &syntax),
        syntax,
        options,
        emitter: Emitter::new(),
        blocks: Vec::new(),
        procs: HashMap::new(),
        sources: vec![main_path],
        pos: 0,
        source: 0,
        file: options.path.clone(),
        include_stack: Vec::new(),
        in_def: 0,
    };
    if let Some(path) = &compiler.file {
        if let Ok(canonical) = path.canonicalize() {
            compiler.include_stack.push(canonical);
        }
    }

    compiler.parse_until(&[])?;
    Ok(Template {
        program: compiler.emitter.finish(),
        sources: compiler.sources,
    })
}

/// A defined procedure as the compiler tracks it: verbatim name for the
/// runtime binding, call style for directive dispatch.
struct Registered {
    name: String,
    kind: ProcKind,
}

/// One open block on the compiler's stack.
enum Block {
    If {
        arms: Vec<(Expr, Vec<Instr>)>,
        cond: Option<Expr>,
        in_else: bool,
        loc: Loc,
    },
    Each {
        subject: Expr,
        bind: EachBind,
        body: Option<Vec<Instr>>,
        in_else: bool,
        loc: Loc,
    },
    With {
        subject: Expr,
        alias: Option<String>,
        loc: Loc,
    },
    LetCapture {
        name: String,
        loc: Loc,
    },
    Def {
        name: String,
        params: Vec<Param>,
        kind: ProcKind,
        loc: Loc,
    },
    CallBlock {
        name: String,
        call: CallArgs,
        loc: Loc,
    },
}

impl Block {
    fn keyword(&self) -> &'static str {
        match self {
            Block::If { .. } => "if",
            Block::Each { .. } => "each",
            Block::With { .. } => "with",
            Block::LetCapture { .. } => "let",
            Block::Def {
                kind: ProcKind::Def,
                ..
            } => "def",
            Block::Def { .. } => "block",
            Block::CallBlock { .. } => "call",
        }
    }

    fn loc(&self) -> Loc {
        match self {
            Block::If { loc, .. }
            | Block::Each { loc, .. }
            | Block::With { loc, .. }
            | Block::LetCapture { loc, .. }
            | Block::Def { loc, .. }
            | Block::CallBlock { loc, .. } => *loc,
        }
    }
}

pub(crate) struct Compiler<'r, 'o> {
    syntax: Syntax,
    options: &'r Options<'o>,
    pub(crate) emitter: Emitter,
    blocks: Vec<Block>,
    procs: HashMap<String, Registered>,
    sources: Vec<String>,
    lines: Vec<LineRecord>,
    pos: usize,
    source: u32,
    file: Option<PathBuf>,
    include_stack: Vec<PathBuf>,
    in_def: usize,
}

impl Compiler<'_, '_> {
    pub(crate) fn loc(&self, line: u32) -> Loc {
        Loc {
            source: self.source,
            line,
        }
    }

    /// Attaches the current source path to an error that lacks one.
    pub(crate) fn locate(&self, err: CompileError) -> CompileError {
        err.at_path(&self.sources[self.source as usize])
    }

    fn err(&self, category: Category, message: impl Into<String>, line: u32) -> CompileError {
        self.locate(CompileError::new(category, message, line))
    }

    fn err_at(&self, category: Category, message: impl Into<String>, loc: Loc) -> CompileError {
        CompileError::new(category, message, loc.line)
            .at_path(&self.sources[loc.source as usize])
    }

    /// The main loop. Consumes lines until end of input, or until one of
    /// the stopping directive names appears with every block opened since
    /// entry closed again; the stopping directive is consumed and returned.
    pub(crate) fn parse_until(
        &mut self,
        stop: &[&str],
    ) -> Result<Option<String>, CompileError> {
        let base_depth = self.blocks.len();

        while self.pos < self.lines.len() {
            let record = self.lines[self.pos].clone();
            self.pos += 1;
            match &record.kind {
                LineKind::Comment => {}
                LineKind::Content => self.content(&record.raw, record.line, record.newline)?,
                LineKind::Directive { name, arg } => {
                    let lname = name.to_lowercase();
                    if self.blocks.len() == base_depth && stop.contains(&lname.as_str()) {
                        return Ok(Some(lname));
                    }
                    self.directive(&lname, arg, record.line)?;
                }
            }
        }

        if self.blocks.len() > base_depth {
            let block = self.blocks.last().expect("non-empty block stack");
            return Err(self.err_at(
                Category::UnexpectedEof,
                format!("missing 'end' for '{}'", block.keyword()),
                block.loc(),
            ));
        }
        Ok(None)
    }

    // ---------------------------------------------------------------------
    // Content
    // ---------------------------------------------------------------------

    fn content(&mut self, text: &str, line: u32, newline: bool) -> Result<(), CompileError> {
        let text = if self.options.strip {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(());
            }
            trimmed
        } else {
            text
        };

        let segments = exprs::split_segments(text, &self.syntax, line)
            .map_err(|e| self.locate(e))?;
        let loc = self.loc(line);
        for segment in segments {
            match segment {
                Segment::Literal(text) => self.emitter.add(Instr::Text(text)),
                Segment::Expr(value) => {
                    let default_filter = value.filters.is_empty();
                    self.emitter.add(Instr::Output {
                        value,
                        default_filter,
                        loc,
                    });
                }
            }
        }
        if newline && !self.options.strip {
            self.emitter.add(Instr::Text("\n".to_string()));
        }
        Ok(())
    }

    /// Raw text emission for `quote` bodies: no expression scanning.
    fn raw_text(&mut self, text: &str, newline: bool) {
        if self.options.strip {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                self.emitter.add(Instr::Text(trimmed.to_string()));
            }
        } else {
            let mut text = text.to_string();
            if newline {
                text.push('\n');
            }
            self.emitter.add(Instr::Text(text));
        }
    }

    // ---------------------------------------------------------------------
    // Directive dispatch
    // ---------------------------------------------------------------------

    fn directive(&mut self, name: &str, arg: &str, line: u32) -> Result<(), CompileError> {
        match name {
            "if" => self.open_if(arg, line),
            "elif" => self.handle_elif(arg, line),
            "else" => self.handle_else(line),
            "end" => self.close_block(line),
            "each" => self.open_each(arg, line),
            "with" => self.open_with(arg, line),
            "let" => self.handle_let(arg, line),
            "def" => self.open_def(arg, line, ProcKind::Def),
            "block" => self.open_def(arg, line, ProcKind::Block),
            "quote" => self.raw_block(arg.trim(), true, line),
            "comment" => self.raw_block(arg.trim(), false, line),
            "code" => self.handle_code(arg, line),
            "import" => self.handle_import(arg, line),
            "var" => self.handle_var(arg, line),
            "include" => self.handle_include(arg, line),
            "return" => self.handle_return(arg, line),
            _ => self.dispatch_user(name, arg, line),
        }
    }

    fn parse_expr_arg(&self, src: &str, line: u32) -> Result<Expr, CompileError> {
        stencil_expr::parse_expr(src.trim())
            .map_err(|e| self.locate(map_syntax_error(e, line)))
    }

    fn open_if(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let cond = self.parse_expr_arg(arg, line)?;
        self.blocks.push(Block::If {
            arms: Vec::new(),
            cond: Some(cond),
            in_else: false,
            loc: self.loc(line),
        });
        self.emitter.open();
        Ok(())
    }

    fn handle_elif(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        if !matches!(self.blocks.last(), Some(Block::If { in_else: false, .. })) {
            return Err(self.err(Category::Syntax, "'elif' without matching 'if'", line));
        }
        let next = self.parse_expr_arg(arg, line)?;
        let body = self.emitter.close();
        if let Some(Block::If { arms, cond, .. }) = self.blocks.last_mut() {
            let sealed = cond.take().expect("open if arm");
            arms.push((sealed, body));
            *cond = Some(next);
        }
        self.emitter.open();
        Ok(())
    }

    fn handle_else(&mut self, line: u32) -> Result<(), CompileError> {
        match self.blocks.last() {
            Some(Block::If { in_else: false, .. }) => {
                let body = self.emitter.close();
                if let Some(Block::If {
                    arms,
                    cond,
                    in_else,
                    ..
                }) = self.blocks.last_mut()
                {
                    let sealed = cond.take().expect("open if arm");
                    arms.push((sealed, body));
                    *in_else = true;
                }
                self.emitter.open();
                Ok(())
            }
            Some(Block::Each { in_else: false, .. }) => {
                let main = self.emitter.close();
                if let Some(Block::Each { body, in_else, .. }) = self.blocks.last_mut() {
                    *body = Some(main);
                    *in_else = true;
                }
                self.emitter.open();
                Ok(())
            }
            _ => Err(self.err(
                Category::Syntax,
                "'else' without matching 'if' or 'each'",
                line,
            )),
        }
    }

    fn close_block(&mut self, line: u32) -> Result<(), CompileError> {
        let block = match self.blocks.pop() {
            Some(block) => block,
            None => return Err(self.err(Category::Syntax, "unexpected 'end'", line)),
        };
        let body = self.emitter.close();

        match block {
            Block::If {
                mut arms,
                cond,
                in_else,
                loc,
            } => {
                let orelse = if in_else {
                    Some(body)
                } else {
                    arms.push((cond.expect("open if arm"), body));
                    None
                };
                self.emitter.add(Instr::If { arms, orelse, loc });
            }
            Block::Each {
                subject,
                bind,
                body: main,
                in_else,
                loc,
            } => {
                let (main, empty) = if in_else {
                    (main.expect("each body"), Some(body))
                } else {
                    (body, None)
                };
                self.emitter.add(Instr::Each {
                    subject,
                    bind,
                    body: main,
                    empty,
                    loc,
                });
            }
            Block::With {
                subject,
                alias,
                loc,
            } => {
                self.emitter.add(Instr::With {
                    subject,
                    alias,
                    body,
                    loc,
                });
            }
            Block::LetCapture { name, .. } => {
                self.emitter.add(Instr::LetCapture { name, body });
            }
            Block::Def {
                name,
                mut params,
                kind,
                ..
            } => {
                self.in_def -= 1;
                if kind == ProcKind::Block
                    && params.first().map_or(true, |p| p.name != "text")
                {
                    params.insert(
                        0,
                        Param {
                            name: "text".to_string(),
                            kind: ParamKind::Required,
                        },
                    );
                }
                let proc = Arc::new(ProcDef {
                    name,
                    kind,
                    params,
                    body,
                });
                self.emitter.add(Instr::Define { proc });
            }
            Block::CallBlock { name, call, loc } => {
                self.emitter.add(Instr::Call {
                    name,
                    args: call,
                    body: Some(body),
                    loc,
                });
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // each / with
    // ---------------------------------------------------------------------

    fn open_each(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let (subject, bind) = self.parse_each_arg(arg, line)?;
        self.blocks.push(Block::Each {
            subject,
            bind,
            body: None,
            in_else: false,
            loc: self.loc(line),
        });
        self.emitter.open();
        Ok(())
    }

    fn parse_each_arg(&self, arg: &str, line: u32) -> Result<(Expr, EachBind), CompileError> {
        let as_pos = find_word(arg, "as");
        let index_pos = find_word(arg, "index");
        let subject_end = [as_pos, index_pos]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(arg.len());
        let subject = self.parse_expr_arg(&arg[..subject_end], line)?;

        let mut bind = EachBind::default();
        if let Some(pos) = as_pos {
            let vars_end = index_pos.filter(|i| *i > pos).unwrap_or(arg.len());
            let names = self.ident_list(&arg[pos + 2..vars_end], line)?;
            match names.len() {
                1 => bind.var = Some(names.into_iter().next().expect("one name")),
                2 => {
                    let mut names = names.into_iter();
                    bind.var = names.next();
                    bind.var2 = names.next();
                }
                _ => {
                    return Err(self.err(
                        Category::Syntax,
                        "'as' takes one or two variables",
                        line,
                    ))
                }
            }
        }
        if let Some(pos) = index_pos {
            let names = self.ident_list(&arg[pos + 5..], line)?;
            match names.len() {
                1 => bind.index = Some(names.into_iter().next().expect("one name")),
                2 => {
                    let mut names = names.into_iter();
                    bind.index = names.next();
                    bind.total = names.next();
                }
                _ => {
                    return Err(self.err(
                        Category::Syntax,
                        "'index' takes one or two variables",
                        line,
                    ))
                }
            }
        }
        Ok((subject, bind))
    }

    fn ident_list(&self, src: &str, line: u32) -> Result<Vec<String>, CompileError> {
        let mut names = Vec::new();
        for piece in src.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if !is_identifier(piece) {
                return Err(self.err(
                    Category::InvalidIdentifier,
                    format!("'{piece}' is not a valid name"),
                    line,
                ));
            }
            names.push(piece.to_string());
        }
        if names.is_empty() {
            return Err(self.err(Category::InvalidIdentifier, "missing variable name", line));
        }
        Ok(names)
    }

    fn open_with(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let (subject_src, alias) = match find_word(arg, "as") {
            Some(pos) => {
                let names = self.ident_list(&arg[pos + 2..], line)?;
                if names.len() != 1 {
                    return Err(self.err(
                        Category::Syntax,
                        "'with ... as' takes one variable",
                        line,
                    ));
                }
                (&arg[..pos], names.into_iter().next())
            }
            None => (arg, None),
        };
        let subject = self.parse_expr_arg(subject_src, line)?;
        self.blocks.push(Block::With {
            subject,
            alias,
            loc: self.loc(line),
        });
        self.emitter.open();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // let / var / import / code / return
    // ---------------------------------------------------------------------

    fn handle_let(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let arg = arg.trim();
        let mut targets = Vec::new();
        let mut rest = arg;
        loop {
            let (name, after) = split_leading_ident(rest);
            if !is_identifier(name) {
                return Err(self.err(
                    Category::InvalidIdentifier,
                    format!("'{}' is not a valid name", first_token(rest)),
                    line,
                ));
            }
            targets.push(name.to_string());
            rest = after.trim_start();
            if let Some(after_comma) = rest.strip_prefix(',') {
                rest = after_comma.trim_start();
                continue;
            }
            break;
        }
        if let Some(after_eq) = rest.strip_prefix('=') {
            rest = after_eq.trim_start();
        }

        if rest.is_empty() {
            if targets.len() != 1 {
                return Err(self.err(
                    Category::Syntax,
                    "block-form 'let' takes a single variable",
                    line,
                ));
            }
            self.blocks.push(Block::LetCapture {
                name: targets.into_iter().next().expect("one target"),
                loc: self.loc(line),
            });
            self.emitter.open();
            return Ok(());
        }

        let value = self.parse_expr_arg(rest, line)?;
        self.emitter.add(Instr::Let {
            targets,
            value,
            loc: self.loc(line),
        });
        Ok(())
    }

    fn handle_var(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let names = self.ident_list(arg, line)?;
        self.emitter.add(Instr::Declare { names });
        Ok(())
    }

    fn handle_import(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let mut names = Vec::new();
        for piece in arg.split(',') {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            if !piece.split('.').all(is_identifier) {
                return Err(self.err(
                    Category::InvalidIdentifier,
                    format!("'{piece}' is not a valid module name"),
                    line,
                ));
            }
            names.push(piece.to_string());
        }
        if names.is_empty() {
            return Err(self.err(Category::InvalidIdentifier, "missing module name", line));
        }
        self.emitter.add(Instr::Import {
            names,
            loc: self.loc(line),
        });
        Ok(())
    }

    fn handle_code(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let arg = arg.trim();
        let stmts = if arg.is_empty() {
            self.code_block(line)?
        } else {
            let stmt = parse_stmt(arg).map_err(|e| self.locate(map_syntax_error(e, line)))?;
            vec![(stmt, self.loc(line))]
        };
        self.emitter.add(Instr::Code { stmts });
        Ok(())
    }

    /// Scans the raw lines of a `code` block up to its `end`. No template
    /// processing applies inside.
    fn code_block(&mut self, opener_line: u32) -> Result<Vec<(Stmt, Loc)>, CompileError> {
        let mut stmts = Vec::new();
        loop {
            if self.pos >= self.lines.len() {
                return Err(self.err_at(
                    Category::UnexpectedEof,
                    "missing 'end' for 'code'",
                    self.loc(opener_line),
                ));
            }
            let record = self.lines[self.pos].clone();
            self.pos += 1;
            if let LineKind::Directive { name, .. } = &record.kind {
                if name.eq_ignore_ascii_case("end") {
                    return Ok(stmts);
                }
            }
            let text = record.raw.trim();
            if text.is_empty() {
                continue;
            }
            let stmt = parse_stmt(text)
                .map_err(|e| self.locate(map_syntax_error(e, record.line)))?;
            stmts.push((stmt, self.loc(record.line)));
        }
    }

    fn handle_return(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        if self.in_def == 0 {
            return Err(self.err(
                Category::Syntax,
                "'return' outside of a procedure body",
                line,
            ));
        }
        let arg = arg.trim();
        let value = if arg.is_empty() {
            None
        } else {
            Some(self.parse_expr_arg(arg, line)?)
        };
        self.emitter.add(Instr::Return {
            value,
            loc: self.loc(line),
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // def / block and call dispatch
    // ---------------------------------------------------------------------

    fn open_def(&mut self, arg: &str, line: u32, kind: ProcKind) -> Result<(), CompileError> {
        let (name, params) = args::parse_signature(arg, line).map_err(|e| self.locate(e))?;
        // Registered at open so the body can call itself as a directive.
        self.procs.insert(
            name.to_lowercase(),
            Registered {
                name: name.clone(),
                kind,
            },
        );
        self.blocks.push(Block::Def {
            name,
            params,
            kind,
            loc: self.loc(line),
        });
        self.in_def += 1;
        self.emitter.open();
        Ok(())
    }

    fn dispatch_user(&mut self, name: &str, arg: &str, line: u32) -> Result<(), CompileError> {
        if let Some(registered) = self.procs.get(name) {
            let verbatim = registered.name.clone();
            let kind = registered.kind;
            let call = args::parse_call_args(arg, line).map_err(|e| self.locate(e))?;
            match kind {
                ProcKind::Def => {
                    self.emitter.add(Instr::Call {
                        name: verbatim,
                        args: call,
                        body: None,
                        loc: self.loc(line),
                    });
                }
                ProcKind::Block => {
                    self.blocks.push(Block::CallBlock {
                        name: verbatim,
                        call,
                        loc: self.loc(line),
                    });
                    self.emitter.open();
                }
            }
            return Ok(());
        }

        if let Some(commands) = self.options.commands {
            if commands.contains(name) {
                let mut cc = CommandContext {
                    arg: arg.to_string(),
                    line,
                    compiler: self,
                };
                return commands.compile(name, &mut cc);
            }
        }

        Err(self.err(
            Category::UnknownCommand,
            format!("command '{name}' not recognized"),
            line,
        ))
    }

    // ---------------------------------------------------------------------
    // quote / comment
    // ---------------------------------------------------------------------

    /// Captures raw lines up to the matching `end`. A labelled block is
    /// only closed by `end <label>`; everything else — directive-looking
    /// lines included — is verbatim content (`quote`) or discarded
    /// (`comment`).
    fn raw_block(&mut self, label: &str, keep: bool, opener_line: u32) -> Result<(), CompileError> {
        loop {
            if self.pos >= self.lines.len() {
                return Err(self.err_at(
                    Category::UnexpectedEof,
                    format!("missing 'end' for '{}'", if keep { "quote" } else { "comment" }),
                    self.loc(opener_line),
                ));
            }
            let record = self.lines[self.pos].clone();
            self.pos += 1;
            if let LineKind::Directive { name, arg } = &record.kind {
                if name.eq_ignore_ascii_case("end")
                    && (label.is_empty() || arg.trim() == label)
                {
                    return Ok(());
                }
            }
            if keep {
                self.raw_text(&record.raw, record.newline);
            }
        }
    }

    // ---------------------------------------------------------------------
    // include
    // ---------------------------------------------------------------------

    /// Resolves, reads and parses an included file, splicing its compiled
    /// instructions in place. Instructions keep the included file's source
    /// index, so runtime errors report that file's own line numbers.
    fn handle_include(&mut self, arg: &str, line: u32) -> Result<(), CompileError> {
        let request = arg.trim();
        if request.is_empty() {
            return Err(self.err(Category::FileNotFound, "missing include path", line));
        }

        let resolved = match &self.options.finder {
            Some(finder) => finder(self.file.as_deref(), request),
            None => {
                let base = self
                    .file
                    .as_ref()
                    .and_then(|p| p.parent())
                    .map(|d| d.to_path_buf())
                    .unwrap_or_else(|| PathBuf::from("."));
                Some(base.join(request))
            }
        };
        let resolved = match resolved {
            Some(path) => path,
            None => {
                return Err(self.err(
                    Category::FileNotFound,
                    format!("cannot resolve '{request}'"),
                    line,
                ))
            }
        };
        let canonical = resolved.canonicalize().map_err(|_| {
            self.err(
                Category::FileNotFound,
                format!("cannot find '{request}'"),
                line,
            )
        })?;
        if self.include_stack.contains(&canonical) {
            return Err(self.err(
                Category::FileNotFound,
                format!("circular include of '{request}'"),
                line,
            ));
        }
        let text = std::fs::read_to_string(&canonical).map_err(|_| {
            self.err(
                Category::FileNotFound,
                format!("cannot read '{request}'"),
                line,
            )
        })?;

        let saved_lines = mem::replace(&mut self.lines, split_lines(&text, &self.syntax));
        let saved_pos = mem::replace(&mut self.pos, 0);
        let saved_source = self.source;
        let saved_file = self.file.clone();

        self.source = self.sources.len() as u32;
        self.sources.push(resolved.display().to_string());
        self.file = Some(resolved);
        self.include_stack.push(canonical);

        let result = self.parse_until(&[]);

        self.include_stack.pop();
        self.lines = saved_lines;
        self.pos = saved_pos;
        self.source = saved_source;
        self.file = saved_file;

        result.map(|_| ())
    }
}

/// Finds a whitespace-delimited keyword at the top nesting level (outside
/// strings, parens, brackets and braces).
fn find_word(s: &str, word: &str) -> Option<usize> {
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
            _ if depth == 0 && s.is_char_boundary(i) && s[i..].starts_with(word) => {
                let before_ok = i == 0 || bytes[i - 1].is_ascii_whitespace();
                let after = i + word.len();
                let after_ok = after >= bytes.len() || bytes[after].is_ascii_whitespace();
                if before_ok && after_ok {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Splits off a leading identifier (possibly empty).
fn split_leading_ident(s: &str) -> (&str, &str) {
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn first_token(s: &str) -> &str {
    s.split_whitespace().next().unwrap_or(s)
}
