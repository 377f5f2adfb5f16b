//! Runtime support: the interpreter that executes compiled templates.
//!
//! All per-render state lives here — the scope chain, the output buffer
//! stack, the procedure table, the current source location — which is what
//! makes a compiled [`Template`](crate::Template) safe to render
//! concurrently: every render call builds a fresh interpreter.
//!
//! Error dispatch implements the three policies: strict (default) aborts
//! on the first runtime error; recovery substitutes empty output per
//! failing expression and hands the error to the caller's hook; silent
//! does the same without ever raising, warning through an optional hook.

pub(crate) mod filters;
pub(crate) mod scope;

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use stencil_expr::{
    Env, EvalError, EvalErrorKind, Expr, FuncSlot, FuncValue, Map, Value,
};

use crate::error::{RuntimeError, RuntimeErrorKind};
use crate::ir::{
    CallArgs, EachBind, Instr, Loc, OutExpr, ParamKind, ProcDef, Program, Template,
};
use crate::options::Options;

use scope::Scopes;

/// Calls deeper than this raise a type error instead of exhausting the
/// native stack.
const MAX_CALL_DEPTH: usize = 64;

/// Control flow out of a program: fall-through or an explicit `return`.
pub(crate) enum Flow {
    Normal,
    Return(Option<Value>),
}

impl Flow {
    fn is_return(&self) -> bool {
        matches!(self, Flow::Return(_))
    }
}

/// Executes a compiled template against a prepared global frame.
pub(crate) fn render_template(
    template: &Template,
    globals: HashMap<String, Value>,
    opts: &mut Options<'_>,
) -> Result<String, RuntimeError> {
    let mut interp = Interp {
        scopes: Scopes::new(globals),
        buffers: vec![String::new()],
        procs: Vec::new(),
        sources: &template.sources,
        opts,
        loc: Loc { source: 0, line: 1 },
        depth: 0,
        pending: None,
    };
    interp.exec(&template.program)?;
    Ok(interp.buffers.concat())
}

struct Interp<'r, 'o> {
    scopes: Scopes,
    /// Output buffer stack; index 0 is the render result, the top is the
    /// current capture target.
    buffers: Vec<String>,
    /// Procedures defined so far this render; function values index here.
    procs: Vec<Arc<ProcDef>>,
    sources: &'r [String],
    opts: &'r mut Options<'o>,
    /// Location of the instruction being executed, for error attribution.
    loc: Loc,
    depth: usize,
    /// An already-attributed error travelling up through the evaluator
    /// (raised inside a procedure body); preserved so the original line
    /// wins over the call site's.
    pending: Option<RuntimeError>,
}

impl Interp<'_, '_> {
    fn write(&mut self, text: &str) {
        self.buffers
            .last_mut()
            .expect("buffer stack is never empty")
            .push_str(text);
    }

    fn error(&self, kind: RuntimeErrorKind, message: impl Into<String>) -> RuntimeError {
        RuntimeError {
            kind,
            message: message.into(),
            path: self.sources[self.loc.source as usize].clone(),
            line: self.loc.line,
        }
    }

    /// Wraps an evaluator error with the current location — unless an
    /// attributed error is already in flight, which then wins.
    fn wrap(&mut self, err: EvalError) -> RuntimeError {
        if let Some(pending) = self.pending.take() {
            return pending;
        }
        self.error(err.kind.into(), err.message)
    }

    /// Error dispatch: strict propagates, recovery and silent swallow
    /// after informing the respective hook.
    fn report(&mut self, err: RuntimeError) -> Result<(), RuntimeError> {
        if self.opts.silent {
            if let Some(hook) = &mut self.opts.on_warn {
                hook(&err);
            }
            Ok(())
        } else if let Some(hook) = &mut self.opts.on_error {
            hook(&err);
            Ok(())
        } else {
            Err(err)
        }
    }

    fn exec(&mut self, program: &Program) -> Result<Flow, RuntimeError> {
        for instr in program {
            match instr {
                Instr::Text(text) => self.write(text),
                Instr::Output {
                    value,
                    default_filter,
                    loc,
                } => {
                    self.loc = *loc;
                    match self.eval_out(value, *default_filter) {
                        Ok(value) => {
                            let text = value.to_string();
                            self.write(&text);
                        }
                        Err(err) => self.report(err)?,
                    }
                }
                Instr::Let {
                    targets,
                    value,
                    loc,
                } => {
                    self.loc = *loc;
                    self.exec_let(targets, value)?;
                }
                Instr::LetCapture { name, body } => {
                    self.buffers.push(String::new());
                    let flow = self.exec(body);
                    let captured = self.buffers.pop().expect("capture buffer");
                    let flow = flow?;
                    self.scopes.set(name, Value::str(captured));
                    if flow.is_return() {
                        return Ok(flow);
                    }
                }
                Instr::Declare { names } => {
                    for name in names {
                        if self.scopes.get(name).is_none() {
                            self.scopes.set(name, Value::Null);
                        }
                    }
                }
                Instr::Import { names, loc } => {
                    self.loc = *loc;
                    self.exec_import(names)?;
                }
                Instr::Code { stmts } => {
                    for (stmt, loc) in stmts {
                        self.loc = *loc;
                        if let Err(e) = stencil_expr::exec_stmt(stmt, self) {
                            let err = self.wrap(e);
                            self.report(err)?;
                        }
                    }
                }
                Instr::If { arms, orelse, loc } => {
                    self.loc = *loc;
                    let mut taken = false;
                    for (cond, body) in arms {
                        let truthy = match stencil_expr::eval(cond, self) {
                            Ok(value) => value.truthy(),
                            Err(e) => {
                                let err = self.wrap(e);
                                self.report(err)?;
                                false
                            }
                        };
                        if truthy {
                            let flow = self.exec(body)?;
                            if flow.is_return() {
                                return Ok(flow);
                            }
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(body) = orelse {
                            let flow = self.exec(body)?;
                            if flow.is_return() {
                                return Ok(flow);
                            }
                        }
                    }
                }
                Instr::Each {
                    subject,
                    bind,
                    body,
                    empty,
                    loc,
                } => {
                    self.loc = *loc;
                    let flow = self.exec_each(subject, bind, body, empty.as_ref())?;
                    if flow.is_return() {
                        return Ok(flow);
                    }
                }
                Instr::With {
                    subject,
                    alias,
                    body,
                    loc,
                } => {
                    self.loc = *loc;
                    let flow = self.exec_with(subject, alias.as_deref(), body)?;
                    if flow.is_return() {
                        return Ok(flow);
                    }
                }
                Instr::Define { proc } => {
                    let idx = self.procs.len();
                    self.procs.push(proc.clone());
                    self.scopes.set(
                        &proc.name,
                        Value::Func(FuncValue {
                            name: proc.name.clone(),
                            slot: FuncSlot::User(idx),
                        }),
                    );
                }
                Instr::Call {
                    name,
                    args,
                    body,
                    loc,
                } => {
                    self.loc = *loc;
                    let flow = self.exec_call(name, args, body.as_ref())?;
                    if flow.is_return() {
                        return Ok(flow);
                    }
                }
                Instr::Return { value, loc } => {
                    self.loc = *loc;
                    let value = match value {
                        Some(expr) => match stencil_expr::eval(expr, self) {
                            Ok(value) => Some(value),
                            Err(e) => {
                                let err = self.wrap(e);
                                self.report(err)?;
                                None
                            }
                        },
                        None => None,
                    };
                    return Ok(Flow::Return(value));
                }
                Instr::PushBuf => self.buffers.push(String::new()),
                Instr::PopBufLet { name } => {
                    if self.buffers.len() > 1 {
                        let text = self.buffers.pop().expect("capture buffer");
                        self.scopes.set(name, Value::str(text));
                    }
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn eval_out(&mut self, out: &OutExpr, default_filter: bool) -> Result<Value, RuntimeError> {
        let mut value = match stencil_expr::eval(&out.expr, self) {
            Ok(value) => value,
            Err(e) => return Err(self.wrap(e)),
        };
        for filter in &out.filters {
            value = self.apply_filter(&filter.name, &filter.args, value)?;
        }
        if default_filter && out.filters.is_empty() {
            if let Some(name) = self.opts.filter.clone() {
                value = self.apply_filter(&name, &[], value)?;
            }
        }
        Ok(value)
    }

    /// Filter resolution: the scope chain first (a defined procedure or
    /// any callable binding wins), then the caller registry, then the
    /// built-in table.
    fn apply_filter(
        &mut self,
        name: &str,
        arg_exprs: &[Expr],
        value: Value,
    ) -> Result<Value, RuntimeError> {
        let mut args = Vec::with_capacity(arg_exprs.len());
        for expr in arg_exprs {
            match stencil_expr::eval(expr, self) {
                Ok(value) => args.push(value),
                Err(e) => return Err(self.wrap(e)),
            }
        }

        if let Some(target) = self.scopes.get(name) {
            return match target {
                Value::Func(func) => {
                    let mut call_args = vec![value];
                    call_args.extend(args);
                    match Env::call(self, &func, call_args, Vec::new()) {
                        Ok(value) => Ok(value),
                        Err(e) => Err(self.wrap(e)),
                    }
                }
                _ => Err(self.error(
                    RuntimeErrorKind::Type,
                    format!("'{name}' is not callable"),
                )),
            };
        }

        if self.opts.filters.contains_key(name) {
            let result = {
                let filter = self.opts.filters.get(name).expect("checked above");
                filter(&value, &args)
            };
            return result.map_err(|message| self.error(RuntimeErrorKind::Value, message));
        }

        if let Some(filter) = filters::builtin(name) {
            return match filter(&value, &args) {
                Ok(value) => Ok(value),
                Err(e) => Err(self.wrap(e)),
            };
        }

        Err(self.error(
            RuntimeErrorKind::Undefined,
            format!("filter '{name}' is not defined"),
        ))
    }

    fn exec_let(&mut self, targets: &[String], value: &Expr) -> Result<(), RuntimeError> {
        let value = match stencil_expr::eval(value, self) {
            Ok(value) => value,
            Err(e) => {
                let err = self.wrap(e);
                return self.report(err);
            }
        };
        if targets.len() == 1 {
            self.scopes.set(&targets[0], value);
            return Ok(());
        }
        let items: Vec<Value> = match &value {
            Value::List(items) => items.clone(),
            Value::Str(s) => s.chars().map(|c| Value::str(c.to_string())).collect(),
            other => {
                let err = self.error(
                    RuntimeErrorKind::Type,
                    format!("cannot unpack {} value", other.type_name()),
                );
                return self.report(err);
            }
        };
        if items.len() != targets.len() {
            let err = self.error(
                RuntimeErrorKind::Type,
                format!(
                    "cannot unpack {} values into {} names",
                    items.len(),
                    targets.len()
                ),
            );
            return self.report(err);
        }
        for (target, item) in targets.iter().zip(items) {
            self.scopes.set(target, item);
        }
        Ok(())
    }

    fn exec_import(&mut self, names: &[String]) -> Result<(), RuntimeError> {
        for name in names {
            let root = name.split('.').next().expect("validated at compile time");
            let value = self
                .opts
                .modules
                .get(name)
                .or_else(|| self.opts.modules.get(root))
                .cloned();
            match value {
                Some(value) => self.scopes.set(root, value),
                None => {
                    let err = self.error(
                        RuntimeErrorKind::Lookup,
                        format!("module '{name}' is not registered"),
                    );
                    self.report(err)?;
                }
            }
        }
        Ok(())
    }

    fn exec_each(
        &mut self,
        subject: &Expr,
        bind: &EachBind,
        body: &Program,
        empty: Option<&Program>,
    ) -> Result<Flow, RuntimeError> {
        let source = match stencil_expr::eval(subject, self) {
            Ok(value) => value,
            Err(e) => {
                let err = self.wrap(e);
                self.report(err)?;
                return Ok(Flow::Normal);
            }
        };

        // (key, value, single-variable view) per element.
        let items: Vec<(Value, Value, Value)> = match &source {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i as i64), v.clone(), v.clone()))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (Value::str(k), v.clone(), Value::str(k)))
                .collect(),
            Value::Str(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| {
                    let ch = Value::str(c.to_string());
                    (Value::Int(i as i64), ch.clone(), ch)
                })
                .collect(),
            other => {
                let err = self.error(
                    RuntimeErrorKind::Type,
                    format!("{} value is not iterable", other.type_name()),
                );
                self.report(err)?;
                return Ok(Flow::Normal);
            }
        };

        if items.is_empty() {
            if let Some(program) = empty {
                return self.exec(program);
            }
            return Ok(Flow::Normal);
        }

        let total = items.len() as i64;
        for (i, (key, value, single)) in items.into_iter().enumerate() {
            match (&bind.var, &bind.var2) {
                (Some(var), Some(var2)) => {
                    self.scopes.set(var, key);
                    self.scopes.set(var2, value);
                }
                (Some(var), None) => self.scopes.set(var, single),
                _ => {}
            }
            if let Some(index) = &bind.index {
                self.scopes.set(index, Value::Int(i as i64 + 1));
            }
            if let Some(total_var) = &bind.total {
                self.scopes.set(total_var, Value::Int(total));
            }
            let flow = self.exec(body)?;
            if flow.is_return() {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// `with` evaluates its subject quietly: failure means empty, and
    /// neither raises nor reaches the error hook.
    fn exec_with(
        &mut self,
        subject: &Expr,
        alias: Option<&str>,
        body: &Program,
    ) -> Result<Flow, RuntimeError> {
        let value = match stencil_expr::eval(subject, self) {
            Ok(value) => value,
            Err(_) => {
                self.pending = None;
                return Ok(Flow::Normal);
            }
        };
        if value.is_vacant() {
            return Ok(Flow::Normal);
        }
        match alias {
            Some(name) => {
                let saved = self.scopes.local_get(name);
                self.scopes.set(name, value);
                let flow = self.exec(body);
                match saved {
                    Some(old) => self.scopes.set(name, old),
                    None => self.scopes.local_remove(name),
                }
                flow
            }
            None => self.exec(body),
        }
    }

    /// Directive- and block-form procedure calls.
    fn exec_call(
        &mut self,
        name: &str,
        call: &CallArgs,
        body: Option<&Program>,
    ) -> Result<Flow, RuntimeError> {
        let captured = match body {
            Some(program) => {
                self.buffers.push(String::new());
                let flow = self.exec(program);
                let text = self.buffers.pop().expect("capture buffer");
                if let Flow::Return(value) = flow? {
                    return Ok(Flow::Return(value));
                }
                Some(text)
            }
            None => None,
        };

        let mut args = Vec::new();
        if let Some(text) = captured {
            args.push(Value::str(text));
        }
        for expr in &call.args {
            match stencil_expr::eval(expr, self) {
                Ok(value) => args.push(value),
                Err(e) => {
                    let err = self.wrap(e);
                    self.report(err)?;
                    return Ok(Flow::Normal);
                }
            }
        }
        let mut kwargs = Vec::new();
        for (key, expr) in &call.kwargs {
            match stencil_expr::eval(expr, self) {
                Ok(value) => kwargs.push((key.clone(), value)),
                Err(e) => {
                    let err = self.wrap(e);
                    self.report(err)?;
                    return Ok(Flow::Normal);
                }
            }
        }

        let target = match self.scopes.get(name) {
            Some(value) => value,
            None => {
                let err = self.error(
                    RuntimeErrorKind::Undefined,
                    format!("'{name}' is not defined"),
                );
                self.report(err)?;
                return Ok(Flow::Normal);
            }
        };
        let result = match target {
            Value::Func(func) => match Env::call(self, &func, args, kwargs) {
                Ok(value) => value,
                Err(e) => {
                    let err = self.wrap(e);
                    self.report(err)?;
                    return Ok(Flow::Normal);
                }
            },
            other => {
                let err = self.error(
                    RuntimeErrorKind::Type,
                    format!("'{name}' is {}, not callable", other.type_name()),
                );
                self.report(err)?;
                return Ok(Flow::Normal);
            }
        };

        if !matches!(result, Value::Null) {
            let text = result.to_string();
            self.write(&text);
        }
        Ok(Flow::Normal)
    }

    /// Invokes a template procedure: fresh frame on the call-site chain,
    /// arguments bound, body output captured. An explicit `return`
    /// discards the capture; `return expr` is the call's value.
    fn invoke(
        &mut self,
        def: Arc<ProcDef>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EvalError::typ("maximum call depth exceeded"));
        }
        self.depth += 1;
        self.scopes.push_frame();

        if let Err(e) = self.bind_params(&def, args, kwargs) {
            self.scopes.pop_frame();
            self.depth -= 1;
            return Err(e);
        }

        self.buffers.push(String::new());
        let saved_loc = self.loc;
        let flow = self.exec(&def.body);
        let captured = self.buffers.pop().expect("capture buffer");
        self.scopes.pop_frame();
        self.depth -= 1;

        match flow {
            Err(err) => {
                let kind = eval_kind(err.kind);
                let message = err.message.clone();
                self.pending = Some(err);
                Err(EvalError::new(kind, message))
            }
            Ok(Flow::Return(Some(value))) => {
                self.loc = saved_loc;
                Ok(value)
            }
            Ok(Flow::Return(None)) => {
                self.loc = saved_loc;
                Ok(Value::Null)
            }
            Ok(Flow::Normal) => {
                self.loc = saved_loc;
                Ok(Value::str(captured))
            }
        }
    }

    fn bind_params(
        &mut self,
        def: &ProcDef,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<(), EvalError> {
        let mut args = VecDeque::from(args);
        let mut kwargs = kwargs;
        let mut rest: Option<&str> = None;
        let mut kwrest: Option<&str> = None;

        for param in &def.params {
            match &param.kind {
                ParamKind::Rest => rest = Some(&param.name),
                ParamKind::KwRest => kwrest = Some(&param.name),
                ParamKind::Required | ParamKind::Default(_) => {
                    if let Some(value) = args.pop_front() {
                        if kwargs.iter().any(|(k, _)| *k == param.name) {
                            return Err(EvalError::typ(format!(
                                "{}() got multiple values for '{}'",
                                def.name, param.name
                            )));
                        }
                        self.scopes.set(&param.name, value);
                    } else if let Some(pos) =
                        kwargs.iter().position(|(k, _)| *k == param.name)
                    {
                        let (_, value) = kwargs.remove(pos);
                        self.scopes.set(&param.name, value);
                    } else if let ParamKind::Default(expr) = &param.kind {
                        let value = stencil_expr::eval(expr, self)?;
                        self.scopes.set(&param.name, value);
                    } else {
                        return Err(EvalError::typ(format!(
                            "{}() missing argument '{}'",
                            def.name, param.name
                        )));
                    }
                }
            }
        }

        if let Some(name) = rest {
            self.scopes
                .set(name, Value::List(args.drain(..).collect()));
        } else if !args.is_empty() {
            return Err(EvalError::typ(format!(
                "{}() takes {} arguments",
                def.name,
                def.params.len()
            )));
        }

        if let Some(name) = kwrest {
            let map: Map = kwargs.drain(..).collect();
            self.scopes.set(name, Value::Map(map));
        } else if let Some((key, _)) = kwargs.first() {
            return Err(EvalError::typ(format!(
                "{}() got an unexpected keyword argument '{key}'",
                def.name
            )));
        }
        Ok(())
    }
}

impl Env for Interp<'_, '_> {
    fn lookup(&mut self, name: &str) -> Option<Value> {
        self.scopes.get(name)
    }

    fn assign(&mut self, name: &str, value: Value) {
        self.scopes.set(name, value);
    }

    fn call(
        &mut self,
        func: &FuncValue,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        match func.slot {
            FuncSlot::Builtin => {
                if func.name == "print" {
                    let text = args
                        .iter()
                        .map(|v| v.to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    self.write(&text);
                    return Ok(Value::Null);
                }
                stencil_expr::call_builtin(&func.name, &args).unwrap_or_else(|| {
                    Err(EvalError::typ(format!("cannot call '{}'", func.name)))
                })
            }
            FuncSlot::User(idx) => {
                let def = self.procs.get(idx).cloned().ok_or_else(|| {
                    EvalError::typ(format!("'{}' is no longer defined", func.name))
                })?;
                self.invoke(def, args, kwargs)
            }
        }
    }
}

fn eval_kind(kind: RuntimeErrorKind) -> EvalErrorKind {
    match kind {
        RuntimeErrorKind::Undefined => EvalErrorKind::Undefined,
        RuntimeErrorKind::Lookup => EvalErrorKind::Lookup,
        RuntimeErrorKind::Type => EvalErrorKind::Type,
        RuntimeErrorKind::DivideByZero => EvalErrorKind::DivideByZero,
        RuntimeErrorKind::Value => EvalErrorKind::Value,
    }
}
