//! Tree-walking evaluator.
//!
//! The evaluator owns operator and lookup semantics; everything tied to a
//! render invocation — name resolution against the scope chain, calling
//! template procedures, `print` routing into the output buffer — is reached
//! through the [`Env`] trait the engine implements.

use crate::ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
use crate::error::EvalError;
use crate::value::{coerce_float, coerce_int, FuncSlot, FuncValue, Map, Value};

/// The evaluator's view of the invoking interpreter.
pub trait Env {
    /// Resolves a bare name. `None` means unbound (the evaluator then tries
    /// the built-in table before raising an undefined-name error).
    fn lookup(&mut self, name: &str) -> Option<Value>;

    /// Binds a name in the innermost scope (used by `code` statements and
    /// comprehension-free assignment contexts).
    fn assign(&mut self, name: &str, value: Value);

    /// Calls a function value. Built-in slots with pure semantics may be
    /// delegated back to [`call_builtin`].
    fn call(
        &mut self,
        func: &FuncValue,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError>;
}

/// Evaluates an expression against an environment.
pub fn eval(expr: &Expr, env: &mut dyn Env) -> Result<Value, EvalError> {
    Evaluator {
        env,
        locals: Vec::new(),
    }
    .eval(expr)
}

/// Executes one `code` statement.
pub fn exec_stmt(stmt: &Stmt, env: &mut dyn Env) -> Result<(), EvalError> {
    match stmt {
        Stmt::Assign { target, value } => {
            let value = eval(value, env)?;
            env.assign(target, value);
            Ok(())
        }
        Stmt::Expr(expr) => {
            eval(expr, env)?;
            Ok(())
        }
    }
}

struct Evaluator<'a> {
    env: &'a mut dyn Env,
    /// Comprehension variables shadow the environment without touching it.
    locals: Vec<(String, Value)>,
}

impl Evaluator<'_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Name(name) => self.lookup_name(name),
            Expr::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.eval(item)?);
                }
                Ok(Value::List(out))
            }
            Expr::MapLit(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let key = match self.eval(key)? {
                        Value::Str(s) => s,
                        other => other.to_string(),
                    };
                    map.insert(key, self.eval(value)?);
                }
                Ok(Value::Map(map))
            }
            Expr::Attr { base, name } => {
                let base = self.eval(base)?;
                safe_lookup(&base, name)
            }
            Expr::Index { base, index } => {
                let base = self.eval(base)?;
                let index = self.eval(index)?;
                index_value(&base, &index)
            }
            Expr::Slice { base, start, end } => {
                let base = self.eval(base)?;
                let start = match start {
                    Some(expr) => Some(coerce_int(&self.eval(expr)?)?),
                    None => None,
                };
                let end = match end {
                    Some(expr) => Some(coerce_int(&self.eval(expr)?)?),
                    None => None,
                };
                slice_value(&base, start, end)
            }
            Expr::Call {
                callee,
                args,
                kwargs,
            } => self.eval_call(callee, args, kwargs),
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.truthy())),
                    UnaryOp::Neg => match operand {
                        Value::Int(n) => Ok(Value::Int(-n)),
                        Value::Float(x) => Ok(Value::Float(-x)),
                        other => Err(EvalError::typ(format!(
                            "cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
            Expr::Compare { first, rest } => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::BoolChain { op, items } => {
                let mut last = Value::Null;
                for item in items {
                    last = self.eval(item)?;
                    let decided = match op {
                        BoolOp::And => !last.truthy(),
                        BoolOp::Or => last.truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(last)
            }
            Expr::Cond {
                then,
                cond,
                otherwise,
            } => {
                if self.eval(cond)?.truthy() {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::Comprehension {
                item,
                var,
                iter,
                cond,
            } => {
                let source = self.eval(iter)?;
                let items = iter_values(&source)?;
                let mut out = Vec::new();
                for value in items {
                    self.locals.push((var.clone(), value));
                    let keep = match cond {
                        Some(cond) => self.eval(cond)?.truthy(),
                        None => true,
                    };
                    let result = if keep { Some(self.eval(item)?) } else { None };
                    self.locals.pop();
                    if let Some(value) = result {
                        out.push(value);
                    }
                }
                Ok(Value::List(out))
            }
        }
    }

    fn lookup_name(&mut self, name: &str) -> Result<Value, EvalError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.env.lookup(name) {
            return Ok(value);
        }
        if let Some(func) = lookup_builtin(name) {
            return Ok(Value::Func(func));
        }
        Err(EvalError::undefined(name))
    }

    fn eval_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        kwargs: &[(String, Expr)],
    ) -> Result<Value, EvalError> {
        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.eval(arg)?);
        }
        let mut kwarg_values = Vec::with_capacity(kwargs.len());
        for (name, expr) in kwargs {
            kwarg_values.push((name.clone(), self.eval(expr)?));
        }

        // Method-call form: try attribute resolution first so a map entry
        // holding a callable wins, then fall back to built-in methods of
        // the receiver type.
        if let Expr::Attr { base, name } = callee {
            let receiver = self.eval(base)?;
            match safe_lookup(&receiver, name) {
                Ok(value) => return self.call_value(&value, arg_values, kwarg_values),
                Err(err) => {
                    if let Some(result) = call_method(&receiver, name, &arg_values) {
                        return result;
                    }
                    return Err(err);
                }
            }
        }

        let callee = self.eval(callee)?;
        self.call_value(&callee, arg_values, kwarg_values)
    }

    fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<Value, EvalError> {
        match callee {
            Value::Func(func) => self.env.call(func, args, kwargs),
            other => Err(EvalError::typ(format!(
                "{} value is not callable",
                other.type_name()
            ))),
        }
    }
}

/// Uniform attribute-or-key resolution: one failure mode regardless of the
/// container's shape.
pub fn safe_lookup(container: &Value, key: &str) -> Result<Value, EvalError> {
    match container {
        Value::Map(map) => map.get(key).cloned().ok_or_else(|| {
            EvalError::lookup(format!("no attribute or key '{key}'"))
        }),
        Value::Func(func) if key == "__name__" => Ok(Value::str(func.name.clone())),
        other => Err(EvalError::lookup(format!(
            "no attribute or key '{key}' on {}",
            other.type_name()
        ))),
    }
}

/// Subscript resolution: map key, list index (negative counts from the
/// end), string character.
pub fn index_value(container: &Value, index: &Value) -> Result<Value, EvalError> {
    match container {
        Value::Map(map) => {
            let key = match index {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            map.get(&key)
                .cloned()
                .ok_or_else(|| EvalError::lookup(format!("no attribute or key '{key}'")))
        }
        Value::List(items) => {
            let i = coerce_int(index)?;
            let idx = resolve_index(i, items.len())
                .ok_or_else(|| EvalError::lookup(format!("list index {i} out of range")))?;
            Ok(items[idx].clone())
        }
        Value::Str(s) => {
            let i = coerce_int(index)?;
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve_index(i, chars.len())
                .ok_or_else(|| EvalError::lookup(format!("string index {i} out of range")))?;
            Ok(Value::str(chars[idx].to_string()))
        }
        other => Err(EvalError::typ(format!(
            "{} value is not subscriptable",
            other.type_name()
        ))),
    }
}

fn resolve_index(i: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let idx = if i < 0 { i + len } else { i };
    if (0..len).contains(&idx) {
        Some(idx as usize)
    } else {
        None
    }
}

fn clamp_range(start: Option<i64>, end: Option<i64>, len: usize) -> (usize, usize) {
    let len = len as i64;
    let resolve = |i: i64| -> i64 {
        let i = if i < 0 { i + len } else { i };
        i.clamp(0, len)
    };
    let lo = resolve(start.unwrap_or(0));
    let hi = resolve(end.unwrap_or(len));
    (lo as usize, (hi.max(lo)) as usize)
}

/// Slicing over strings and lists with open ends and negative indices.
pub fn slice_value(
    container: &Value,
    start: Option<i64>,
    end: Option<i64>,
) -> Result<Value, EvalError> {
    match container {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (lo, hi) = clamp_range(start, end, chars.len());
            Ok(Value::str(chars[lo..hi].iter().collect::<String>()))
        }
        Value::List(items) => {
            let (lo, hi) = clamp_range(start, end, items.len());
            Ok(Value::List(items[lo..hi].to_vec()))
        }
        other => Err(EvalError::typ(format!(
            "{} value cannot be sliced",
            other.type_name()
        ))),
    }
}

/// The values an `each` loop or comprehension walks: list elements, map
/// keys, string characters.
pub fn iter_values(source: &Value) -> Result<Vec<Value>, EvalError> {
    match source {
        Value::List(items) => Ok(items.clone()),
        Value::Map(map) => Ok(map.keys().map(Value::str).collect()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::str(c.to_string())).collect()),
        other => Err(EvalError::typ(format!(
            "{} value is not iterable",
            other.type_name()
        ))),
    }
}

fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    use Value::{Float, Int, List, Str};
    match (op, left, right) {
        (BinOp::Add, Str(a), Str(b)) => Ok(Value::str(format!("{a}{b}"))),
        (BinOp::Add, List(a), List(b)) => {
            let mut out = a.clone();
            out.extend(b.iter().cloned());
            Ok(List(out))
        }
        (_, Int(a), Int(b)) => int_binary(op, *a, *b),
        (_, Int(_) | Float(_), Int(_) | Float(_)) => {
            let a = coerce_float(left)?;
            let b = coerce_float(right)?;
            float_binary(op, a, b)
        }
        _ => Err(EvalError::typ(format!(
            "unsupported operand types: {} and {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::Int(a.wrapping_add(b))),
        BinOp::Sub => Ok(Value::Int(a.wrapping_sub(b))),
        BinOp::Mul => Ok(Value::Int(a.wrapping_mul(b))),
        BinOp::Div => {
            if b == 0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Float(a as f64 / b as f64))
            }
        }
        BinOp::FloorDiv => {
            if b == 0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Int(a.div_euclid(b)))
            }
        }
        BinOp::Mod => {
            if b == 0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Int(a.rem_euclid(b)))
            }
        }
        BinOp::Pow => {
            if b < 0 {
                Ok(Value::Float((a as f64).powf(b as f64)))
            } else {
                Ok(Value::Int(a.pow(b.min(u32::MAX as i64) as u32)))
            }
        }
    }
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div => {
            if b == 0.0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Float(a / b))
            }
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Float((a / b).floor()))
            }
        }
        BinOp::Mod => {
            if b == 0.0 {
                Err(EvalError::zero_division())
            } else {
                Ok(Value::Float(a.rem_euclid(b)))
            }
        }
        BinOp::Pow => Ok(Value::Float(a.powf(b))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    match op {
        CmpOp::Eq => Ok(left == right),
        CmpOp::Ne => Ok(left != right),
        CmpOp::In => contains(right, left),
        CmpOp::NotIn => contains(right, left).map(|b| !b),
        CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
            let ord = order(left, right)?;
            Ok(match op {
                CmpOp::Lt => ord == std::cmp::Ordering::Less,
                CmpOp::Le => ord != std::cmp::Ordering::Greater,
                CmpOp::Gt => ord == std::cmp::Ordering::Greater,
                CmpOp::Ge => ord != std::cmp::Ordering::Less,
                _ => unreachable!(),
            })
        }
    }
}

fn order(left: &Value, right: &Value) -> Result<std::cmp::Ordering, EvalError> {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = coerce_float(left)?;
            let b = coerce_float(right)?;
            a.partial_cmp(&b)
                .ok_or_else(|| EvalError::value("cannot order NaN"))
        }
        _ => Err(EvalError::typ(format!(
            "cannot compare {} with {}",
            left.type_name(),
            right.type_name()
        ))),
    }
}

fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match container {
        Value::List(items) => Ok(items.iter().any(|v| v == item)),
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => Err(EvalError::typ(format!(
                "cannot search for {} in string",
                other.type_name()
            ))),
        },
        Value::Map(map) => {
            let key = match item {
                Value::Str(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(map.contains_key(&key))
        }
        other => Err(EvalError::typ(format!(
            "{} value is not a container",
            other.type_name()
        ))),
    }
}

const BUILTIN_NAMES: &[&str] = &["len", "abs", "str", "int", "float", "min", "max", "print"];

/// Resolves a built-in function name to a function value.
pub fn lookup_builtin(name: &str) -> Option<FuncValue> {
    BUILTIN_NAMES.contains(&name).then(|| FuncValue {
        name: name.to_string(),
        slot: FuncSlot::Builtin,
    })
}

/// Implements the pure built-ins. Returns `None` for names whose behavior
/// needs the interpreter (currently `print`, which writes to the output
/// buffer).
pub fn call_builtin(name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    fn one<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
        match args {
            [value] => Ok(value),
            _ => Err(EvalError::typ(format!(
                "{name}() takes exactly one argument"
            ))),
        }
    }

    let result = match name {
        "len" => one("len", args).and_then(|v| match v {
            Value::Str(s) => Ok(Value::Int(s.chars().count() as i64)),
            Value::List(items) => Ok(Value::Int(items.len() as i64)),
            Value::Map(map) => Ok(Value::Int(map.len() as i64)),
            other => Err(EvalError::typ(format!(
                "{} value has no length",
                other.type_name()
            ))),
        }),
        "abs" => one("abs", args).and_then(|v| match v {
            Value::Int(n) => Ok(Value::Int(n.abs())),
            Value::Float(x) => Ok(Value::Float(x.abs())),
            other => Err(EvalError::typ(format!(
                "bad operand for abs(): {}",
                other.type_name()
            ))),
        }),
        "str" => one("str", args).map(|v| Value::str(v.to_string())),
        "int" => one("int", args).and_then(|v| coerce_int(v).map(Value::Int)),
        "float" => one("float", args).and_then(|v| coerce_float(v).map(Value::Float)),
        "min" | "max" => {
            let pick_max = name == "max";
            let items: Vec<Value> = match args {
                [Value::List(items)] => items.clone(),
                [] => {
                    return Some(Err(EvalError::typ(format!(
                        "{name}() expects arguments"
                    ))))
                }
                many => many.to_vec(),
            };
            let mut iter = items.into_iter();
            let mut best = match iter.next() {
                Some(first) => first,
                None => return Some(Err(EvalError::value(format!("{name}() of empty list")))),
            };
            for item in iter {
                let ord = match order(&item, &best) {
                    Ok(ord) => ord,
                    Err(err) => return Some(Err(err)),
                };
                let better = if pick_max {
                    ord == std::cmp::Ordering::Greater
                } else {
                    ord == std::cmp::Ordering::Less
                };
                if better {
                    best = item;
                }
            }
            Ok(best)
        }
        "print" => return None,
        _ => return None,
    };
    Some(result)
}

/// Built-in methods of the value types, used for `recv.name(args)` calls
/// when `name` is not a key of the receiver.
pub fn call_method(
    receiver: &Value,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    fn arg_str(args: &[Value], i: usize) -> Option<String> {
        args.get(i).map(|v| match v {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        })
    }

    match receiver {
        Value::Str(s) => {
            let result = match name {
                "upper" => Value::str(s.to_uppercase()),
                "lower" => Value::str(s.to_lowercase()),
                "strip" => Value::str(s.trim().to_string()),
                "replace" => {
                    let from = arg_str(args, 0)?;
                    let to = arg_str(args, 1)?;
                    Value::str(s.replace(&from, &to))
                }
                "split" => {
                    let parts: Vec<Value> = match arg_str(args, 0) {
                        Some(sep) => s.split(sep.as_str()).map(Value::str).collect(),
                        None => s.split_whitespace().map(Value::str).collect(),
                    };
                    Value::List(parts)
                }
                "join" => match args.first() {
                    Some(Value::List(items)) => {
                        let joined = items
                            .iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(s);
                        Value::str(joined)
                    }
                    _ => return Some(Err(EvalError::typ("join() expects a list"))),
                },
                "startswith" => Value::Bool(s.starts_with(arg_str(args, 0)?.as_str())),
                "endswith" => Value::Bool(s.ends_with(arg_str(args, 0)?.as_str())),
                _ => return None,
            };
            Some(Ok(result))
        }
        Value::Map(map) => {
            let result = match name {
                "keys" => Value::List(map.keys().map(Value::str).collect()),
                "values" => Value::List(map.values().cloned().collect()),
                "items" => Value::List(
                    map.iter()
                        .map(|(k, v)| Value::List(vec![Value::str(k), v.clone()]))
                        .collect(),
                ),
                "get" => {
                    let key = arg_str(args, 0)?;
                    map.get(&key)
                        .cloned()
                        .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::Null))
                }
                _ => return None,
            };
            Some(Ok(result))
        }
        _ => None,
    }
}
