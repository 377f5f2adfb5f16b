//! Expression language for the stencil template engine.
//!
//! This crate is the "host evaluator" the engine leans on: templates embed
//! expressions between configurable markers, and everything inside a marker
//! pair is this language. It deliberately stays a small, side-effect-light
//! subset — arithmetic, comparisons (chained), boolean logic, conditional
//! expressions, collection literals, subscripts and slices, calls with
//! keyword arguments, attribute access, and single-`for` list
//! comprehensions. Bitwise and shift operators are rejected with a
//! dedicated error so they can never be silently miscompiled.
//!
//! The evaluator knows nothing about templates. Name resolution and call
//! dispatch go through the [`Env`] trait, which the engine implements on
//! its per-render interpreter; that is what gives template procedures their
//! dynamic-scope behavior without this crate ever seeing a scope chain.
//!
//! # Example
//!
//! ```rust
//! use stencil_expr::{eval, parse_expr, Env, EvalError, FuncValue, Value};
//!
//! struct Vars(std::collections::HashMap<String, Value>);
//!
//! impl Env for Vars {
//!     fn lookup(&mut self, name: &str) -> Option<Value> {
//!         self.0.get(name).cloned()
//!     }
//!     fn assign(&mut self, name: &str, value: Value) {
//!         self.0.insert(name.to_string(), value);
//!     }
//!     fn call(
//!         &mut self,
//!         func: &FuncValue,
//!         args: Vec<Value>,
//!         _kwargs: Vec<(String, Value)>,
//!     ) -> Result<Value, EvalError> {
//!         stencil_expr::call_builtin(&func.name, &args)
//!             .unwrap_or_else(|| Err(EvalError::typ("not callable")))
//!     }
//! }
//!
//! let mut env = Vars([("x".to_string(), Value::Int(4))].into_iter().collect());
//! let expr = parse_expr("3 < x < 5").unwrap();
//! assert_eq!(eval(&expr, &mut env).unwrap(), Value::Bool(true));
//! ```

mod ast;
mod error;
mod eval;
mod parser;
mod token;
mod value;

pub use ast::{BinOp, BoolOp, CmpOp, Expr, Stmt, UnaryOp};
pub use error::{EvalError, EvalErrorKind, SyntaxError, SyntaxErrorKind};
pub use eval::{
    call_builtin, call_method, eval, exec_stmt, index_value, iter_values, lookup_builtin,
    safe_lookup, slice_value, Env,
};
pub use parser::{parse_args, parse_expr, parse_stmt};
pub use value::{coerce_float, coerce_int, to_json, FuncSlot, FuncValue, Map, Value};
