//! Native function registry and built-in functions.
//!
//! Every registry starts with the built-ins below; hosts add or override
//! entries by name.  Built-ins are lenient: a wrong argument type yields a
//! neutral result (`0`, `false`, `""`) rather than an error.
//!
//! Receiver methods on arrays and strings (`list.add(x)`, `s.trim()`) are
//! dispatched here as well.

use std::collections::HashMap;
use std::io::Write;

use super::error::{Result, ScriptError};
use super::position::Position;
use super::value::{ArrayRef, NativeFunction, Value};

/// Name → native function table.
#[derive(Debug, Default, Clone)]
pub struct NativeFunctionRegistry {
    functions: HashMap<String, NativeFunction>,
}

impl NativeFunctionRegistry {
    /// An empty registry with no built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-seeded with the built-ins.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register_builtins();
        reg
    }

    /// Add or replace `name`.
    pub fn register(&mut self, name: impl Into<String>, f: NativeFunction) {
        self.functions.insert(name.into(), f);
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn clear(&mut self) {
        self.functions.clear();
    }

    pub fn register_builtins(&mut self) {
        let builtins: [(&str, fn(&[Value]) -> Result<Value>); 11] = [
            ("toString", to_string),
            ("size", size),
            ("isNumber", |a| Ok(Value::Bool(matches!(a.first(), Some(Value::Number(_)))))),
            ("isString", |a| Ok(Value::Bool(matches!(a.first(), Some(Value::Str(_)))))),
            ("isBoolean", |a| Ok(Value::Bool(matches!(a.first(), Some(Value::Bool(_)))))),
            ("isNull", |a| Ok(Value::Bool(matches!(a.first(), Some(Value::Null))))),
            ("isArray", |a| Ok(Value::Bool(matches!(a.first(), Some(Value::Array(_)))))),
            ("abs", abs),
            ("min", |a| Ok(numeric_pair(a, f64::min))),
            ("max", |a| Ok(numeric_pair(a, f64::max))),
            ("print", print),
        ];
        for (name, f) in builtins {
            self.register(name, NativeFunction::simple(f));
        }
    }
}

// ── Built-in functions ────────────────────────────────────────────────────────

fn to_string(args: &[Value]) -> Result<Value> {
    Ok(Value::Str(
        args.first().map(Value::to_string).unwrap_or_default(),
    ))
}

fn size(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(match args.first() {
        Some(Value::Array(a)) => a.borrow().len() as f64,
        _ => 0.0,
    }))
}

fn abs(args: &[Value]) -> Result<Value> {
    Ok(Value::Number(match args.first() {
        Some(Value::Number(n)) => n.abs(),
        _ => 0.0,
    }))
}

fn numeric_pair(args: &[Value], f: fn(f64, f64) -> f64) -> Value {
    match args {
        [Value::Number(a), Value::Number(b), ..] => Value::Number(f(*a, *b)),
        _ => Value::Number(0.0),
    }
}

/// Write the display string of the first argument to stdout, no newline.
fn print(args: &[Value]) -> Result<Value> {
    if let Some(v) = args.first() {
        let mut out = std::io::stdout().lock();
        write!(out, "{v}")
            .and_then(|()| out.flush())
            .map_err(|e| ScriptError::runtime("print failed", None).with_source(e))?;
    }
    Ok(Value::Null)
}

// ── Receiver methods ──────────────────────────────────────────────────────────

/// `add`, `remove`, `removeAt`, `contains` on an array.
pub fn call_array_method(
    array: &ArrayRef,
    method: &str,
    args: &[Value],
    pos: Position,
) -> Result<Value> {
    match (method, args) {
        ("add", [v]) => {
            array.borrow_mut().push(v.clone());
            Ok(Value::Null)
        }
        ("remove", [v]) => {
            let mut items = array.borrow_mut();
            let found = items.iter().position(|item| item == v);
            if let Some(i) = found {
                items.remove(i);
            }
            Ok(Value::Bool(found.is_some()))
        }
        ("removeAt", [Value::Number(n)]) => {
            let mut items = array.borrow_mut();
            let index = n.trunc();
            if index < 0.0 || index >= items.len() as f64 {
                return Ok(Value::Null);
            }
            Ok(items.remove(index as usize))
        }
        ("contains", [v]) => Ok(Value::Bool(array.borrow().iter().any(|item| item == v))),
        _ => Err(ScriptError::runtime(
            format!("Unknown array method '{method}'"),
            pos,
        )),
    }
}

/// `length`, `toUpperCase`, `toLowerCase`, `trim` on a string.
pub fn call_string_method(s: &str, method: &str, pos: Position) -> Result<Value> {
    Ok(match method {
        "length" => Value::Number(s.chars().count() as f64),
        "toUpperCase" => Value::Str(s.to_uppercase()),
        "toLowerCase" => Value::Str(s.to_lowercase()),
        "trim" => Value::Str(s.trim().to_owned()),
        _ => {
            return Err(ScriptError::runtime(
                format!("Unknown string method '{method}'"),
                pos,
            ))
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
