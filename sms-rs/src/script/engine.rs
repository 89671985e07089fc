//! Host-facing façade over the lexer, parser and interpreter.
//!
//! A [`ScriptEngine`] keeps one [`Interpreter`] alive across calls, so global
//! variables and functions defined by one `execute` remain visible to the
//! next, while the event-handler table always reflects the most recent
//! program.
//!
//! ```rust
//! use sms::script::{HostValue, ScriptEngine};
//!
//! let mut engine = ScriptEngine::new();
//! engine.register_function("greet", |args| {
//!     Ok(HostValue::String(format!("hello {}", args[0])))
//! });
//! let v = engine.execute_and_get_host_value("greet(\"sms\")").unwrap();
//! assert_eq!(v, HostValue::from("hello sms"));
//! ```

use std::rc::Rc;

use tracing::debug;

use super::builtins::NativeFunctionRegistry;
use super::error::Result;
use super::interp::{CallContext, Interpreter};
use super::parser::parse_program;
use super::value::{HostValue, NativeFunction, Value};

pub struct ScriptEngine {
    interp: Interpreter,
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    pub fn new() -> Self {
        ScriptEngine {
            interp: Interpreter::new(),
        }
    }

    /// `"SMS Engine <crate version>"`.
    pub fn version() -> String {
        format!("SMS Engine {}", env!("CARGO_PKG_VERSION"))
    }

    // ── Running source ────────────────────────────────────────────────────────

    /// Parse `source` and run it; returns the value of the last statement.
    pub fn execute(&mut self, source: &str) -> Result<Value> {
        let program = parse_program(source)?;
        self.interp.execute(&program)
    }

    /// [`execute`](Self::execute), with the result bridged to a [`HostValue`].
    pub fn execute_and_get_host_value(&mut self, source: &str) -> Result<HostValue> {
        self.execute(source).map(HostValue::from)
    }

    /// Lex and parse `source` without running it.
    pub fn validate_syntax(&self, source: &str) -> Result<()> {
        parse_program(source).map(|_| ())
    }

    // ── Host functions ────────────────────────────────────────────────────────

    /// Register (or override) a host function callable by bare name.
    ///
    /// Arguments and the result cross the boundary as [`HostValue`]s.
    pub fn register_function<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[HostValue]) -> Result<HostValue> + 'static,
    {
        debug!(name, "registering host function");
        let native = NativeFunction::simple(move |args: &[Value]| {
            let host: Vec<HostValue> = args.iter().map(HostValue::from).collect();
            f(&host).map(Value::from)
        });
        self.interp.natives_mut().register(name, native);
    }

    /// Register a value-level native that may call back into the engine
    /// through its [`CallContext`].
    pub fn register_native(&mut self, name: &str, f: NativeFunction) {
        debug!(name, "registering native");
        self.interp.natives_mut().register(name, f);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.interp.natives().has(name)
    }

    /// Registered native names, sorted.
    pub fn function_names(&self) -> Vec<String> {
        self.interp.natives().names()
    }

    /// Drop every host registration, leaving only the built-ins.
    pub fn clear_functions(&mut self) {
        let natives = self.interp.natives_mut();
        natives.clear();
        natives.register_builtins();
    }

    pub fn natives(&self) -> &NativeFunctionRegistry {
        self.interp.natives()
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Dispatch `target.event(args)`; `Ok(false)` when no handler exists.
    pub fn invoke_event(&mut self, target: &str, event: &str, args: &[HostValue]) -> Result<bool> {
        let args = args.iter().cloned().map(Value::from).collect();
        self.interp.invoke_event(target, event, args)
    }

    /// Registered `"target.event"` keys of the last executed program.
    pub fn handler_keys(&self) -> Vec<String> {
        self.interp.handler_keys()
    }

    /// Install the callback receiving `super(...)` calls as
    /// `(target, event, args)` of the executing handler.
    pub fn set_super_dispatcher<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, &[HostValue]) + 'static,
    {
        self.interp.set_super_dispatcher(Some(Rc::new(
            move |_: &mut dyn CallContext, target: &str, event: &str, args: &[Value]| {
                let host: Vec<HostValue> = args.iter().map(HostValue::from).collect();
                f(target, event, &host);
                Ok(())
            },
        )));
    }

    pub fn clear_super_dispatcher(&mut self) {
        self.interp.set_super_dispatcher(None);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::script::error::{ErrorKind, ScriptError};

    #[test]
    fn version_string() {
        assert!(ScriptEngine::version().starts_with("SMS Engine "));
    }

    #[test]
    fn host_function_bridging() {
        let mut engine = ScriptEngine::new();
        engine.register_function("sum", |args| {
            Ok(HostValue::Number(args.iter().filter_map(HostValue::as_number).sum()))
        });
        assert!(engine.has_function("sum"));
        let v = engine.execute_and_get_host_value("sum(1, 2, 3)").unwrap();
        assert_eq!(v, HostValue::Number(6.0));
    }

    #[test]
    fn host_function_errors_carry_position() {
        let mut engine = ScriptEngine::new();
        engine.register_function("boom", |_| Err(ScriptError::runtime("boom", None)));
        let err = engine.execute("var a = 1\nboom()").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.to_string(), "Error at line 2, column 1: boom");
    }

    #[test]
    fn clear_functions_keeps_builtins() {
        let mut engine = ScriptEngine::new();
        engine.register_function("custom", |_| Ok(HostValue::Null));
        engine.clear_functions();
        assert!(!engine.has_function("custom"));
        assert!(engine.has_function("toString"));
        assert_eq!(engine.function_names(), NativeFunctionRegistry::with_builtins().names());
    }

    #[test]
    fn host_values_to_script() {
        let mut engine = ScriptEngine::new();
        engine
            .execute("var got = null\non app.load(items, opts) { got = items.size + opts.depth }")
            .unwrap();
        let items = HostValue::from(vec![1, 2, 3]);
        let opts = HostValue::Map(vec![("depth".into(), 4.into())]);
        assert!(engine.invoke_event("app", "load", &[items, opts]).unwrap());
        assert_eq!(engine.execute("got").unwrap(), Value::Number(7.0));
    }

    #[test]
    fn super_dispatcher_receives_handler_identity() {
        let calls: Rc<RefCell<Vec<(String, String, Vec<HostValue>)>>> = Rc::default();
        let mut engine = ScriptEngine::new();
        let sink = Rc::clone(&calls);
        engine.set_super_dispatcher(move |t, e, args| {
            sink.borrow_mut().push((t.into(), e.into(), args.to_vec()));
        });
        engine.execute("on list.select(i) { super(i * 2) }").unwrap();
        engine.invoke_event("list", "select", &[5.into()]).unwrap();
        assert_eq!(
            *calls.borrow(),
            vec![("list".into(), "select".into(), vec![HostValue::Number(10.0)])]
        );

        engine.clear_super_dispatcher();
        let err = engine.invoke_event("list", "select", &[5.into()]).unwrap_err();
        assert!(err.message().starts_with("super dispatcher is not configured"));
    }

    #[test]
    fn validate_syntax_does_not_run() {
        let mut engine = ScriptEngine::new();
        engine.validate_syntax("var x = 1 / 0").unwrap();
        assert!(engine.validate_syntax("var x = (").is_err());
        assert!(engine.handler_keys().is_empty());
        engine.execute("on a.b() { }").unwrap();
        engine.validate_syntax("on c.d() { }").unwrap();
        assert_eq!(engine.handler_keys(), vec!["a.b"]);
    }
}
