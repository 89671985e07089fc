//! SMS tree-walking interpreter.
//!
//! The [`Interpreter`] owns the persistent root scope, the native function
//! registry and the event-handler table.  The active scope is threaded
//! explicitly through every `exec_*`/`eval` call; a child scope is created for
//! each block, loop, function call, handler invocation and accessor
//! evaluation.  Statement execution returns a [`ControlFlow`] so that
//! `break`/`continue`/`return` unwind without panics or sentinel errors.

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use tracing::{debug, trace};

use super::ast::{
    event_key, Accessor, BinOp, DataClassDecl, EventHandlerDecl, Expr, ExprKind, FunctionDecl,
    PostfixOp, Program, Stmt, StmtKind, StringPart, UnaryOp, WhenBranch,
};
use super::builtins::{call_array_method, call_string_method, NativeFunctionRegistry};
use super::error::{Result, ScriptError};
use super::position::Position;
use super::scope::{BindingRef, Scope, ScopeRef, VariableBinding};
use super::value::{Object, Value};
use super::{STACK_GROW_SIZE, STACK_RED_ZONE};

/// Maximum nesting of function calls, handler invocations and accessors.
pub const MAX_CALL_DEPTH: usize = 200;

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Result of executing a statement or block.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    /// Ran to completion, producing the value of the last statement.
    Completed(Value),
    Break,
    Continue,
    Return(Value),
}

// ── CallContext ───────────────────────────────────────────────────────────────

/// Interface handed to native functions and the `super` dispatcher.
///
/// The [`Interpreter`] implements this trait, so host callbacks can dispatch
/// further events or call script functions while a script is running.
pub trait CallContext {
    /// Dispatch `target.event(args)`.  Returns `false` when no handler exists.
    fn invoke_event(&mut self, target: &str, event: &str, args: Vec<Value>) -> Result<bool>;

    /// Call a native, data-class constructor or script function by name.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value>;

    /// The `(target, event)` of the innermost executing handler, if any.
    fn current_event(&self) -> Option<(&str, &str)>;
}

/// Receives `super(...)` calls: `(ctx, target, event, args)`.
pub type SuperDispatcher = Rc<dyn Fn(&mut dyn CallContext, &str, &str, &[Value]) -> Result<()>>;

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    natives: NativeFunctionRegistry,
    /// Root scope; persists across `execute` calls.
    globals: ScopeRef,
    /// `"target.event"` → handler, rebuilt by every `execute`.
    handlers: HashMap<String, Rc<EventHandlerDecl>>,
    super_dispatcher: Option<SuperDispatcher>,
    current_event: Option<(String, String)>,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter whose registry holds the built-ins.
    pub fn new() -> Self {
        Self::with_registry(NativeFunctionRegistry::with_builtins())
    }

    /// An interpreter using `natives` as-is.
    pub fn with_registry(natives: NativeFunctionRegistry) -> Self {
        Interpreter {
            natives,
            globals: Scope::root(),
            handlers: HashMap::new(),
            super_dispatcher: None,
            current_event: None,
            depth: 0,
        }
    }

    pub fn natives(&self) -> &NativeFunctionRegistry {
        &self.natives
    }

    pub fn natives_mut(&mut self) -> &mut NativeFunctionRegistry {
        &mut self.natives
    }

    pub fn set_super_dispatcher(&mut self, dispatcher: Option<SuperDispatcher>) {
        self.super_dispatcher = dispatcher;
    }

    pub fn has_handler(&self, target: &str, event: &str) -> bool {
        self.handlers.contains_key(&event_key(target, event))
    }

    /// Registered handler keys, sorted.
    pub fn handler_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.handlers.keys().cloned().collect();
        keys.sort();
        keys
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Run a program against the root scope.
    ///
    /// Functions, data classes and event handlers are hoisted first; the
    /// remaining top-level statements then run in order.  The value of the
    /// last one is the result, unless a top-level `return` ends the program.
    pub fn execute(&mut self, program: &Program) -> Result<Value> {
        debug!(statements = program.stmts.len(), "executing program");
        self.handlers.clear();
        let root = Rc::clone(&self.globals);

        for stmt in &program.stmts {
            match &stmt.kind {
                StmtKind::Fun(f) => root.borrow_mut().define_function(Rc::clone(f)),
                StmtKind::DataClass(d) => root.borrow_mut().define_data_class(Rc::clone(d)),
                StmtKind::On(h) => {
                    self.handlers.insert(h.key(), Rc::clone(h));
                }
                _ => {}
            }
        }
        debug!(handlers = self.handlers.len(), "event handlers registered");

        let mut last = Value::Null;
        for stmt in &program.stmts {
            if matches!(
                stmt.kind,
                StmtKind::Fun(_) | StmtKind::DataClass(_) | StmtKind::On(_)
            ) {
                continue;
            }
            match self.exec_stmt(stmt, &root)? {
                ControlFlow::Completed(v) => last = v,
                ControlFlow::Return(v) => return Ok(v),
                ControlFlow::Break => return Err(stray("break", stmt.pos)),
                ControlFlow::Continue => return Err(stray("continue", stmt.pos)),
            }
        }
        Ok(last)
    }

    /// Dispatch `target.event(args)` to its handler.
    ///
    /// Returns `Ok(false)` when no handler is registered.  The executing
    /// `(target, event)` is saved and restored around the call so nested
    /// dispatch from inside a handler resolves `super` correctly.
    pub fn invoke_event(&mut self, target: &str, event: &str, args: Vec<Value>) -> Result<bool> {
        let key = event_key(target, event);
        let Some(handler) = self.handlers.get(&key).cloned() else {
            debug!(%key, "no event handler");
            return Ok(false);
        };
        if args.len() != handler.params.len() {
            return Err(ScriptError::runtime(
                format!(
                    "Event {key} expects {} args, got {}",
                    handler.params.len(),
                    args.len()
                ),
                None,
            ));
        }
        debug!(%key, args = args.len(), "invoking event handler");

        let scope = Scope::child(&self.globals);
        for (name, value) in handler.params.iter().zip(args) {
            scope.borrow_mut().define(name.as_str(), value);
        }

        self.enter(handler.pos)?;
        let previous = mem::replace(
            &mut self.current_event,
            Some((handler.target.clone(), handler.event.clone())),
        );
        let result = self.exec_block(&handler.body, &scope);
        self.current_event = previous;
        self.depth -= 1;

        match result? {
            ControlFlow::Completed(_) | ControlFlow::Return(_) => Ok(true),
            ControlFlow::Break => Err(stray("break", handler.pos)),
            ControlFlow::Continue => Err(stray("continue", handler.pos)),
        }
    }

    fn enter(&mut self, pos: Position) -> Result<()> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ScriptError::runtime(
                format!("Maximum call depth of {MAX_CALL_DEPTH} exceeded"),
                pos,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    /// Run `stmts` in a fresh child of `parent`.
    fn exec_block(&mut self, stmts: &[Stmt], parent: &ScopeRef) -> Result<ControlFlow> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
            self.exec_block_inner(stmts, parent)
        })
    }

    fn exec_block_inner(&mut self, stmts: &[Stmt], parent: &ScopeRef) -> Result<ControlFlow> {
        let scope = Scope::child(parent);
        let mut last = Value::Null;
        for stmt in stmts {
            match self.exec_stmt(stmt, &scope)? {
                ControlFlow::Completed(v) => last = v,
                signal => return Ok(signal),
            }
        }
        Ok(ControlFlow::Completed(last))
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: &ScopeRef) -> Result<ControlFlow> {
        let done = |v: Value| -> Result<ControlFlow> { Ok(ControlFlow::Completed(v)) };
        match &stmt.kind {
            StmtKind::Var {
                name,
                init,
                getter,
                setter,
            } => {
                let value = self.eval(init, scope)?;
                scope.borrow_mut().define_binding(
                    name.as_str(),
                    VariableBinding {
                        value,
                        getter: getter.clone(),
                        setter: setter.clone(),
                    },
                );
                done(Value::Null)
            }

            StmtKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, stmt.pos, scope)?;
                done(Value::Null)
            }

            StmtKind::Expr(expr) => done(self.eval(expr, scope)?),

            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval(cond, scope)?.is_truthy() {
                    self.exec_block(then_block, scope)
                } else if let Some(else_block) = else_block {
                    self.exec_block(else_block, scope)
                } else {
                    done(Value::Null)
                }
            }

            StmtKind::While { cond, body } => {
                let mut last = Value::Null;
                while self.eval(cond, scope)?.is_truthy() {
                    match self.exec_block(body, scope)? {
                        ControlFlow::Completed(v) => last = v,
                        ControlFlow::Continue => {}
                        ControlFlow::Break => break,
                        ret @ ControlFlow::Return(_) => return Ok(ret),
                    }
                }
                done(last)
            }

            StmtKind::For {
                init,
                cond,
                update,
                body,
            } => {
                let loop_scope = Scope::child(scope);
                if let Some(init) = init {
                    self.exec_stmt(init, &loop_scope)?;
                }
                let mut last = Value::Null;
                loop {
                    if let Some(cond) = cond {
                        if !self.eval(cond, &loop_scope)?.is_truthy() {
                            break;
                        }
                    }
                    match self.exec_block(body, &loop_scope)? {
                        ControlFlow::Completed(v) => last = v,
                        ControlFlow::Continue => {}
                        ControlFlow::Break => break,
                        ret @ ControlFlow::Return(_) => return Ok(ret),
                    }
                    if let Some(update) = update {
                        self.exec_stmt(update, &loop_scope)?;
                    }
                }
                done(last)
            }

            StmtKind::ForIn {
                var,
                iterable,
                body,
            } => {
                let loop_scope = Scope::child(scope);
                let items = match self.eval(iterable, &loop_scope)? {
                    Value::Array(items) => {
                        let snapshot = items.borrow().clone();
                        snapshot
                    }
                    _ => {
                        return Err(ScriptError::runtime(
                            "for-in requires an array",
                            stmt.pos,
                        ))
                    }
                };
                let mut last = Value::Null;
                for item in items {
                    loop_scope.borrow_mut().define(var.as_str(), item);
                    match self.exec_block(body, &loop_scope)? {
                        ControlFlow::Completed(v) => last = v,
                        ControlFlow::Continue => {}
                        ControlFlow::Break => break,
                        ret @ ControlFlow::Return(_) => return Ok(ret),
                    }
                }
                done(last)
            }

            StmtKind::Break => Ok(ControlFlow::Break),
            StmtKind::Continue => Ok(ControlFlow::Continue),

            StmtKind::Return(value) => {
                let v = match value {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Value::Null,
                };
                Ok(ControlFlow::Return(v))
            }

            StmtKind::Fun(f) => {
                scope.borrow_mut().define_function(Rc::clone(f));
                done(Value::Null)
            }

            StmtKind::DataClass(d) => {
                scope.borrow_mut().define_data_class(Rc::clone(d));
                done(Value::Null)
            }

            StmtKind::On(_) => Err(ScriptError::runtime(
                "Event handlers must be declared at top level",
                stmt.pos,
            )),
        }
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    /// Evaluate `expr`, moving to a new stack segment when this one runs low.
    fn eval(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.eval_inner(expr, scope))
    }

    fn eval_inner(&mut self, expr: &Expr, scope: &ScopeRef) -> Result<Value> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Null => Ok(Value::Null),

            ExprKind::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Text(t) => out.push_str(t),
                        StringPart::Expr(e) => out.push_str(&self.eval(e, scope)?.to_string()),
                    }
                }
                Ok(Value::Str(out))
            }

            ExprKind::Ident(name) => {
                let binding = lookup(scope, name, pos)?;
                self.read_binding(&binding, scope)
            }

            ExprKind::Binary(op, lhs, rhs) => {
                // Both operands are always evaluated, `&&`/`||` included.
                let l = self.eval(lhs, scope)?;
                let r = self.eval(rhs, scope)?;
                binary(*op, l, r, pos)
            }

            ExprKind::Unary(op, operand) => {
                let v = self.eval(operand, scope)?;
                match (op, v) {
                    (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
                    (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-n)),
                    (UnaryOp::Plus, n @ Value::Number(_)) => Ok(n),
                    (op, _) => Err(ScriptError::runtime(
                        format!("Invalid operand for unary '{op}'"),
                        pos,
                    )),
                }
            }

            ExprKind::Postfix(op, operand) => self.postfix(*op, operand, pos, scope),

            ExprKind::Call { name, args } => {
                if name == "super" {
                    return self.call_super(args, pos, scope);
                }
                let args = self.eval_args(args, scope)?;
                self.call_named(name, args, Some(pos), scope)
            }

            ExprKind::MethodCall {
                receiver,
                method,
                args,
            } => {
                let receiver = self.eval(receiver, scope)?;
                let args = self.eval_args(args, scope)?;
                self.call_method(receiver, method, &args, pos)
            }

            ExprKind::Member { receiver, name } => match self.eval(receiver, scope)? {
                Value::Object(obj) => Ok(Object::get(&obj, name)),
                Value::Array(items) if name == "size" => {
                    let len = items.borrow().len();
                    Ok(Value::Number(len as f64))
                }
                other => Err(ScriptError::runtime(
                    format!("Cannot access member '{name}' on {}", other.type_name()),
                    pos,
                )),
            },

            ExprKind::Assign { target, value } => {
                let value = self.eval(value, scope)?;
                self.assign(target, value, pos, scope)
            }

            ExprKind::Index { receiver, index } => {
                let receiver = self.eval(receiver, scope)?;
                let index = self.eval(index, scope)?;
                match (receiver, index) {
                    (Value::Array(items), Value::Number(n)) => {
                        let items = items.borrow();
                        Ok(index_of(n, items.len())
                            .map(|i| items[i].clone())
                            .unwrap_or_default())
                    }
                    _ => Err(ScriptError::runtime("Invalid array access", pos)),
                }
            }

            ExprKind::Array(elements) => Ok(Value::array(self.eval_args(elements, scope)?)),

            ExprKind::If {
                cond,
                then_expr,
                else_expr,
            } => {
                if self.eval(cond, scope)?.is_truthy() {
                    self.eval(then_expr, scope)
                } else {
                    self.eval(else_expr, scope)
                }
            }

            ExprKind::When { subject, branches } => {
                let subject = match subject {
                    Some(s) => Some(self.eval(s, scope)?),
                    None => None,
                };
                self.when(subject.as_ref(), branches, scope)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], scope: &ScopeRef) -> Result<Vec<Value>> {
        args.iter().map(|a| self.eval(a, scope)).collect()
    }

    fn when(
        &mut self,
        subject: Option<&Value>,
        branches: &[WhenBranch],
        scope: &ScopeRef,
    ) -> Result<Value> {
        for branch in branches {
            let Some(cond) = &branch.cond else {
                return self.eval(&branch.result, scope);
            };
            let c = self.eval(cond, scope)?;
            let matched = match subject {
                Some(s) => *s == c,
                None => c.is_truthy(),
            };
            if matched {
                return self.eval(&branch.result, scope);
            }
        }
        Ok(Value::Null)
    }

    fn postfix(
        &mut self,
        op: PostfixOp,
        operand: &Expr,
        pos: Position,
        scope: &ScopeRef,
    ) -> Result<Value> {
        let ExprKind::Ident(name) = &operand.kind else {
            return Err(ScriptError::runtime(
                "Postfix operators only work on variables",
                pos,
            ));
        };
        let binding = lookup(scope, name, pos)?;
        let current = self.read_binding(&binding, scope)?;
        let Value::Number(n) = current else {
            return Err(ScriptError::runtime(
                "Postfix operators only work on numbers",
                pos,
            ));
        };
        self.write_binding(&binding, Value::Number(n + op.delta()), scope)?;
        Ok(current)
    }

    // ── Variables and accessors ───────────────────────────────────────────────

    fn read_binding(&mut self, binding: &BindingRef, scope: &ScopeRef) -> Result<Value> {
        let getter = binding.borrow().getter.clone();
        match getter {
            None => Ok(binding.borrow().value.clone()),
            Some(g) => self.run_accessor(&g, binding, None, scope),
        }
    }

    fn write_binding(&mut self, binding: &BindingRef, value: Value, scope: &ScopeRef) -> Result<()> {
        let setter = binding.borrow().setter.clone();
        match setter {
            None => binding.borrow_mut().value = value,
            Some(s) => {
                self.run_accessor(&s, binding, Some(value), scope)?;
            }
        }
        Ok(())
    }

    /// Evaluate a getter/setter body with `field` (and the setter parameter)
    /// bound in a fresh scope, then persist `field` back into the binding.
    fn run_accessor(
        &mut self,
        accessor: &Accessor,
        binding: &BindingRef,
        incoming: Option<Value>,
        scope: &ScopeRef,
    ) -> Result<Value> {
        let acc_scope = Scope::child(scope);
        let stored = binding.borrow().value.clone();
        acc_scope.borrow_mut().define("field", stored);
        if let Some(param) = &accessor.param {
            acc_scope
                .borrow_mut()
                .define(param.as_str(), incoming.unwrap_or_default());
        }

        self.enter(accessor.pos)?;
        let result = self.eval(&accessor.body, &acc_scope);
        self.depth -= 1;
        let result = result?;

        let field = acc_scope.borrow().local("field");
        if let Some(field) = field {
            let updated = field.borrow().value.clone();
            binding.borrow_mut().value = updated;
        }
        Ok(result)
    }

    /// Store `value` into an identifier, member or index target.
    fn assign(&mut self, target: &Expr, value: Value, pos: Position, scope: &ScopeRef) -> Result<Value> {
        match &target.kind {
            ExprKind::Ident(name) => {
                let binding = lookup(scope, name, pos)?;
                self.write_binding(&binding, value.clone(), scope)?;
            }
            ExprKind::Member { receiver, name } => match self.eval(receiver, scope)? {
                Value::Object(obj) => Object::set(&obj, name, value.clone()),
                other => {
                    return Err(ScriptError::runtime(
                        format!("Cannot set field '{name}' on {}", other.type_name()),
                        pos,
                    ))
                }
            },
            ExprKind::Index { receiver, index } => {
                let receiver = self.eval(receiver, scope)?;
                let index = self.eval(index, scope)?;
                match (receiver, index) {
                    (Value::Array(items), Value::Number(n)) => {
                        let mut items = items.borrow_mut();
                        if let Some(i) = index_of(n, items.len()) {
                            items[i] = value.clone();
                        }
                    }
                    _ => return Err(ScriptError::runtime("Invalid array assignment", pos)),
                }
            }
            _ => return Err(ScriptError::runtime("Invalid assignment target", pos)),
        }
        Ok(value)
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    /// Resolve a bare-name call: native, then data class, then script function.
    fn call_named(
        &mut self,
        name: &str,
        args: Vec<Value>,
        pos: Option<Position>,
        scope: &ScopeRef,
    ) -> Result<Value> {
        if let Some(native) = self.natives.get(name).cloned() {
            trace!(name, "calling native");
            return native.call(self, &args).map_err(|e| match pos {
                Some(p) => e.or_position(p),
                None => e,
            });
        }

        let data_class = scope.borrow().data_class(name);
        if let Some(dc) = data_class {
            return construct(&dc, args, pos);
        }

        let function = scope.borrow().function(name);
        match function {
            Some(f) => self.call_function_decl(&f, args, pos, scope),
            None => Err(ScriptError::runtime(
                format!("Undefined function '{name}'"),
                pos,
            )),
        }
    }

    fn call_function_decl(
        &mut self,
        f: &FunctionDecl,
        args: Vec<Value>,
        pos: Option<Position>,
        caller: &ScopeRef,
    ) -> Result<Value> {
        if args.len() != f.params.len() {
            return Err(ScriptError::runtime(
                format!("Expected {} arguments, got {}", f.params.len(), args.len()),
                pos,
            ));
        }
        trace!(name = %f.name, depth = self.depth, "calling function");

        let call_scope = Scope::child(caller);
        for (param, value) in f.params.iter().zip(args) {
            call_scope.borrow_mut().define(param.as_str(), value);
        }

        self.enter(pos.unwrap_or(f.pos))?;
        let result = self.exec_block(&f.body, &call_scope);
        self.depth -= 1;

        match result? {
            ControlFlow::Return(v) => Ok(v),
            ControlFlow::Completed(_) => Ok(Value::Null),
            ControlFlow::Break => Err(stray("break", f.pos)),
            ControlFlow::Continue => Err(stray("continue", f.pos)),
        }
    }

    fn call_method(&mut self, receiver: Value, method: &str, args: &[Value], pos: Position) -> Result<Value> {
        match receiver {
            Value::Array(items) => call_array_method(&items, method, args, pos),
            Value::Str(s) => call_string_method(&s, method, pos),
            Value::Object(obj) => match Object::get(&obj, method) {
                Value::Native(f) => f.call(self, args).map_err(|e| e.or_position(pos)),
                _ => Err(ScriptError::runtime(
                    format!(
                        "Unknown object method '{method}' on '{}'",
                        obj.borrow().class_name
                    ),
                    pos,
                )),
            },
            Value::Native(f) => f.call(self, args).map_err(|e| e.or_position(pos)),
            other => Err(ScriptError::runtime(
                format!("Cannot call method '{method}' on {}", other.type_name()),
                pos,
            )),
        }
    }

    /// Forward the executing handler's `(target, event)` plus `args` to the
    /// host's dispatcher.
    fn call_super(&mut self, args: &[Expr], pos: Position, scope: &ScopeRef) -> Result<Value> {
        let Some((target, event)) = self.current_event.clone() else {
            return Err(ScriptError::runtime(
                "super(...) can only be used inside an event handler",
                pos,
            ));
        };
        let args = self.eval_args(args, scope)?;
        let Some(dispatcher) = self.super_dispatcher.clone() else {
            return Err(ScriptError::runtime(
                format!("super dispatcher is not configured for event {target}.{event}"),
                pos,
            ));
        };
        debug!(target_id = %target, %event, args = args.len(), "super dispatch");
        dispatcher(self, &target, &event, &args).map_err(|e| e.or_position(pos))?;
        Ok(Value::Null)
    }
}

impl CallContext for Interpreter {
    fn invoke_event(&mut self, target: &str, event: &str, args: Vec<Value>) -> Result<bool> {
        Interpreter::invoke_event(self, target, event, args)
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        let globals = Rc::clone(&self.globals);
        self.call_named(name, args, None, &globals)
    }

    fn current_event(&self) -> Option<(&str, &str)> {
        self.current_event
            .as_ref()
            .map(|(t, e)| (t.as_str(), e.as_str()))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn lookup(scope: &ScopeRef, name: &str, pos: Position) -> Result<BindingRef> {
    scope
        .borrow()
        .lookup(name)
        .ok_or_else(|| ScriptError::runtime(format!("Undefined variable '{name}'"), pos))
}

fn stray(keyword: &str, pos: Position) -> ScriptError {
    ScriptError::runtime(format!("'{keyword}' used outside of a loop"), pos)
}

/// Truncate `n` to an index, `None` when out of `0..len`.
fn index_of(n: f64, len: usize) -> Option<usize> {
    let i = n.trunc();
    (i >= 0.0 && i < len as f64).then_some(i as usize)
}

fn construct(dc: &DataClassDecl, args: Vec<Value>, pos: Option<Position>) -> Result<Value> {
    if args.len() != dc.fields.len() {
        return Err(ScriptError::runtime(
            format!(
                "Expected {} arguments for {} constructor, got {}",
                dc.fields.len(),
                dc.name,
                args.len()
            ),
            pos,
        ));
    }
    let fields = dc.fields.iter().cloned().zip(args).collect();
    Ok(Value::object(Object::with_fields(dc.name.as_str(), fields)))
}

fn binary(op: BinOp, l: Value, r: Value, pos: Position) -> Result<Value> {
    use Value::Number;
    Ok(match (op, l, r) {
        (BinOp::Add, Number(a), Number(b)) => Number(a + b),
        (BinOp::Add, l, r) => Value::Str(format!("{l}{r}")),
        (BinOp::Eq, l, r) => Value::Bool(l == r),
        (BinOp::Ne, l, r) => Value::Bool(l != r),
        (BinOp::And, l, r) => Value::Bool(l.is_truthy() && r.is_truthy()),
        (BinOp::Or, l, r) => Value::Bool(l.is_truthy() || r.is_truthy()),
        (BinOp::Sub, Number(a), Number(b)) => Number(a - b),
        (BinOp::Mul, Number(a), Number(b)) => Number(a * b),
        (BinOp::Div, Number(a), Number(b)) => {
            // Integer division: both sides truncate.
            let divisor = b.trunc() as i64;
            if divisor == 0 {
                return Err(ScriptError::runtime("Division by zero", pos));
            }
            Number((a.trunc() as i64).wrapping_div(divisor) as f64)
        }
        (BinOp::Lt, Number(a), Number(b)) => Value::Bool(a < b),
        (BinOp::Le, Number(a), Number(b)) => Value::Bool(a <= b),
        (BinOp::Gt, Number(a), Number(b)) => Value::Bool(a > b),
        (BinOp::Ge, Number(a), Number(b)) => Value::Bool(a >= b),
        (op, _, _) => {
            return Err(ScriptError::runtime(
                format!("Invalid operands for '{op}'"),
                pos,
            ))
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
