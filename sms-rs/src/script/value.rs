//! Runtime value model for SMS scripts.
//!
//! Numbers, strings, booleans and null are plain values and copy on
//! assignment.  Arrays and objects are shared handles
//! (`Rc<RefCell<…>>`): two bindings holding the same array alias one
//! underlying sequence, and mutation through either is visible through both.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::error::Result;
use super::interp::CallContext;

pub type ArrayRef = Rc<RefCell<Vec<Value>>>;
pub type ObjectRef = Rc<RefCell<Object>>;

/// An SMS runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
    #[default]
    Null,
    Array(ArrayRef),
    Object(ObjectRef),
    Native(NativeFunction),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(obj: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(obj)))
    }

    pub fn native(f: NativeFunction) -> Self {
        Value::Native(f)
    }

    /// Numbers are truthy when non-zero, strings and arrays when non-empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null => false,
            Value::Array(a) => !a.borrow().is_empty(),
            Value::Object(_) | Value::Native(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Native(_) => "native-function",
        }
    }
}

/// Plain values compare by content; arrays, objects and natives by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a == b,
            _ => false,
        }
    }
}

/// Whole numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Display text of a boolean; capitalized, unlike the `true`/`false` literals.
pub fn bool_text(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => f.write_str(bool_text(*b)),
            Value::Null => f.write_str("null"),
            Value::Array(a) => {
                f.write_str("[")?;
                for (i, item) in a.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(o) => {
                let o = o.borrow();
                write!(f, "{}{{", o.class_name)?;
                for (i, (name, value)) in o.fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}={value}")?;
                }
                f.write_str("}")
            }
            Value::Native(_) => f.write_str("<native-function>"),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// ── Object ────────────────────────────────────────────────────────────────────

type FieldGetter = Rc<dyn Fn() -> Value>;
type FieldSetter = Rc<dyn Fn(Value)>;

/// A class-tagged record with ordered fields.
///
/// Host code may attach per-field getter/setter callbacks; reads and writes
/// of such fields go through the callback instead of the stored map.
#[derive(Default)]
pub struct Object {
    pub class_name: String,
    fields: Vec<(String, Value)>,
    getters: HashMap<String, FieldGetter>,
    setters: HashMap<String, FieldSetter>,
}

impl Object {
    pub fn new(class_name: impl Into<String>) -> Self {
        Object {
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    pub fn with_fields(class_name: impl Into<String>, fields: Vec<(String, Value)>) -> Self {
        Object {
            class_name: class_name.into(),
            fields,
            ..Default::default()
        }
    }

    /// Builder form of [`Object::set_stored`].
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_stored(name.into(), value.into());
        self
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn stored(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replace a stored field, appending it when absent.
    pub fn set_stored(&mut self, name: String, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn define_getter(&mut self, name: impl Into<String>, getter: impl Fn() -> Value + 'static) {
        self.getters.insert(name.into(), Rc::new(getter));
    }

    pub fn define_setter(&mut self, name: impl Into<String>, setter: impl Fn(Value) + 'static) {
        self.setters.insert(name.into(), Rc::new(setter));
    }

    /// Read a field: dynamic getter first, then stored value, else null.
    ///
    /// The callback runs after the object borrow is released, so it may
    /// itself touch the object.
    pub fn get(this: &ObjectRef, name: &str) -> Value {
        let getter = this.borrow().getters.get(name).cloned();
        match getter {
            Some(g) => g(),
            None => this.borrow().stored(name).cloned().unwrap_or_default(),
        }
    }

    /// Write a field through its dynamic setter, or store it.
    pub fn set(this: &ObjectRef, name: &str, value: Value) {
        let setter = this.borrow().setters.get(name).cloned();
        match setter {
            Some(s) => s(value),
            None => this.borrow_mut().set_stored(name.to_owned(), value),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class_name", &self.class_name)
            .field("fields", &self.fields)
            .field("dynamic_getters", &self.getters.keys().collect::<Vec<_>>())
            .field("dynamic_setters", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ── NativeFunction ────────────────────────────────────────────────────────────

type NativeFn = dyn Fn(&mut dyn CallContext, &[Value]) -> Result<Value>;

/// A host-implemented callable.
///
/// Natives receive a [`CallContext`] so they can dispatch events or call
/// script functions re-entrantly.  Equality is identity of the shared
/// closure.
#[derive(Clone)]
pub struct NativeFunction(Rc<NativeFn>);

impl NativeFunction {
    pub fn new(f: impl Fn(&mut dyn CallContext, &[Value]) -> Result<Value> + 'static) -> Self {
        NativeFunction(Rc::new(f))
    }

    /// A native that does not need the call context.
    pub fn simple(f: impl Fn(&[Value]) -> Result<Value> + 'static) -> Self {
        NativeFunction(Rc::new(move |_: &mut dyn CallContext, args: &[Value]| f(args)))
    }

    pub fn call(&self, ctx: &mut dyn CallContext, args: &[Value]) -> Result<Value> {
        (self.0)(ctx, args)
    }
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Rc::as_ptr(&self.0) as *const (),
            Rc::as_ptr(&other.0) as *const (),
        )
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native-function>")
    }
}

// ── Host bridging ─────────────────────────────────────────────────────────────

/// A value on the host side of the engine boundary.
///
/// Converting a [`Value`] into a `HostValue` deep-copies arrays and objects;
/// converting back allocates fresh shared handles.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<HostValue>),
    /// Ordered key/value pairs; scripts see it as an object of class `Map`.
    Map(Vec<(String, HostValue)>),
    Function(NativeFunction),
}

impl HostValue {
    /// One-way bridge for any other host type: its display string.
    pub fn display(value: &impl fmt::Display) -> Self {
        HostValue::String(value.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Null => f.write_str("null"),
            HostValue::Bool(b) => f.write_str(bool_text(*b)),
            HostValue::Number(n) => f.write_str(&format_number(*n)),
            HostValue::String(s) => f.write_str(s),
            HostValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            HostValue::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            HostValue::Function(_) => f.write_str("<native-function>"),
        }
    }
}

impl From<&Value> for HostValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Number(n) => HostValue::Number(*n),
            Value::Str(s) => HostValue::String(s.clone()),
            Value::Bool(b) => HostValue::Bool(*b),
            Value::Null => HostValue::Null,
            Value::Array(a) => HostValue::List(a.borrow().iter().map(HostValue::from).collect()),
            Value::Object(o) => HostValue::Map(
                o.borrow()
                    .fields()
                    .iter()
                    .map(|(k, v)| (k.clone(), HostValue::from(v)))
                    .collect(),
            ),
            Value::Native(f) => HostValue::Function(f.clone()),
        }
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        HostValue::from(&value)
    }
}

impl From<HostValue> for Value {
    fn from(value: HostValue) -> Self {
        match value {
            HostValue::Null => Value::Null,
            HostValue::Bool(b) => Value::Bool(b),
            HostValue::Number(n) => Value::Number(n),
            HostValue::String(s) => Value::Str(s),
            HostValue::List(items) => Value::array(items.into_iter().map(Value::from).collect()),
            HostValue::Map(entries) => Value::object(Object::with_fields(
                "Map",
                entries.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            )),
            HostValue::Function(f) => Value::Native(f),
        }
    }
}

impl From<()> for HostValue {
    fn from(_: ()) -> Self {
        HostValue::Null
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

macro_rules! host_number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for HostValue {
            fn from(n: $t) -> Self {
                HostValue::Number(n as f64)
            }
        })*
    };
}

host_number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(HostValue::Null, Into::into)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(items: Vec<T>) -> Self {
        HostValue::List(items.into_iter().map(Into::into).collect())
    }
}
