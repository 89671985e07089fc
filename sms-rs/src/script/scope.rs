//! Parent-linked lexical scope chain.
//!
//! Each scope holds three independent namespaces: variables, functions and
//! data classes.  Lookups walk towards the root; the innermost definition
//! wins.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::ast::{Accessor, DataClassDecl, FunctionDecl};
use super::value::Value;

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A variable slot: its stored value plus optional accessors.
#[derive(Debug, Clone, Default)]
pub struct VariableBinding {
    pub value: Value,
    pub getter: Option<Rc<Accessor>>,
    pub setter: Option<Rc<Accessor>>,
}

/// Bindings are shared so an accessor can write `field` back after the
/// scope that found it has been released.
pub type BindingRef = Rc<RefCell<VariableBinding>>;

#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, BindingRef>,
    functions: HashMap<String, Rc<FunctionDecl>>,
    data_classes: HashMap<String, Rc<DataClassDecl>>,
    parent: Option<ScopeRef>,
}

impl Scope {
    pub fn root() -> ScopeRef {
        Rc::new(RefCell::new(Scope::default()))
    }

    pub fn child(parent: &ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(Rc::clone(parent)),
            ..Default::default()
        }))
    }

    /// Define (or redefine) `name` in this scope.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.define_binding(
            name,
            VariableBinding {
                value,
                ..Default::default()
            },
        );
    }

    pub fn define_binding(&mut self, name: impl Into<String>, binding: VariableBinding) {
        self.variables
            .insert(name.into(), Rc::new(RefCell::new(binding)));
    }

    pub fn lookup(&self, name: &str) -> Option<BindingRef> {
        match self.variables.get(name) {
            Some(b) => Some(Rc::clone(b)),
            None => self.parent.as_ref()?.borrow().lookup(name),
        }
    }

    /// Binding defined directly in this scope, ignoring parents.
    pub fn local(&self, name: &str) -> Option<BindingRef> {
        self.variables.get(name).cloned()
    }

    pub fn define_function(&mut self, decl: Rc<FunctionDecl>) {
        self.functions.insert(decl.name.clone(), decl);
    }

    pub fn function(&self, name: &str) -> Option<Rc<FunctionDecl>> {
        match self.functions.get(name) {
            Some(f) => Some(Rc::clone(f)),
            None => self.parent.as_ref()?.borrow().function(name),
        }
    }

    pub fn define_data_class(&mut self, decl: Rc<DataClassDecl>) {
        self.data_classes.insert(decl.name.clone(), decl);
    }

    pub fn data_class(&self, name: &str) -> Option<Rc<DataClassDecl>> {
        match self.data_classes.get(name) {
            Some(d) => Some(Rc::clone(d)),
            None => self.parent.as_ref()?.borrow().data_class(name),
        }
    }
}
