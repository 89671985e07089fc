//! SMS abstract syntax tree.
//!
//! Every statement and expression node carries the [`Position`] of its first
//! token.  Declarations that the interpreter hoists or stores (functions,
//! data classes, event handlers, accessors) are wrapped in [`Rc`] so a scope
//! or handler table can hold them without cloning whole subtrees.

use std::fmt;
use std::rc::Rc;

use super::position::Position;

/// A parsed program: the ordered list of top-level statements.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

// ── Statements ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    /// `var name = init [get() = expr] [set(p) = expr]`
    Var {
        name: String,
        init: Expr,
        getter: Option<Rc<Accessor>>,
        setter: Option<Rc<Accessor>>,
    },
    /// `target = value` used as a statement.
    Assign { target: Expr, value: Expr },
    Expr(Expr),
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    /// `for (init; cond; update) { body }`; every clause is optional.
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    /// `for (var in iterable) { body }`
    ForIn {
        var: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },
    Break,
    Continue,
    Return(Option<Expr>),
    Fun(Rc<FunctionDecl>),
    DataClass(Rc<DataClassDecl>),
    On(Rc<EventHandlerDecl>),
}

/// A `get() = expr` or `set(param) = expr` accessor body.
#[derive(Debug, Clone)]
pub struct Accessor {
    /// Setter parameter name; `None` for getters.
    pub param: Option<String>,
    pub body: Expr,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

#[derive(Debug, Clone)]
pub struct DataClassDecl {
    pub name: String,
    pub fields: Vec<String>,
    pub pos: Position,
}

/// `on target.event(params) { body }`
#[derive(Debug, Clone)]
pub struct EventHandlerDecl {
    pub target: String,
    pub event: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub pos: Position,
}

impl EventHandlerDecl {
    /// Handler-table key, `"target.event"`.
    pub fn key(&self) -> String {
        event_key(&self.target, &self.event)
    }
}

pub fn event_key(target: &str, event: &str) -> String {
    format!("{target}.{event}")
}

// ── Expressions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Position,
}

impl Expr {
    pub fn new(kind: ExprKind, pos: Position) -> Self {
        Expr { kind, pos }
    }

    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        )
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    Str(String),
    Interpolated(Vec<StringPart>),
    Bool(bool),
    Null,
    Ident(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Postfix(PostfixOp, Box<Expr>),
    /// Bare-name call: `name(args)`.
    Call { name: String, args: Vec<Expr> },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    Member { receiver: Box<Expr>, name: String },
    Assign { target: Box<Expr>, value: Box<Expr> },
    Index { receiver: Box<Expr>, index: Box<Expr> },
    Array(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    When {
        subject: Option<Box<Expr>>,
        branches: Vec<WhenBranch>,
    },
}

#[derive(Debug, Clone)]
pub enum StringPart {
    Text(String),
    Expr(Expr),
}

/// One `cond -> result` arm; `cond` is `None` for the `else` arm.
#[derive(Debug, Clone)]
pub struct WhenBranch {
    pub cond: Option<Expr>,
    pub result: Expr,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl PostfixOp {
    pub fn delta(self) -> f64 {
        match self {
            PostfixOp::Increment => 1.0,
            PostfixOp::Decrement => -1.0,
        }
    }
}
