//! The SMS scripting language.
//!
//! A front-to-back pipeline for a small event-driven language:
//!
//! - [`lexer`] turns source into [`token`]s, with newlines as separators and
//!   `${expr}` / `$name` string interpolation
//! - [`parser`] builds an [`ast::Program`] by recursive descent
//! - [`interp`] walks the tree against a parent-linked [`scope`] chain
//! - [`engine`] wraps it all for host applications
//!
//! # Quick start
//!
//! ```rust
//! use sms::script::{ScriptEngine, Value};
//!
//! let mut engine = ScriptEngine::new();
//! engine.execute("var clicks = 0\non button.click() { clicks++ }").unwrap();
//! engine.invoke_event("button", "click", &[]).unwrap();
//! assert_eq!(engine.execute("clicks").unwrap(), Value::Number(1.0));
//! ```

pub mod ast;
pub mod builtins;
pub mod engine;
pub mod error;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod scope;
pub mod token;
pub mod value;

/// Remaining stack below which recursive parsing and evaluation continue
/// on a freshly allocated segment.
pub(crate) const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each extra stack segment.
pub(crate) const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

// Re-exports for convenience.
pub use builtins::NativeFunctionRegistry;
pub use engine::ScriptEngine;
pub use error::{ErrorKind, Result, ScriptError};
pub use interp::{CallContext, ControlFlow, Interpreter};
pub use position::Position;
pub use value::{HostValue, NativeFunction, Object, Value};
