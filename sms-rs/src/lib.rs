//! SMS: a small embeddable scripting language for event-driven host
//! applications.
//!
//! - [`script`]: lexer, parser, tree-walking interpreter and the
//!   [`ScriptEngine`](script::ScriptEngine) façade
//! - [`project_fs`]: a root-confined file system scripts may use
//! - [`cli`]: argument parsing and init-script discovery for the `sms` binary

pub mod cli;
pub mod project_fs;
pub mod script;
