//! Command-line argument parsing.
//!
//! Usage:
//!   sms [-c] [-n | --init <PATH>] [-e <SOURCE>]... [<FILE>]...
//!       [--invoke <target.event> [--arg <VALUE>]...] [--project-root <DIR>]

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use directories::ProjectDirs;

use crate::script::HostValue;

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(name = "sms", version, about = "Run SMS scripts")]
pub struct CliArgs {
    /// Script files, executed in order against a single engine
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Execute inline source (repeatable; runs after the files)
    #[arg(long = "eval", short = 'e', value_name = "SOURCE")]
    pub eval: Vec<String>,

    /// Only check syntax; run nothing
    #[arg(long, short = 'c')]
    pub check: bool,

    /// Dispatch an event once all scripts have run
    #[arg(long, value_name = "TARGET.EVENT")]
    pub invoke: Option<String>,

    /// Argument for --invoke (repeatable): null, true, false, a number, or text
    #[arg(long = "arg", value_name = "VALUE", requires = "invoke")]
    pub args: Vec<String>,

    /// Root directory for projectFs() (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub project_root: Option<PathBuf>,

    /// Skip the init script
    #[arg(long, short = 'n')]
    pub no_init: bool,

    /// Load this init script instead of searching for one
    #[arg(long, value_name = "PATH", conflicts_with = "no_init")]
    pub init: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// How to choose the init script.
#[derive(Debug, PartialEq, Eq)]
pub enum InitScript {
    /// `$SMS_INIT`, then `<config dir>/init.sms`, then `./.smsrc`.
    Search,
    /// `-n`: no init script.
    Skip,
    /// `--init <PATH>`.
    Explicit(PathBuf),
}

impl CliArgs {
    pub fn init_script(&self) -> InitScript {
        match (&self.init, self.no_init) {
            (Some(path), _) => InitScript::Explicit(path.clone()),
            (None, true) => InitScript::Skip,
            (None, false) => InitScript::Search,
        }
    }

    /// The `--invoke` target split into `(target, event)`, with its arguments.
    pub fn invocation(&self) -> Result<Option<(String, String, Vec<HostValue>)>, String> {
        let Some(spec) = &self.invoke else {
            return Ok(None);
        };
        let (target, event) = parse_event_spec(spec)?;
        let args = self.args.iter().map(|a| parse_host_value(a)).collect();
        Ok(Some((target, event, args)))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`; exits with a usage message on error.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}

/// `"target.event"` → `("target", "event")`.
pub fn parse_event_spec(spec: &str) -> Result<(String, String), String> {
    match spec.split_once('.') {
        Some((t, e)) if !t.is_empty() && !e.is_empty() && !e.contains('.') => {
            Ok((t.to_owned(), e.to_owned()))
        }
        _ => Err(format!("invalid event '{spec}': expected <target>.<event>")),
    }
}

/// Interpret a command-line literal as a host value.
pub fn parse_host_value(raw: &str) -> HostValue {
    match raw {
        "null" => HostValue::Null,
        "true" => HostValue::Bool(true),
        "false" => HostValue::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => HostValue::Number(n),
            _ => HostValue::String(raw.to_owned()),
        },
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Search for the init script in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_init_script() -> Option<PathBuf> {
    init_candidates(std::env::var_os("SMS_INIT"))
        .into_iter()
        .find(|p| p.is_file())
}

/// Init-script locations in priority order.
pub fn init_candidates(env_override: Option<OsString>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(p) = env_override.filter(|p| !p.is_empty()) {
        candidates.push(PathBuf::from(p));
    }
    if let Some(dirs) = ProjectDirs::from("", "", "sms") {
        candidates.push(dirs.config_dir().join("init.sms"));
    }
    candidates.push(PathBuf::from("./.smsrc"));
    candidates
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("sms").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn empty_args() {
        let a = parse(&[]);
        assert!(a.files.is_empty());
        assert!(!a.check);
        assert_eq!(a.init_script(), InitScript::Search);
        assert_eq!(a.invocation().unwrap(), None);
    }

    #[test]
    fn files_and_eval() {
        let a = parse(&["a.sms", "-e", "print(1)", "b.sms", "--eval", "2"]);
        assert_eq!(a.files, vec![PathBuf::from("a.sms"), PathBuf::from("b.sms")]);
        assert_eq!(a.eval, vec!["print(1)", "2"]);
    }

    #[test]
    fn init_selection() {
        assert_eq!(parse(&["-n"]).init_script(), InitScript::Skip);
        assert_eq!(
            parse(&["--init", "x.sms"]).init_script(),
            InitScript::Explicit("x.sms".into())
        );
        assert!(CliArgs::try_parse_from(["sms", "-n", "--init", "x.sms"]).is_err());
    }

    #[test]
    fn invoke_with_args() {
        let a = parse(&["--invoke", "btn.click", "--arg", "3", "--arg", "hi", "--arg", "null"]);
        let (t, e, args) = a.invocation().unwrap().unwrap();
        assert_eq!((t.as_str(), e.as_str()), ("btn", "click"));
        assert_eq!(
            args,
            vec![HostValue::Number(3.0), HostValue::from("hi"), HostValue::Null]
        );
    }

    #[test]
    fn arg_requires_invoke() {
        assert!(CliArgs::try_parse_from(["sms", "--arg", "1"]).is_err());
    }

    #[test]
    fn bad_event_spec() {
        assert!(parse_event_spec("click").is_err());
        assert!(parse_event_spec(".click").is_err());
        assert!(parse_event_spec("a.b.c").is_err());
        let a = parse(&["--invoke", "nodot"]);
        assert!(a.invocation().is_err());
    }

    #[test]
    fn host_value_literals() {
        assert_eq!(parse_host_value("true"), HostValue::Bool(true));
        assert_eq!(parse_host_value("-2.5"), HostValue::Number(-2.5));
        assert_eq!(parse_host_value("inf"), HostValue::from("inf"));
        assert_eq!(parse_host_value("True"), HostValue::from("True"));
    }

    #[test]
    fn init_search_order() {
        let c = init_candidates(Some("custom.sms".into()));
        assert_eq!(c.first(), Some(&PathBuf::from("custom.sms")));
        assert_eq!(c.last(), Some(&PathBuf::from("./.smsrc")));
        let c = init_candidates(Some(OsString::new()));
        assert_ne!(c.first(), Some(&PathBuf::new()));
    }
}
