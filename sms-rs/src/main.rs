use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crossterm::style::Stylize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sms::cli::{self, CliArgs, InitScript};
use sms::project_fs::{self, ProjectFs};
use sms::script::{HostValue, ScriptEngine, ScriptError, Value};

/// Why a run stopped early; selects the exit status.
enum Failure {
    /// A lex, parse or runtime error in `origin` (exit 1).
    Script { origin: String, error: ScriptError },
    /// Unreadable input or bad usage (exit 2).
    Io(String),
}

/// A piece of source and where it came from.
struct Source {
    origin: String,
    text: String,
    /// Print a non-null result (`-e`).
    echo: bool,
}

fn main() -> ExitCode {
    let args = cli::parse_args();
    init_logging(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Script { origin, error }) => {
            report(&format!("{origin}: {error}"));
            ExitCode::from(1)
        }
        Err(Failure::Io(msg)) => {
            report(&msg);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(args: &CliArgs) -> Result<(), Failure> {
    // Resolve the invocation up front so a malformed --invoke fails before
    // any script has side effects.
    let invocation = args.invocation().map_err(Failure::Io)?;
    let sources = collect_sources(args)?;

    if args.check {
        let engine = ScriptEngine::new();
        for src in &sources {
            engine.validate_syntax(&src.text).map_err(|error| Failure::Script {
                origin: src.origin.clone(),
                error,
            })?;
            println!("{}: syntax OK", src.origin);
        }
        return Ok(());
    }

    let mut engine = ScriptEngine::new();
    install_project_fs(&mut engine, args.project_root.as_deref())?;
    engine.set_super_dispatcher(|target, event, values| {
        let shown: Vec<String> = values.iter().map(HostValue::to_string).collect();
        info!(target_id = target, event, "super dispatch");
        println!("super: {target}.{event}({})", shown.join(", "));
    });

    for src in &sources {
        debug!(origin = %src.origin, "running");
        let value = engine.execute(&src.text).map_err(|error| Failure::Script {
            origin: src.origin.clone(),
            error,
        })?;
        if src.echo && value != Value::Null {
            println!("{value}");
        }
    }

    if let Some((target, event, event_args)) = invocation {
        let origin = format!("{target}.{event}");
        let handled = engine
            .invoke_event(&target, &event, &event_args)
            .map_err(|error| Failure::Script {
                origin: origin.clone(),
                error,
            })?;
        if !handled {
            warn!(event = %origin, "no handler registered");
            report(&format!("no handler for {origin}"));
        }
    }
    Ok(())
}

/// Init script (unless checking), then files, then `-e` snippets.
fn collect_sources(args: &CliArgs) -> Result<Vec<Source>, Failure> {
    let mut sources = Vec::new();

    if !args.check {
        let init = match args.init_script() {
            InitScript::Skip => None,
            InitScript::Explicit(path) => Some(path),
            InitScript::Search => cli::find_init_script(),
        };
        if let Some(path) = init {
            debug!(path = %path.display(), "init script");
            sources.push(read_source(&path)?);
        }
    }

    for path in &args.files {
        sources.push(read_source(path)?);
    }
    for (i, text) in args.eval.iter().enumerate() {
        sources.push(Source {
            origin: format!("-e #{}", i + 1),
            text: text.clone(),
            echo: true,
        });
    }
    Ok(sources)
}

fn read_source(path: &Path) -> Result<Source, Failure> {
    let text = fs::read_to_string(path)
        .map_err(|e| Failure::Io(format!("can't read {}: {e}", path.display())))?;
    Ok(Source {
        origin: path.display().to_string(),
        text,
        echo: false,
    })
}

fn install_project_fs(engine: &mut ScriptEngine, root: Option<&Path>) -> Result<(), Failure> {
    let root: PathBuf = match root {
        Some(r) => r.to_path_buf(),
        None => std::env::current_dir()
            .map_err(|e| Failure::Io(format!("can't determine current directory: {e}")))?,
    };
    let project = ProjectFs::new(&root)
        .map_err(|e| Failure::Io(format!("project root {}: {e}", root.display())))?;
    project_fs::install(engine, project);
    Ok(())
}

/// Print a diagnostic to stderr, highlighted when it is a terminal.
fn report(msg: &str) {
    let mut err = io::stderr().lock();
    let prefix = if err.is_terminal() {
        "sms:".red().bold().to_string()
    } else {
        "sms:".to_owned()
    };
    // Nothing useful to do if stderr itself is gone.
    let _ = writeln!(err, "{prefix} {msg}");
}
