//! dlog-cli: the `dlog` command.
//!
//! One invocation appends one rewritten line to today's daily note. Any
//! first argument that is not a known command is treated as entry text, so
//! `dlog W on PAGE` and `dlog append W on PAGE` are the same invocation.

use std::env;
use std::io::Write;
use std::sync::OnceLock;

use chrono::NaiveDateTime;

pub mod append;
pub mod backend;
pub mod config;
pub mod path;
pub mod rules;
pub mod tools;

/// Captured output of one command run, for tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

static VERSION_STRING: OnceLock<String> = OnceLock::new();

/// Set the version string for `--version` output. Must be called before
/// [`run_from_env`].
pub fn set_version(version: &str) {
    let _ = VERSION_STRING.set(version.to_string());
}

fn get_version() -> &'static str {
    VERSION_STRING.get().map_or("dev", String::as_str)
}

/// Timestamped diagnostic line on stderr, gated by `logging.level: debug`.
pub(crate) fn dbug(stderr: &mut dyn Write, now: NaiveDateTime, text: &str) {
    let _ = writeln!(stderr, "[{}] {text}", now.format("%Y-%m-%d %H:%M:%S"));
}

pub fn run_from_env() -> i32 {
    let args: Vec<String> = env::args().skip(1).collect();
    let backend = backend::FilesystemBackend::new();
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    run_with_args(&args, &backend, &mut stdout, &mut stderr)
}

pub fn run_with_args(
    args: &[String],
    backend: &dyn backend::DlogBackend,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    let command = args.first().map(String::as_str);
    match command {
        None => {
            let _ = writeln!(stderr, "error: no input");
            1
        }
        Some("help") | Some("-h") | Some("--help") => {
            if let Err(err) = write_root_help(stdout) {
                let _ = writeln!(stderr, "{err}");
                return 1;
            }
            0
        }
        Some("--version") => {
            let _ = writeln!(stdout, "dlog version {}", get_version());
            0
        }
        Some("append") => append::run_with_backend(&args[1..], backend, stdout, stderr),
        Some("fixup") => append::run_fixup_with_backend(args, backend, stdout, stderr),
        Some("path") => path::run_with_backend(args, backend, stdout, stderr),
        Some("rules") => rules::run_with_backend(args, backend, stdout, stderr),
        Some("config") => config::run_with_backend(args, backend, stdout, stderr),
        // Anything else is entry text.
        Some(_) => append::run_with_backend(args, backend, stdout, stderr),
    }
}

/// Test harness for the root dispatcher.
pub fn run_for_test(args: &[&str], backend: &dyn backend::DlogBackend) -> CommandOutput {
    let owned_args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = run_with_args(&owned_args, backend, &mut stdout, &mut stderr);
    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    }
}

fn write_root_help(stdout: &mut dyn Write) -> std::io::Result<()> {
    writeln!(stdout, "dlog - append one line to today's daily note")?;
    writeln!(stdout)?;
    writeln!(stdout, "Usage: dlog <entry text...>")?;
    writeln!(stdout)?;
    writeln!(stdout, "Commands:")?;
    writeln!(stdout, "  append <text...>   Append an entry (the default)")?;
    writeln!(stdout, "  fixup              Re-sort today's log section")?;
    writeln!(stdout, "  path               Print today's log file path")?;
    writeln!(stdout, "  rules              List configured rules in order")?;
    writeln!(stdout, "  config             Manage the config file")?;
    writeln!(stdout)?;
    writeln!(stdout, "Entry text may start with a timestamp marker:")?;
    writeln!(stdout, "  09:22|...   log at 09:22")?;
    writeln!(stdout, "  0922|...    same, colon inferred")?;
    writeln!(stdout, "  -15|...     15 minutes ago (also -2h|, -1h30m|)")?;
    Ok(())
}
