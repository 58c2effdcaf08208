//! The append orchestrator: format the entry, resolve today's note, merge
//! it into the `# Log` section, echo the final line.
//!
//! Also hosts `fixup`, which re-sorts and dedups today's section without
//! adding anything.
//!
//! Exit codes are distinct per failure class: 1 for empty input (and every
//! other error), 2 for an input that formats to an empty entry.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::NaiveDate;

use dlog_core::error::{SectionError, VaultError};
use dlog_core::section::merge_entry;
use dlog_core::vault::{daily_log_path, expand_tilde};

use crate::backend::DlogBackend;
use crate::config::{self, ConfigFile, LoadedConfig};
use crate::tools::ToolCache;
use crate::{dbug, CommandOutput};

/// A command failure with its process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub exit_code: i32,
    pub message: String,
}

impl From<String> for CommandFailure {
    fn from(message: String) -> Self {
        Self {
            exit_code: 1,
            message,
        }
    }
}

pub fn run_for_test(args: &[&str], backend: &dyn DlogBackend) -> CommandOutput {
    let owned_args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = run_with_backend(&owned_args, backend, &mut stdout, &mut stderr);
    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    }
}

pub fn run_with_backend(
    args: &[String],
    backend: &dyn DlogBackend,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match execute(args, backend, stdout, stderr) {
        Ok(()) => 0,
        Err(failure) => {
            let _ = writeln!(stderr, "{}", failure.message);
            failure.exit_code
        }
    }
}

fn execute(
    args: &[String],
    backend: &dyn DlogBackend,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<(), CommandFailure> {
    let input = args.join(" ").trim().to_string();
    if input.is_empty() {
        return Err(CommandFailure {
            exit_code: 1,
            message: "error: no input".to_string(),
        });
    }

    let loaded = config::load_config(backend)?;
    let debug = loaded.file.logging.is_debug();
    if debug {
        dbug(
            stderr,
            backend.now(),
            &format!("config: {}", loaded.path.display()),
        );
    }

    let cache = Rc::new(RefCell::new(ToolCache::new()));
    let formatter = config::build_engine(&loaded.file, backend.tool_runner(), cache)?;

    let now = backend.now();
    let entry = formatter.format(&input, now, now);
    if entry.trim().is_empty() {
        return Err(CommandFailure {
            exit_code: 2,
            message: "error: entry was blank".to_string(),
        });
    }

    let log_path = resolve_log_path(backend, &loaded.file, now.date())?;
    if debug {
        dbug(
            stderr,
            backend.now(),
            &format!("appending to {}", log_path.display()),
        );
    }

    merge_into_file(backend, &log_path, &entry)?;
    writeln!(stdout, "{entry}").map_err(|err| CommandFailure::from(err.to_string()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// fixup
// ---------------------------------------------------------------------------

pub fn run_fixup_for_test(args: &[&str], backend: &dyn DlogBackend) -> CommandOutput {
    let owned_args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let exit_code = run_fixup_with_backend(&owned_args, backend, &mut stdout, &mut stderr);
    CommandOutput {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_code,
    }
}

/// Re-sorts and dedups today's `# Log` section without adding an entry.
pub fn run_fixup_with_backend(
    args: &[String],
    backend: &dyn DlogBackend,
    _stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match execute_fixup(args, backend) {
        Ok(()) => 0,
        Err(failure) => {
            let _ = writeln!(stderr, "{}", failure.message);
            failure.exit_code
        }
    }
}

fn execute_fixup(args: &[String], backend: &dyn DlogBackend) -> Result<(), CommandFailure> {
    let extra: Vec<&String> = args.iter().filter(|arg| *arg != "fixup").collect();
    if !extra.is_empty() {
        return Err(CommandFailure::from(format!(
            "error: unknown argument for fixup: '{}'",
            extra[0]
        )));
    }
    let loaded: LoadedConfig = config::load_config(backend)?;
    let log_path = resolve_log_path(backend, &loaded.file, backend.now().date())?;
    merge_into_file(backend, &log_path, "")
}

// ---------------------------------------------------------------------------
// Shared resolution
// ---------------------------------------------------------------------------

/// Resolves today's log file: vault root must be configured and exist, the
/// dated note must already exist (dlog never creates it).
pub(crate) fn resolve_log_path(
    backend: &dyn DlogBackend,
    cfg: &ConfigFile,
    date: NaiveDate,
) -> Result<PathBuf, CommandFailure> {
    let root_raw = cfg
        .vault_root
        .as_deref()
        .ok_or_else(|| CommandFailure::from(VaultError::RootNotConfigured.to_string()))?;
    let root = expand_tilde(root_raw, backend.home_dir().as_deref());
    if !backend.dir_exists(&root) {
        return Err(CommandFailure::from(
            VaultError::RootMissing(root.display().to_string()).to_string(),
        ));
    }
    let path = daily_log_path(&root, &cfg.daily_log, date).ok_or_else(|| {
        CommandFailure::from(format!("invalid daily_log template: '{}'", cfg.daily_log))
    })?;
    if !backend.file_exists(&path) {
        return Err(CommandFailure::from(
            VaultError::LogMissing {
                date: date.format("%Y-%m-%d").to_string(),
                path: path.display().to_string(),
            }
            .to_string(),
        ));
    }
    Ok(path)
}

fn merge_into_file(
    backend: &dyn DlogBackend,
    path: &std::path::Path,
    entry: &str,
) -> Result<(), CommandFailure> {
    let content = backend.read_file(path)?;
    let updated = merge_entry(&content, entry).ok_or_else(|| {
        CommandFailure::from(SectionError::SectionNotFound(path.display().to_string()).to_string())
    })?;
    backend.write_file(path, &updated)?;
    Ok(())
}
