//! `dlog path`: print the resolved daily log path for today.

use std::io::Write;

use serde::Serialize;

use dlog_core::error::VaultError;
use dlog_core::vault::{daily_log_path, expand_tilde};

use crate::backend::DlogBackend;
use crate::config;
use crate::CommandOutput;

#[derive(Debug, Serialize)]
struct PathResult {
    path: String,
    exists: bool,
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
    match execute(args, backend, stdout) {
        Ok(()) => 0,
        Err(message) => {
            let _ = writeln!(stderr, "{message}");
            1
        }
    }
}

fn execute(
    args: &[String],
    backend: &dyn DlogBackend,
    stdout: &mut dyn Write,
) -> Result<(), String> {
    let mut json = false;
    for arg in args.iter().filter(|arg| *arg != "path") {
        match arg.as_str() {
            "--json" => json = true,
            other => return Err(format!("error: unknown argument for path: '{other}'")),
        }
    }

    let loaded = config::load_config(backend)?;
    let root_raw = loaded
        .file
        .vault_root
        .as_deref()
        .ok_or_else(|| VaultError::RootNotConfigured.to_string())?;
    let root = expand_tilde(root_raw, backend.home_dir().as_deref());
    if !backend.dir_exists(&root) {
        return Err(VaultError::RootMissing(root.display().to_string()).to_string());
    }
    let date = backend.now().date();
    let path = daily_log_path(&root, &loaded.file.daily_log, date)
        .ok_or_else(|| format!("invalid daily_log template: '{}'", loaded.file.daily_log))?;

    if json {
        let result = PathResult {
            path: path.display().to_string(),
            exists: backend.file_exists(&path),
        };
        serde_json::to_writer_pretty(&mut *stdout, &result).map_err(|err| err.to_string())?;
        writeln!(stdout).map_err(|err| err.to_string())?;
        return Ok(());
    }
    writeln!(stdout, "{}", path.display()).map_err(|err| err.to_string())?;
    Ok(())
}
