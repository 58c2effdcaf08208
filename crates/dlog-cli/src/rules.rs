//! `dlog rules`: list the configured substitution rules in registration
//! order, the order they will run in.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::Serialize;

use crate::backend::DlogBackend;
use crate::config;
use crate::tools::ToolCache;
use crate::CommandOutput;

#[derive(Debug, Serialize)]
struct RuleInfo {
    kind: &'static str,
    #[serde(rename = "match")]
    pattern: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    replace: Option<String>,
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
    for arg in args.iter().filter(|arg| *arg != "rules") {
        match arg.as_str() {
            "--json" => json = true,
            other => return Err(format!("error: unknown argument for rules: '{other}'")),
        }
    }

    let loaded = config::load_config(backend)?;
    let cache = Rc::new(RefCell::new(ToolCache::new()));
    let formatter = config::build_engine(&loaded.file, backend.tool_runner(), cache)?;
    let rules = formatter.rules();

    if json {
        let mut infos: Vec<RuleInfo> = Vec::new();
        for rule in rules.prefix_rules() {
            infos.push(RuleInfo {
                kind: "prefix",
                pattern: rule.prefix().to_string(),
                replace: Some(rule.replacement().to_string()),
            });
        }
        for rule in rules.general_rules() {
            infos.push(RuleInfo {
                kind: rule.kind().slug(),
                pattern: rule.key().to_string(),
                replace: rule.replacement_literal().map(str::to_string),
            });
        }
        serde_json::to_writer_pretty(&mut *stdout, &infos).map_err(|err| err.to_string())?;
        writeln!(stdout).map_err(|err| err.to_string())?;
        return Ok(());
    }

    for rule in rules.prefix_rules() {
        writeln!(
            stdout,
            "prefix({:?} => {:?})",
            rule.prefix(),
            rule.replacement()
        )
        .map_err(|err| err.to_string())?;
    }
    for rule in rules.general_rules() {
        writeln!(stdout, "{}", rule.summary()).map_err(|err| err.to_string())?;
    }
    Ok(())
}
