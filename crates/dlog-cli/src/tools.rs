//! External tool resolution and invocation for tool-backed substitutions.
//!
//! Tool paths are resolved at most once per invocation through a
//! [`ToolCache`] owned by the orchestrator; negative lookups are cached
//! too, so a missing tool is probed a single time. Invocation is a blocking
//! subprocess call with no timeout.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;

use dlog_core::rules::{ComputedReplacement, ReplacementOutcome};
use dlog_core::vault::expand_tilde;

/// Captured result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub exit_code: i32,
}

impl ToolOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Seam for locating and running external tools.
pub trait ToolRunner {
    /// Locates an executable: commands containing `/` are tilde-expanded and
    /// checked directly, bare names are searched on `PATH`.
    fn resolve(&self, command: &str) -> Option<PathBuf>;

    /// Runs the executable, blocking until it exits.
    fn run(&self, path: &Path, args: &[String]) -> Result<ToolOutput, String>;
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// A resolved-or-known-missing cache slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedTool {
    Resolved(PathBuf),
    Missing,
}

/// Explicit tool-path cache, owned by the orchestrator and shared with the
/// tool-backed rules for one invocation. Never a process-wide static.
#[derive(Debug, Default)]
pub struct ToolCache {
    entries: HashMap<String, CachedTool>,
}

impl ToolCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `command` through the cache, remembering misses.
    pub fn resolve(&mut self, runner: &dyn ToolRunner, command: &str) -> Option<PathBuf> {
        match self.entries.get(command) {
            Some(CachedTool::Resolved(path)) => return Some(path.clone()),
            Some(CachedTool::Missing) => return None,
            None => {}
        }
        match runner.resolve(command) {
            Some(path) => {
                self.entries
                    .insert(command.to_string(), CachedTool::Resolved(path.clone()));
                Some(path)
            }
            None => {
                self.entries
                    .insert(command.to_string(), CachedTool::Missing);
                None
            }
        }
    }

    #[must_use]
    pub fn lookup(&self, command: &str) -> Option<&CachedTool> {
        self.entries.get(command)
    }
}

// ---------------------------------------------------------------------------
// Replacement wiring
// ---------------------------------------------------------------------------

/// Configured shape of a tool-backed substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub command: String,
    pub args: Vec<String>,
    pub on_error: Option<String>,
    pub on_empty: Option<String>,
}

/// Builds the replacement callback for a tool-backed rule. Outcome mapping:
/// unresolvable tool → occurrence left unchanged; non-zero exit →
/// `on_error` text (or unchanged); empty stdout → `on_empty` text (or
/// unchanged); success → trimmed stdout.
#[must_use]
pub fn tool_replacement(
    runner: Rc<dyn ToolRunner>,
    cache: Rc<RefCell<ToolCache>>,
    spec: ToolSpec,
) -> ComputedReplacement {
    Box::new(move |_entry, _matched| {
        let resolved = cache.borrow_mut().resolve(runner.as_ref(), &spec.command);
        let Some(path) = resolved else {
            return ReplacementOutcome::NoOp;
        };
        let output = match runner.run(&path, &spec.args) {
            Ok(output) => output,
            Err(_) => return fallback(spec.on_error.as_deref()),
        };
        if !output.success() {
            return fallback(spec.on_error.as_deref());
        }
        let stdout = output.stdout.trim();
        if stdout.is_empty() {
            return fallback(spec.on_empty.as_deref());
        }
        ReplacementOutcome::Replace(stdout.to_string())
    })
}

fn fallback(message: Option<&str>) -> ReplacementOutcome {
    match message {
        Some(message) => ReplacementOutcome::Replace(message.to_string()),
        None => ReplacementOutcome::NoOp,
    }
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Real subprocess runner used by the filesystem backend.
#[derive(Debug, Clone)]
pub struct SubprocessToolRunner {
    home: Option<PathBuf>,
}

impl SubprocessToolRunner {
    #[must_use]
    pub fn new(home: Option<PathBuf>) -> Self {
        Self { home }
    }
}

impl ToolRunner for SubprocessToolRunner {
    fn resolve(&self, command: &str) -> Option<PathBuf> {
        if command.contains('/') {
            let path = expand_tilde(command, self.home.as_deref());
            if is_executable(&path) {
                return Some(path);
            }
            return None;
        }
        let search = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&search) {
            let candidate = dir.join(command);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    fn run(&self, path: &Path, args: &[String]) -> Result<ToolOutput, String> {
        let output = Command::new(path)
            .args(args)
            .output()
            .map_err(|err| format!("run {}: {err}", path.display()))?;
        Ok(ToolOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Scripted runner for tests: `tools` maps resolvable command names to
/// paths, `outputs` maps path strings to canned results.
#[derive(Debug, Default)]
pub struct InMemoryToolRunner {
    pub tools: HashMap<String, PathBuf>,
    pub outputs: HashMap<String, ToolOutput>,
    pub invocations: RefCell<Vec<(PathBuf, Vec<String>)>>,
}

impl ToolRunner for InMemoryToolRunner {
    fn resolve(&self, command: &str) -> Option<PathBuf> {
        self.tools.get(command).cloned()
    }

    fn run(&self, path: &Path, args: &[String]) -> Result<ToolOutput, String> {
        self.invocations
            .borrow_mut()
            .push((path.to_path_buf(), args.to_vec()));
        self.outputs
            .get(&path.display().to_string())
            .cloned()
            .ok_or_else(|| format!("no scripted output for {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
