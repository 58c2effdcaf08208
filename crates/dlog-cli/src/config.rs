//! Configuration: discovery chain, YAML model, validation, and the
//! `config` subcommand.
//!
//! Discovery order: the `DLOG_CONFIG` environment variable, then
//! `~/.config/dlog/config.yaml`, then `./dlog.yaml`. The first readable
//! candidate wins. Every validation failure is fatal at load time, before
//! any text is processed.

use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use dlog_core::entry::{template_prefix, validate_time_template, DEFAULT_PREFIX_TEMPLATE};
use dlog_core::rules::Pattern;
use dlog_core::vault::{expand_tilde, validate_daily_log_template, DEFAULT_DAILY_LOG_TEMPLATE};
use dlog_core::{EntryFormatter, RuleSet};

use crate::backend::DlogBackend;
use crate::tools::{tool_replacement, ToolCache, ToolRunner, ToolSpec};
use crate::CommandOutput;

pub const CONFIG_ENV: &str = "DLOG_CONFIG";
pub const LOCAL_CONFIG_FALLBACK: &str = "dlog.yaml";

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub vault_root: Option<String>,
    #[serde(default = "default_daily_log")]
    pub daily_log: String,
    #[serde(default = "default_entry_prefix")]
    pub entry_prefix: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub prefixes: Vec<PrefixEntry>,
    #[serde(default)]
    pub subs: Vec<SubEntry>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            vault_root: None,
            daily_log: default_daily_log(),
            entry_prefix: default_entry_prefix(),
            logging: LoggingConfig::default(),
            prefixes: Vec::new(),
            subs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn is_debug(&self) -> bool {
        self.level == "debug"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixEntry {
    #[serde(rename = "match")]
    pub pattern: String,
    pub replace: String,
    #[serde(default = "default_true")]
    pub auto_space: bool,
}

/// One general rule. Exactly one of `replace`, `link`, or `tool` must be
/// set; `regex: true` compiles `match` as written instead of escaping it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubEntry {
    #[serde(rename = "match")]
    pub pattern: String,
    #[serde(default)]
    pub regex: bool,
    #[serde(default)]
    pub replace: Option<String>,
    #[serde(default)]
    pub link: Option<LinkEntry>,
    #[serde(default)]
    pub tool: Option<ToolEntry>,
}

/// `link: "[[Page]]"` shorthand or `link: { page: ..., display: ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LinkEntry {
    Shorthand(String),
    Full {
        page: String,
        #[serde(default)]
        display: Option<String>,
    },
}

impl LinkEntry {
    fn parts(&self) -> (&str, Option<&str>) {
        match self {
            Self::Shorthand(raw) => (raw.as_str(), None),
            Self::Full { page, display } => (page.as_str(), display.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub on_error: Option<String>,
    #[serde(default)]
    pub on_empty: Option<String>,
}

fn default_daily_log() -> String {
    DEFAULT_DAILY_LOG_TEMPLATE.to_string()
}

fn default_entry_prefix() -> String {
    DEFAULT_PREFIX_TEMPLATE.to_string()
}

fn default_log_level() -> String {
    "quiet".to_string()
}

fn default_true() -> bool {
    true
}

impl ConfigFile {
    /// Validates everything that can fail before any text is processed.
    /// Duplicate-key checks live in the rule set itself; this catches the
    /// shape errors serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        match self.logging.level.as_str() {
            "quiet" | "debug" => {}
            other => {
                return Err(format!(
                    "logging.level must be one of quiet, debug (got '{other}')"
                ))
            }
        }
        if !validate_time_template(&self.entry_prefix) {
            return Err(format!(
                "entry_prefix is not a valid time template: '{}'",
                self.entry_prefix
            ));
        }
        if !validate_daily_log_template(&self.daily_log) {
            return Err(format!(
                "daily_log is not a valid date template: '{}'",
                self.daily_log
            ));
        }
        for prefix in &self.prefixes {
            if prefix.pattern.is_empty() {
                return Err("prefixes[].match must not be empty".to_string());
            }
        }
        for sub in &self.subs {
            if sub.pattern.is_empty() {
                return Err("subs[].match must not be empty".to_string());
            }
            let set = usize::from(sub.replace.is_some())
                + usize::from(sub.link.is_some())
                + usize::from(sub.tool.is_some());
            if set != 1 {
                return Err(format!(
                    "sub '{}' must set exactly one of replace, link, tool",
                    sub.pattern
                ));
            }
            if let Some(tool) = &sub.tool {
                if tool.command.trim().is_empty() {
                    return Err(format!("sub '{}' has an empty tool command", sub.pattern));
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Discovery and loading
// ---------------------------------------------------------------------------

/// The config file location a `dlog` invocation would use: the first
/// existing candidate, or `None`.
#[must_use]
pub fn discover_config_path(backend: &dyn DlogBackend) -> Option<PathBuf> {
    if let Some(value) = backend.env_var(CONFIG_ENV) {
        if !value.trim().is_empty() {
            let candidate = expand_tilde(&value, backend.home_dir().as_deref());
            if backend.file_exists(&candidate) {
                return Some(candidate);
            }
        }
    }
    if let Some(home) = backend.home_dir() {
        let candidate = default_config_path(&home);
        if backend.file_exists(&candidate) {
            return Some(candidate);
        }
    }
    let local = PathBuf::from(LOCAL_CONFIG_FALLBACK);
    if backend.file_exists(&local) {
        return Some(local);
    }
    None
}

/// `~/.config/dlog/config.yaml` for a given home.
#[must_use]
pub fn default_config_path(home: &std::path::Path) -> PathBuf {
    home.join(".config").join("dlog").join("config.yaml")
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub file: ConfigFile,
}

/// Discovers, reads, parses, and validates the config file.
pub fn load_config(backend: &dyn DlogBackend) -> Result<LoadedConfig, String> {
    let path = discover_config_path(backend).ok_or_else(|| {
        format!("could not find a config file (set {CONFIG_ENV} or create ~/.config/dlog/config.yaml)")
    })?;
    let raw = backend.read_file(&path)?;
    let file: ConfigFile = if raw.trim().is_empty() {
        ConfigFile::default()
    } else {
        serde_yaml::from_str(&raw).map_err(|err| format!("parse {}: {err}", path.display()))?
    };
    file.validate()
        .map_err(|err| format!("config {}: {err}", path.display()))?;
    Ok(LoadedConfig { path, file })
}

/// Builds the rule set and entry formatter from a validated config.
/// Registration failures (duplicate keys, bad patterns) surface here,
/// still before any text is processed.
pub fn build_engine(
    cfg: &ConfigFile,
    runner: Rc<dyn ToolRunner>,
    cache: Rc<RefCell<ToolCache>>,
) -> Result<EntryFormatter, String> {
    let mut rules = RuleSet::new();
    for prefix in &cfg.prefixes {
        rules
            .add_prefix_rule(&prefix.pattern, &prefix.replace, prefix.auto_space)
            .map_err(|err| err.to_string())?;
    }
    for sub in &cfg.subs {
        let pattern = if sub.regex {
            Pattern::Regex(sub.pattern.clone())
        } else {
            Pattern::Literal(sub.pattern.clone())
        };
        let result = match (&sub.replace, &sub.link, &sub.tool) {
            (Some(replace), None, None) => rules.add_gsub(pattern, replace),
            (None, Some(link), None) => {
                let (page, display) = link.parts();
                rules.add_link_gsub(pattern, page, display)
            }
            (None, None, Some(tool)) => rules.add_tool_gsub(
                pattern,
                tool_replacement(
                    Rc::clone(&runner),
                    Rc::clone(&cache),
                    ToolSpec {
                        command: tool.command.clone(),
                        args: tool.args.clone(),
                        on_error: tool.on_error.clone(),
                        on_empty: tool.on_empty.clone(),
                    },
                ),
            ),
            _ => {
                return Err(format!(
                    "sub '{}' must set exactly one of replace, link, tool",
                    sub.pattern
                ))
            }
        };
        result.map_err(|err| err.to_string())?;
    }
    Ok(EntryFormatter::new(
        rules,
        template_prefix(&cfg.entry_prefix),
    ))
}

// ---------------------------------------------------------------------------
// `config` subcommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Help,
    Path,
    Init { force: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ParsedArgs {
    command: Command,
    json: bool,
}

#[derive(Debug, Serialize)]
struct ConfigPathResult {
    path: String,
    exists: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInitResult {
    path: String,
    created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
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
    let parsed = parse_args(args)?;
    match parsed.command {
        Command::Help => write_help(stdout).map_err(|err| err.to_string()),
        Command::Path => {
            let discovered = discover_config_path(backend);
            let exists = discovered.is_some();
            let path = match discovered {
                Some(path) => path,
                None => {
                    let home = backend
                        .home_dir()
                        .ok_or_else(|| "failed to get home directory".to_string())?;
                    default_config_path(&home)
                }
            };
            if parsed.json {
                let result = ConfigPathResult {
                    path: path.display().to_string(),
                    exists,
                };
                write_json(stdout, &result)?;
                return Ok(());
            }
            writeln!(stdout, "{}", path.display()).map_err(|err| err.to_string())?;
            Ok(())
        }
        Command::Init { force } => {
            let home = backend
                .home_dir()
                .ok_or_else(|| "failed to get home directory".to_string())?;
            let config_dir = home.join(".config").join("dlog");
            let config_path = config_dir.join("config.yaml");

            if !force && backend.file_exists(&config_path) {
                let result = ConfigInitResult {
                    path: config_path.display().to_string(),
                    created: false,
                    message: Some(
                        "config file already exists (use --force to overwrite)".to_string(),
                    ),
                };
                if parsed.json {
                    write_json(stdout, &result)?;
                    return Ok(());
                }
                writeln!(
                    stdout,
                    "Config file already exists: {}",
                    config_path.display()
                )
                .map_err(|err| err.to_string())?;
                writeln!(stdout, "Use --force to overwrite.").map_err(|err| err.to_string())?;
                return Ok(());
            }

            backend.create_dir_all(&config_dir)?;
            backend.write_file(&config_path, DEFAULT_CONFIG)?;

            let result = ConfigInitResult {
                path: config_path.display().to_string(),
                created: true,
                message: None,
            };
            if parsed.json {
                write_json(stdout, &result)?;
                return Ok(());
            }
            writeln!(stdout, "Created config file: {}", config_path.display())
                .map_err(|err| err.to_string())?;
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(stdout: &mut dyn Write, value: &T) -> Result<(), String> {
    serde_json::to_writer_pretty(&mut *stdout, value).map_err(|err| err.to_string())?;
    writeln!(stdout).map_err(|err| err.to_string())?;
    Ok(())
}

fn parse_args(args: &[String]) -> Result<ParsedArgs, String> {
    let start = usize::from(args.first().is_some_and(|arg| arg == "config"));

    let mut json = false;
    let mut force = false;
    let mut subcommand: Option<String> = None;

    for arg in &args[start..] {
        match arg.as_str() {
            "--json" => json = true,
            "--force" | "-f" => force = true,
            "help" | "-h" | "--help" => subcommand = Some("help".to_string()),
            other if other.starts_with('-') => {
                return Err(format!("error: unknown argument for config: '{other}'"))
            }
            other => {
                if subcommand.is_some() {
                    return Err(format!("error: unexpected argument: {other}"));
                }
                subcommand = Some(other.to_string());
            }
        }
    }

    let command = match subcommand.as_deref() {
        None | Some("help") => Command::Help,
        Some("path") => Command::Path,
        Some("init") => Command::Init { force },
        Some(other) => return Err(format!("error: unknown config command: '{other}'")),
    };

    Ok(ParsedArgs { command, json })
}

fn write_help(stdout: &mut dyn Write) -> std::io::Result<()> {
    writeln!(
        stdout,
        "Manage dlog configuration at ~/.config/dlog/config.yaml."
    )?;
    writeln!(stdout)?;
    writeln!(stdout, "Commands:")?;
    writeln!(stdout, "  init    Create a starter config file")?;
    writeln!(stdout, "  path    Print the config file path")?;
    writeln!(stdout)?;
    writeln!(stdout, "Flags:")?;
    writeln!(
        stdout,
        "  -f, --force   Overwrite existing config file (init only)"
    )?;
    writeln!(stdout, "  --json        JSON output")?;
    Ok(())
}

const DEFAULT_CONFIG: &str = r##"# dlog configuration
#
# The vault is the directory holding your daily notes. dlog appends to the
# "# Log" section of today's note; the note must already exist.
#
# vault_root: "~/Documents/Obsidian/vimwiki"
#
# Where today's note lives, as a strftime path relative to vault_root:
# daily_log: "logs/%Y/%m-%b/%Y-%m-%d-%a.md"
#
# How each entry is prefixed (strftime, rendered with the entry time):
# entry_prefix: "- *%H:%M* - "

logging:
  level: quiet   # quiet | debug

# Prefix rules fire only at the start of the input.
# prefixes:
#   - match: "W"
#     replace: "⚒️"
#   - match: "LUNCH"
#     replace: "🍱 Lunch"

# General rules fire anywhere, in order. Each sets exactly one of
# replace, link, or tool.
# subs:
#   - match: ":100:"
#     replace: "💯"
#   - match: "NAS"
#     link: { page: "FreeNAS" }
#   - match: "M4MBP"
#     link: { page: "MacBook Pro M4", display: "m4mbp" }
#   - match: "^SONG$"
#     regex: true
#     tool:
#       command: "spotify-song"
#       on_error: "❌ Error retrieving song"
#       on_empty: "❌ Could not get current song"
"##;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
