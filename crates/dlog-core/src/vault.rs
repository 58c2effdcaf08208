//! Daily-note path resolution under the vault root.
//!
//! The vault is the directory holding daily notes. The log file for a day
//! is named by a strftime path template relative to the root; the default
//! matches `logs/2025/07-Jul/2025-07-25-Fri.md`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;

/// Default daily-log template, relative to the vault root.
pub const DEFAULT_DAILY_LOG_TEMPLATE: &str = "logs/%Y/%m-%b/%Y-%m-%d-%a.md";

/// Expands a leading `~` or `~/` against the given home directory. Paths
/// without a tilde pass through unchanged.
#[must_use]
pub fn expand_tilde(path: &str, home: Option<&Path>) -> PathBuf {
    if path == "~" {
        if let Some(home) = home {
            return home.to_path_buf();
        }
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = home {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Renders the daily-log template for `date` and joins it under the root.
/// `None` when the template has an invalid strftime specifier.
#[must_use]
pub fn daily_log_path(root: &Path, template: &str, date: NaiveDate) -> Option<PathBuf> {
    use std::fmt::Write as _;
    let mut rendered = String::new();
    match write!(rendered, "{}", date.format(template)) {
        Ok(()) => Some(root.join(rendered)),
        Err(_) => None,
    }
}

/// True when the daily-log template renders cleanly.
#[must_use]
pub fn validate_daily_log_template(template: &str) -> bool {
    let sample = NaiveDate::from_ymd_opt(2025, 7, 25).unwrap_or_default();
    daily_log_path(Path::new(""), template, sample).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
