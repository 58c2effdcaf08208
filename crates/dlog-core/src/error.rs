//! Error types for dlog operations.
//!
//! Rule registration errors are fatal configuration errors: they surface
//! before any text is processed, so a single bad rule cannot corrupt output
//! silently mid-run.

/// Errors raised while registering substitution rules.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("prefix rule '{0}' is already configured")]
    DuplicatePrefix(String),
    #[error("substitution rule '{0}' is already configured")]
    DuplicateGsub(String),
    #[error("invalid rule '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

/// Errors raised while editing the log section of a daily note.
#[derive(Debug, thiserror::Error)]
pub enum SectionError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("no '# Log' section found in {0}")]
    SectionNotFound(String),
    #[error("io: {0}")]
    Io(String),
}

/// Errors raised while resolving the daily log path under the vault.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("vault root is not configured")]
    RootNotConfigured,
    #[error("vault root not found: {0}")]
    RootMissing(String),
    #[error("no log file for {date}: {path} does not exist")]
    LogMissing { date: String, path: String },
}
