//! dlog-core: the journaling engine behind the `dlog` CLI.
//!
//! This crate contains the pieces with actual algorithmic content, free of
//! any I/O policy: the ordered substitution engine ([`rules`]), the entry
//! formatter with timestamp-marker parsing ([`entry`]), the `# Log` section
//! editor ([`section`]), and daily-note path resolution ([`vault`]).
//! Configuration loading, filesystem access, and subprocess invocation live
//! in the CLI crate.

pub mod entry;
pub mod error;
pub mod rules;
pub mod section;
pub mod vault;

pub use entry::EntryFormatter;
pub use error::{RuleError, SectionError, VaultError};
pub use rules::{Pattern, Replacement, ReplacementOutcome, RuleKind, RuleSet};
