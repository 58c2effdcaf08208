//! Ordered rule-based text rewriter.
//!
//! A [`RuleSet`] holds two independent, insertion-ordered rule namespaces:
//! prefix rules (anchored to the start of the input) and general rules
//! (matched anywhere, with global-substitute semantics). [`RuleSet::apply`]
//! runs every rule exactly once, in registration order, each rule rewriting
//! the accumulated text. This is a pipeline, not a single combined pass: one
//! rule's output can be matched by a later rule. Registration order is a
//! user-visible contract.
//!
//! All registration failures (duplicate keys, malformed patterns, empty link
//! pages) are raised at registration time, before any text is processed.

use crate::error::RuleError;

// ---------------------------------------------------------------------------
// Patterns and replacements
// ---------------------------------------------------------------------------

/// How a general rule matches: a literal token (escaped before compiling) or
/// a regular expression compiled as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Literal(String),
    Regex(String),
}

impl Pattern {
    /// The identity key of the rule: the pattern text used at registration.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Literal(text) | Self::Regex(text) => text,
        }
    }

    fn compile(&self) -> Result<regex::Regex, regex::Error> {
        match self {
            Self::Literal(text) => regex::Regex::new(&regex::escape(text)),
            Self::Regex(text) => regex::Regex::new(text),
        }
    }
}

/// The outcome of one computed replacement invocation. `NoOp` leaves that
/// particular occurrence unchanged; `Replace("")` deletes the matched text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementOutcome {
    Replace(String),
    NoOp,
}

/// Replacement callback: receives the full text being rewritten and the
/// matched substring, once per occurrence.
pub type ComputedReplacement = Box<dyn Fn(&str, &str) -> ReplacementOutcome>;

/// Replacement policy for a general rule. A closed sum: a rule carries a
/// literal string or a computed callback, never both.
pub enum Replacement {
    Literal(String),
    Computed(ComputedReplacement),
}

impl std::fmt::Debug for Replacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Literal(text) => write!(f, "Literal({text:?})"),
            Self::Computed(_) => write!(f, "Computed(..)"),
        }
    }
}

/// What kind of rule a registration produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Prefix,
    Gsub,
    Link,
    ToolBacked,
}

impl RuleKind {
    /// Stable slug for listings and JSON output.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Gsub => "gsub",
            Self::Link => "link",
            Self::ToolBacked => "tool",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A rule anchored to the start of the input line.
#[derive(Debug, Clone)]
pub struct PrefixRule {
    prefix: String,
    replacement: String,
    auto_space: bool,
}

impl PrefixRule {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    #[must_use]
    pub fn auto_space(&self) -> bool {
        self.auto_space
    }

    /// With `auto_space` the rule fires only when the prefix is the whole
    /// input or is followed by a space, and the joint between replacement and
    /// remainder is normalized to a single space. Without it the prefix is
    /// substituted in place, whatever follows.
    fn apply(&self, text: &str) -> Option<String> {
        let rest = text.strip_prefix(self.prefix.as_str())?;
        if !self.auto_space {
            return Some(format!("{}{rest}", self.replacement));
        }
        if rest.is_empty() {
            return Some(self.replacement.clone());
        }
        let body = rest.strip_prefix(' ')?;
        if self.replacement.ends_with(char::is_whitespace) {
            return Some(format!("{}{body}", self.replacement));
        }
        Some(format!("{} {body}", self.replacement))
    }
}

/// A general rule: plain substitution, link substitution, or tool-backed
/// substitution, matched anywhere in the text.
pub struct GeneralRule {
    key: String,
    kind: RuleKind,
    matcher: regex::Regex,
    replacement: Replacement,
}

impl GeneralRule {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    /// The literal replacement text, when the rule carries one.
    #[must_use]
    pub fn replacement_literal(&self) -> Option<&str> {
        match &self.replacement {
            Replacement::Literal(text) => Some(text),
            Replacement::Computed(_) => None,
        }
    }

    /// One-line description for rule listings.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.replacement {
            Replacement::Literal(text) => format!("{}({:?} => {text:?})", self.kind, self.key),
            Replacement::Computed(_) => format!("{}({:?})", self.kind, self.key),
        }
    }

    /// Substitutes every occurrence of the pattern in `text`. Literal
    /// replacements are inserted verbatim (no capture expansion); computed
    /// replacements are invoked once per occurrence.
    fn apply(&self, text: &str) -> String {
        match &self.replacement {
            Replacement::Literal(replace) => self
                .matcher
                .replace_all(text, regex::NoExpand(replace))
                .into_owned(),
            Replacement::Computed(callback) => self
                .matcher
                .replace_all(text, |caps: &regex::Captures<'_>| {
                    let matched = caps.get(0).map_or("", |m| m.as_str());
                    match callback(text, matched) {
                        ReplacementOutcome::Replace(value) => value,
                        ReplacementOutcome::NoOp => matched.to_string(),
                    }
                })
                .into_owned(),
        }
    }
}

impl std::fmt::Debug for GeneralRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneralRule")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("replacement", &self.replacement)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// The ordered collection of substitution rules. Constructed once from
/// configuration and immutable for the rest of the invocation.
#[derive(Debug, Default)]
pub struct RuleSet {
    prefixes: Vec<PrefixRule>,
    generals: Vec<GeneralRule>,
}

impl RuleSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn prefix_rules(&self) -> &[PrefixRule] {
        &self.prefixes
    }

    #[must_use]
    pub fn general_rules(&self) -> &[GeneralRule] {
        &self.generals
    }

    /// Registers a rule that matches `prefix` at the start of the input only.
    pub fn add_prefix_rule(
        &mut self,
        prefix: &str,
        replacement: &str,
        auto_space: bool,
    ) -> Result<(), RuleError> {
        if prefix.is_empty() {
            return Err(RuleError::Invalid {
                key: prefix.to_string(),
                reason: "prefix must not be empty".to_string(),
            });
        }
        if self.prefixes.iter().any(|rule| rule.prefix == prefix) {
            return Err(RuleError::DuplicatePrefix(prefix.to_string()));
        }
        self.prefixes.push(PrefixRule {
            prefix: prefix.to_string(),
            replacement: replacement.to_string(),
            auto_space,
        });
        Ok(())
    }

    /// Registers a plain substitution with a literal replacement.
    pub fn add_gsub(&mut self, pattern: Pattern, replacement: &str) -> Result<(), RuleError> {
        self.insert_general(
            pattern,
            RuleKind::Gsub,
            Replacement::Literal(replacement.to_string()),
        )
    }

    /// Registers a substitution backed by a replacement callback, invoked
    /// once per occurrence with `(entry_text, matched_text)`.
    pub fn add_computed_gsub(
        &mut self,
        pattern: Pattern,
        callback: ComputedReplacement,
    ) -> Result<(), RuleError> {
        self.insert_general(pattern, RuleKind::Gsub, Replacement::Computed(callback))
    }

    /// Registers a substitution whose replacement is supplied by an external
    /// tool at apply time. Identical mechanics to [`Self::add_computed_gsub`],
    /// distinguished only for listings.
    pub fn add_tool_gsub(
        &mut self,
        pattern: Pattern,
        callback: ComputedReplacement,
    ) -> Result<(), RuleError> {
        self.insert_general(pattern, RuleKind::ToolBacked, Replacement::Computed(callback))
    }

    /// Registers a substitution that always renders a `[[page]]` or
    /// `[[page|display]]` wiki link. A raw `"[[...]]"` string supplied as
    /// `page` is unwrapped to its inner text.
    pub fn add_link_gsub(
        &mut self,
        pattern: Pattern,
        page: &str,
        display: Option<&str>,
    ) -> Result<(), RuleError> {
        let page = unwrap_link_shorthand(page.trim());
        if page.is_empty() {
            return Err(RuleError::Invalid {
                key: pattern.key().to_string(),
                reason: "link page must not be empty".to_string(),
            });
        }
        let display = display.map(str::trim).filter(|value| !value.is_empty());
        let target = match display {
            Some(display) => format!("[[{page}|{display}]]"),
            None => format!("[[{page}]]"),
        };
        self.insert_general(pattern, RuleKind::Link, Replacement::Literal(target))
    }

    /// Runs every prefix rule, then every general rule, in registration
    /// order, each rewriting the accumulated text. The final text is
    /// whitespace-trimmed exactly once, at the end.
    #[must_use]
    pub fn apply(&self, text: &str) -> String {
        let mut current = text.to_string();
        for rule in &self.prefixes {
            if let Some(rewritten) = rule.apply(&current) {
                current = rewritten;
            }
        }
        for rule in &self.generals {
            current = rule.apply(&current);
        }
        current.trim().to_string()
    }

    fn insert_general(
        &mut self,
        pattern: Pattern,
        kind: RuleKind,
        replacement: Replacement,
    ) -> Result<(), RuleError> {
        let key = pattern.key().to_string();
        if key.is_empty() {
            return Err(RuleError::Invalid {
                key,
                reason: "pattern must not be empty".to_string(),
            });
        }
        if self.generals.iter().any(|rule| rule.key == key) {
            return Err(RuleError::DuplicateGsub(key));
        }
        let matcher = pattern.compile().map_err(|err| RuleError::Invalid {
            key: key.clone(),
            reason: err.to_string(),
        })?;
        self.generals.push(GeneralRule {
            key,
            kind,
            matcher,
            replacement,
        });
        Ok(())
    }
}

/// Extracts the inner text of a leading `[[...]]` shorthand. Text after a
/// first-level `|` is kept as part of the page, not parsed as an alias.
fn unwrap_link_shorthand(raw: &str) -> &str {
    if !raw.starts_with("[[") {
        return raw;
    }
    let inner = raw.trim_start_matches('[');
    match inner.find(']') {
        Some(end) => &inner[..end],
        None => inner,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn literal(text: &str) -> Pattern {
        Pattern::Literal(text.to_string())
    }

    // ── Prefix rules ──────────────────────────────────────────────────

    #[test]
    fn prefix_fires_with_space_separator() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("W", "WORK", true).unwrap();
        assert_eq!(rules.apply("W - Task 1"), "WORK - Task 1");
    }

    #[test]
    fn prefix_requires_separator() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("W", "WORK", true).unwrap();
        assert_eq!(rules.apply("W- Task 1"), "W- Task 1");
        assert_eq!(rules.apply("Wrest"), "Wrest");
    }

    #[test]
    fn prefix_standalone() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("LUNCH", "🍱 Lunch", true).unwrap();
        assert_eq!(rules.apply("LUNCH"), "🍱 Lunch");
        assert_eq!(rules.apply("LUNCH - Food"), "🍱 Lunch - Food");
    }

    #[test]
    fn prefix_only_matches_start() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("T", "✅", true).unwrap();
        assert_eq!(rules.apply("ate T bone"), "ate T bone");
    }

    #[test]
    fn prefix_without_auto_space_substitutes_in_place() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("->", "→", false).unwrap();
        assert_eq!(rules.apply("->done"), "→done");
    }

    #[test]
    fn prefix_auto_space_collapses_trailing_whitespace() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("REST", "🍃 ", true).unwrap();
        assert_eq!(rules.apply("REST now"), "🍃 now");
    }

    #[test]
    fn duplicate_prefix_is_rejected() {
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("W", "Work", true).unwrap();
        let err = rules.add_prefix_rule("W", "Other", true).unwrap_err();
        assert!(matches!(err, RuleError::DuplicatePrefix(key) if key == "W"));
    }

    // ── General rules ─────────────────────────────────────────────────

    #[test]
    fn gsub_substitutes_everywhere() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal("TASK"), "Work Task").unwrap();
        assert_eq!(rules.apply("TASK"), "Work Task");
        assert_eq!(rules.apply("TASK Hello"), "Work Task Hello");
        assert_eq!(rules.apply("Hello TASK World"), "Hello Work Task World");
        assert_eq!(rules.apply("Hello TASK"), "Hello Work Task");
    }

    #[test]
    fn gsub_matches_inside_words() {
        // Substitutions are deliberately not word-boundary anchored.
        let mut rules = RuleSet::new();
        rules.add_gsub(literal("TASK"), "Work Task").unwrap();
        assert_eq!(rules.apply("Hello TASK's World"), "Hello Work Task's World");
    }

    #[test]
    fn gsub_replaces_all_occurrences() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal(":100:"), "💯").unwrap();
        assert_eq!(rules.apply(":100: and :100:"), "💯 and 💯");
    }

    #[test]
    fn gsub_literal_pattern_is_escaped() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal(":)"), "🙂").unwrap();
        assert_eq!(rules.apply("done :)"), "done 🙂");
    }

    #[test]
    fn gsub_literal_replacement_is_not_expanded() {
        let mut rules = RuleSet::new();
        rules
            .add_gsub(Pattern::Regex(r"PAY-(\d+)".to_string()), "$ticket")
            .unwrap();
        assert_eq!(rules.apply("see PAY-7"), "see $ticket");
    }

    #[test]
    fn final_result_is_trimmed_once() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal("KEY"), " VALUE ").unwrap();
        assert_eq!(rules.apply("KEY"), "VALUE");
    }

    #[test]
    fn duplicate_gsub_is_rejected_across_kinds() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal("NAS"), "nas").unwrap();
        let err = rules
            .add_link_gsub(literal("NAS"), "FreeNAS", None)
            .unwrap_err();
        assert!(matches!(err, RuleError::DuplicateGsub(key) if key == "NAS"));
    }

    #[test]
    fn prefix_and_gsub_namespaces_are_independent() {
        // The same key registers cleanly once per namespace.
        let mut rules = RuleSet::new();
        rules.add_prefix_rule("MEM", "📝", true).unwrap();
        rules.add_gsub(literal("MEM"), "memory").unwrap();
    }

    #[test]
    fn bad_regex_is_rejected_at_registration() {
        let mut rules = RuleSet::new();
        let err = rules
            .add_gsub(Pattern::Regex("(unclosed".to_string()), "x")
            .unwrap_err();
        assert!(matches!(err, RuleError::Invalid { .. }));
    }

    // ── Computed replacements ─────────────────────────────────────────

    #[test]
    fn computed_replacement_per_occurrence() {
        let mut rules = RuleSet::new();
        rules
            .add_computed_gsub(
                Pattern::Regex(r"CCAM-(\d+)".to_string()),
                Box::new(|_, matched| {
                    let issue = matched.trim_start_matches("CCAM-");
                    ReplacementOutcome::Replace(format!(
                        "[[https://tracker/browse/CCAM-{issue}|CCAM-{issue}]]"
                    ))
                }),
            )
            .unwrap();
        assert_eq!(
            rules.apply("Fixed CCAM-1234 and CCAM-5678"),
            "Fixed [[https://tracker/browse/CCAM-1234|CCAM-1234]] \
             and [[https://tracker/browse/CCAM-5678|CCAM-5678]]"
        );
    }

    #[test]
    fn computed_noop_leaves_occurrence_unchanged() {
        let mut rules = RuleSet::new();
        rules
            .add_computed_gsub(
                Pattern::Regex(r"TEST-(\d+)".to_string()),
                Box::new(|_, matched| {
                    let issue: u32 = matched
                        .trim_start_matches("TEST-")
                        .parse()
                        .unwrap_or_default();
                    if issue < 1000 {
                        ReplacementOutcome::NoOp
                    } else {
                        ReplacementOutcome::Replace(format!("[[TEST Issue {issue}]]"))
                    }
                }),
            )
            .unwrap();
        assert_eq!(
            rules.apply("TEST-999 should not change"),
            "TEST-999 should not change"
        );
        assert_eq!(
            rules.apply("TEST-1234 should change"),
            "[[TEST Issue 1234]] should change"
        );
    }

    #[test]
    fn computed_empty_string_removes_match() {
        let mut rules = RuleSet::new();
        rules
            .add_computed_gsub(
                Pattern::Regex(r"\[REMOVE\]".to_string()),
                Box::new(|_, _| ReplacementOutcome::Replace(String::new())),
            )
            .unwrap();
        assert_eq!(
            rules.apply("This [REMOVE] should be gone"),
            "This  should be gone"
        );
    }

    // ── Link rules ────────────────────────────────────────────────────

    #[test]
    fn link_renders_page() {
        let mut rules = RuleSet::new();
        rules
            .add_link_gsub(literal("PAGE"), "Page Title", None)
            .unwrap();
        assert_eq!(rules.apply("on PAGE now"), "on [[Page Title]] now");
    }

    #[test]
    fn link_renders_page_with_display() {
        let mut rules = RuleSet::new();
        rules
            .add_link_gsub(literal("PAGE"), "Page Title", Some("Alias"))
            .unwrap();
        assert_eq!(rules.apply("PAGE"), "[[Page Title|Alias]]");
    }

    #[test]
    fn link_shorthand_is_unwrapped() {
        let mut rules = RuleSet::new();
        rules
            .add_link_gsub(literal("PAGE"), "[[Page Title]]", None)
            .unwrap();
        assert_eq!(rules.apply("PAGE"), "[[Page Title]]");
    }

    #[test]
    fn link_shorthand_keeps_embedded_alias_verbatim() {
        let mut rules = RuleSet::new();
        rules
            .add_link_gsub(literal("P"), "[[Page|p]]", None)
            .unwrap();
        assert_eq!(rules.apply("P"), "[[Page|p]]");
    }

    #[test]
    fn link_blank_display_is_dropped() {
        let mut rules = RuleSet::new();
        rules
            .add_link_gsub(literal("MDT"), "Markdown Tool", Some(""))
            .unwrap();
        assert_eq!(rules.apply("MDT"), "[[Markdown Tool]]");
    }

    #[test]
    fn link_requires_page() {
        let mut rules = RuleSet::new();
        let err = rules.add_link_gsub(literal("X"), "  ", None).unwrap_err();
        assert!(matches!(err, RuleError::Invalid { .. }));
    }

    // ── Pipeline ordering ─────────────────────────────────────────────

    #[test]
    fn rules_chain_in_registration_order() {
        // An early rule's output feeds a later rule's pattern.
        let mut rules = RuleSet::new();
        rules.add_gsub(literal(":memo:"), "MEMO").unwrap();
        rules.add_gsub(literal("MEMO"), "📝").unwrap();
        assert_eq!(rules.apply("took a :memo: today"), "took a 📝 today");
    }

    #[test]
    fn prefixes_apply_before_generals() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal("Work"), "WORKED").unwrap();
        rules.add_prefix_rule("W", "Work", true).unwrap();
        // Prefix expands W first, then the general rule sees its output.
        assert_eq!(rules.apply("W hard"), "WORKED hard");
    }

    #[test]
    fn summary_formats() {
        let mut rules = RuleSet::new();
        rules.add_gsub(literal(":100:"), "💯").unwrap();
        rules
            .add_link_gsub(literal("NAS"), "FreeNAS", None)
            .unwrap();
        let summaries: Vec<String> = rules
            .general_rules()
            .iter()
            .map(GeneralRule::summary)
            .collect();
        assert_eq!(summaries[0], "gsub(\":100:\" => \"💯\")");
        assert_eq!(summaries[1], "link(\"NAS\" => \"[[FreeNAS]]\")");
    }
}
