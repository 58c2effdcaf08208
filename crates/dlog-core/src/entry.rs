//! Entry formatting: timestamp-marker extraction plus the substitution
//! engine plus the configured time prefix.
//!
//! A raw input line may start with a timestamp marker that overrides the
//! displayed time, consumed before any rule runs:
//!
//! - `HH:MM|` or `HHMM|`: absolute 24-hour time (colon inferred for the
//!   four-digit form).
//! - `-<N>h<M>m|`, `-<N>h|`, `-<M>m|`, `-<N>|`: duration ago, relative to
//!   the wall clock (a bare number is minutes).
//!
//! Marker parsing is a fixed-prefix scan, not a regex grab-bag; anything
//! that does not parse as a marker is left in the text untouched.

use chrono::{Duration, NaiveDateTime, NaiveTime};

use crate::rules::RuleSet;

/// Renders the line prefix from the transformed entry text and the display
/// time. Supplied by configuration; the default convention renders
/// `"- *HH:MM* - "`.
pub type PrefixFn = Box<dyn Fn(&str, NaiveTime) -> String>;

/// Default prefix template, in strftime notation.
pub const DEFAULT_PREFIX_TEMPLATE: &str = "- *%H:%M* - ";

// ---------------------------------------------------------------------------
// Timestamp markers
// ---------------------------------------------------------------------------

/// Splits an optional leading timestamp marker off `input`. Returns the
/// display time and the remaining text. Absolute markers name the time
/// directly; relative markers subtract from `now` (the wall clock, not the
/// `reference` parameter), wrapping across midnight without touching the
/// calendar date. Without a marker the `reference` time is used.
#[must_use]
pub fn extract_marker<'a>(
    input: &'a str,
    reference: NaiveDateTime,
    now: NaiveDateTime,
) -> (NaiveTime, &'a str) {
    if let Some((time, consumed)) = parse_absolute(input) {
        return (time, &input[consumed..]);
    }
    if let Some((ago, consumed)) = parse_relative(input) {
        return ((now - ago).time(), &input[consumed..]);
    }
    (reference.time(), input)
}

/// `HH:MM|`, `H:MM|`, or `HHMM|`. Out-of-range values are not a marker.
fn parse_absolute(input: &str) -> Option<(NaiveTime, usize)> {
    let bar = input.find('|')?;
    if bar == 0 || bar > 5 {
        return None;
    }
    let candidate = &input[..bar];
    let time = if let Some((hours, minutes)) = candidate.split_once(':') {
        if hours.is_empty() || hours.len() > 2 || minutes.len() != 2 {
            return None;
        }
        NaiveTime::from_hms_opt(parse_number(hours)?, parse_number(minutes)?, 0)?
    } else {
        if candidate.len() != 4 {
            return None;
        }
        NaiveTime::from_hms_opt(
            parse_number(&candidate[..2])?,
            parse_number(&candidate[2..])?,
            0,
        )?
    };
    Some((time, bar + 1))
}

/// `-<duration>|` where the duration is `N`, `Nm`, `Nh`, or `NhMm`.
fn parse_relative(input: &str) -> Option<(Duration, usize)> {
    let rest = input.strip_prefix('-')?;
    let bar = rest.find('|')?;
    if bar == 0 || bar > 8 {
        return None;
    }
    let minutes = parse_duration_minutes(&rest[..bar])?;
    Some((Duration::minutes(minutes), bar + 2))
}

fn parse_duration_minutes(text: &str) -> Option<i64> {
    if let Some(head) = text.strip_suffix('m') {
        if let Some((hours, minutes)) = head.split_once('h') {
            return Some(i64::from(parse_number(hours)?) * 60 + i64::from(parse_number(minutes)?));
        }
        return Some(i64::from(parse_number(head)?));
    }
    if let Some(hours) = text.strip_suffix('h') {
        return Some(i64::from(parse_number(hours)?) * 60);
    }
    Some(i64::from(parse_number(text)?))
}

fn parse_number(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

/// Wraps a [`RuleSet`] and a prefix renderer into the full raw-input →
/// final-line transformation.
pub struct EntryFormatter {
    rules: RuleSet,
    prefix: PrefixFn,
}

impl EntryFormatter {
    #[must_use]
    pub fn new(rules: RuleSet, prefix: PrefixFn) -> Self {
        Self { rules, prefix }
    }

    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Marker extraction, then the rule pipeline, then the prefix. The
    /// result is empty only when both the prefix and the transformed text
    /// are empty; the caller treats that as "nothing to log".
    #[must_use]
    pub fn format(&self, raw: &str, reference: NaiveDateTime, now: NaiveDateTime) -> String {
        let (display, remainder) = extract_marker(raw, reference, now);
        let transformed = self.rules.apply(remainder);
        let prefix = (self.prefix)(&transformed, display);
        format!("{prefix}{transformed}")
    }
}

impl std::fmt::Debug for EntryFormatter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryFormatter")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

/// Builds a [`PrefixFn`] from a strftime template. Callers validate the
/// template up front with [`validate_time_template`]; a template that still
/// fails to render falls back to its own literal text.
#[must_use]
pub fn template_prefix(template: &str) -> PrefixFn {
    let template = template.to_string();
    Box::new(move |_, time| {
        render_time_template(&template, time).unwrap_or_else(|| template.clone())
    })
}

/// Renders a strftime template for a time, or `None` when the template has
/// an invalid specifier.
#[must_use]
pub fn render_time_template(template: &str, time: NaiveTime) -> Option<String> {
    use std::fmt::Write as _;
    let mut rendered = String::new();
    match write!(rendered, "{}", time.format(template)) {
        Ok(()) => Some(rendered),
        Err(_) => None,
    }
}

/// True when the strftime template renders cleanly.
#[must_use]
pub fn validate_time_template(template: &str) -> bool {
    let sample = NaiveTime::from_hms_opt(12, 34, 56).unwrap_or(NaiveTime::MIN);
    render_time_template(template, sample).is_some()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
