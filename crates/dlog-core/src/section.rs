//! Sort-preserving editor for the `# Log` section of a daily note.
//!
//! The editor walks the file line by line through a small state machine
//! (`BeforeSection → InSection → AfterSection`), collects the section body,
//! merges in the new entry, sorts case-insensitively, drops exact
//! duplicates, and rewrites only that region. Everything outside the
//! section is reproduced verbatim.
//!
//! The whole operation is whole-file read, whole-file overwrite. It is not
//! transactional across process crashes; accepted for a single-user,
//! single-writer tool.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::SectionError;

/// The section header the editor looks for, compared after trimming.
pub const LOG_HEADER: &str = "# Log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    BeforeSection,
    InSection,
    AfterSection,
}

/// The located section: `body` is the half-open line range between the
/// header and the next header (or end-of-file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SectionBounds {
    /// Index of the first body line (directly after the header).
    start: usize,
    /// Index one past the last body line.
    end: usize,
}

fn locate_section(lines: &[&str]) -> Option<SectionBounds> {
    let mut state = ScanState::BeforeSection;
    let mut start = 0;
    let mut end = lines.len();
    for (index, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        match state {
            ScanState::BeforeSection => {
                if trimmed == LOG_HEADER {
                    start = index + 1;
                    end = lines.len();
                    state = ScanState::InSection;
                }
            }
            ScanState::InSection => {
                if !trimmed.is_empty() && trimmed.starts_with('#') {
                    end = index;
                    state = ScanState::AfterSection;
                }
            }
            ScanState::AfterSection => break,
        }
    }
    match state {
        ScanState::BeforeSection => None,
        ScanState::InSection | ScanState::AfterSection => Some(SectionBounds { start, end }),
    }
}

/// Merges `new_entry` into the `# Log` section of `content` and returns the
/// rewritten file. `None` when no header line is present. An empty (or
/// blank) `new_entry` still re-sorts and dedups the existing body; that is
/// the `fixup` operation.
#[must_use]
pub fn merge_entry(content: &str, new_entry: &str) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let bounds = locate_section(&lines)?;

    let mut entries: Vec<String> = lines[bounds.start..bounds.end]
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let candidate = new_entry.trim();
    if !candidate.is_empty() {
        entries.push(candidate.to_string());
    }

    // Case-insensitive total order over the full line; exact duplicates
    // removed after sorting (first occurrence wins).
    entries.sort_by_key(|entry| entry.to_lowercase());
    let mut seen: HashSet<String> = HashSet::new();
    entries.retain(|entry| seen.insert(entry.clone()));

    let mut out = String::new();
    for line in &lines[..bounds.start] {
        out.push_str(line);
        out.push('\n');
    }
    if !entries.is_empty() {
        out.push('\n');
        for entry in &entries {
            out.push_str(entry);
            out.push('\n');
        }
    }
    if bounds.end < lines.len() {
        if !entries.is_empty() {
            out.push('\n');
        }
        for line in &lines[bounds.end..] {
            out.push_str(line);
            out.push('\n');
        }
    }
    Some(out)
}

/// Reads the file, merges the entry, and writes the file back. The file is
/// left untouched when it has no `# Log` header.
pub fn append_entry(path: &Path, new_entry: &str) -> Result<(), SectionError> {
    if !path.is_file() {
        return Err(SectionError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)
        .map_err(|err| SectionError::Io(format!("read {}: {err}", path.display())))?;
    let updated = merge_entry(&content, new_entry)
        .ok_or_else(|| SectionError::SectionNotFound(path.display().to_string()))?;
    fs::write(path, updated)
        .map_err(|err| SectionError::Io(format!("write {}: {err}", path.display())))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn entries_after_header(content: &str) -> Vec<String> {
        let lines: Vec<&str> = content.lines().collect();
        let header = lines.iter().position(|line| line.trim() == LOG_HEADER).unwrap();
        lines[header + 1..]
            .iter()
            .map(|line| line.trim())
            .take_while(|line| line.is_empty() || !line.starts_with('#'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect()
    }

    // ── Locating ──────────────────────────────────────────────────────

    #[test]
    fn missing_header_returns_none() {
        let content = "# Some Header\nContent without log section\n";
        assert_eq!(merge_entry(content, "- x"), None);
    }

    #[test]
    fn section_bounded_by_next_header() {
        let lines = vec!["# Log", "- a", "", "# Footer", "tail"];
        let bounds = locate_section(&lines).unwrap();
        assert_eq!(bounds, SectionBounds { start: 1, end: 3 });
    }

    #[test]
    fn section_runs_to_eof_when_unclosed() {
        let lines = vec!["intro", "# Log", "- a", "- b"];
        let bounds = locate_section(&lines).unwrap();
        assert_eq!(bounds, SectionBounds { start: 2, end: 4 });
    }

    // ── Merging ───────────────────────────────────────────────────────

    #[test]
    fn inserts_into_empty_section() {
        let content = "# Some Header\nContent here\n\n# Log\n\n# Another Header\nMore content\n";
        let merged = merge_entry(content, "- *10:00* - Test entry").unwrap();
        assert!(merged.contains("# Log\n\n- *10:00* - Test entry\n"));
        assert!(merged.contains("# Another Header\nMore content\n"));
    }

    #[test]
    fn empty_section_at_eof_gets_single_separator_and_no_trailing_blank() {
        let content = "# Details\n\n# Log\n";
        let merged = merge_entry(content, "- *10:00* - Only entry").unwrap();
        assert_eq!(merged, "# Details\n\n# Log\n\n- *10:00* - Only entry\n");
    }

    #[test]
    fn keeps_entries_sorted() {
        let content = "# Log\n- *10:00* - Coffee\n- *14:00* - Meeting\n- *09:00* - Breakfast\n";
        let merged = merge_entry(content, "- *11:00* - Lunch").unwrap();
        assert_eq!(
            entries_after_header(&merged),
            vec![
                "- *09:00* - Breakfast",
                "- *10:00* - Coffee",
                "- *11:00* - Lunch",
                "- *14:00* - Meeting",
            ]
        );
    }

    #[test]
    fn sort_key_is_case_insensitive() {
        let content =
            "# Log\n- *10:00* - zebra task\n- *11:00* - Apple picking\n- *12:00* - BANANA break\n";
        let merged = merge_entry(content, "- *13:00* - berry smoothie").unwrap();
        // The timestamp leads the comparison, so lowercase-key order keeps
        // the original relative order here.
        assert_eq!(
            entries_after_header(&merged),
            vec![
                "- *10:00* - zebra task",
                "- *11:00* - Apple picking",
                "- *12:00* - BANANA break",
                "- *13:00* - berry smoothie",
            ]
        );
    }

    #[test]
    fn reappending_existing_entry_is_idempotent() {
        let content = "# Log\n- *10:00* - Coffee\n- *11:00* - Lunch\n";
        let merged = merge_entry(content, "- *10:00* - Coffee").unwrap();
        assert_eq!(
            entries_after_header(&merged),
            vec!["- *10:00* - Coffee", "- *11:00* - Lunch"]
        );
    }

    #[test]
    fn dedup_is_exact_string_only() {
        // Same text with different case is two distinct entries.
        let content = "# Log\n- coffee\n";
        let merged = merge_entry(content, "- Coffee").unwrap();
        // Equal sort keys: the stable sort keeps the existing line first.
        assert_eq!(entries_after_header(&merged), vec!["- coffee", "- Coffee"]);
    }

    #[test]
    fn interior_blank_lines_are_collapsed() {
        let content = "# Log\n\n- *10:00* - First entry\n\n- *12:00* - Second entry\n\n";
        let merged = merge_entry(content, "- *11:00* - Middle entry").unwrap();
        assert_eq!(
            merged,
            "# Log\n\n- *10:00* - First entry\n- *11:00* - Middle entry\n- *12:00* - Second entry\n"
        );
    }

    #[test]
    fn blank_entry_resorts_without_adding() {
        let content = "# Log\n- b\n- a\n";
        let merged = merge_entry(content, "  ").unwrap();
        assert_eq!(merged, "# Log\n\n- a\n- b\n");
    }

    #[test]
    fn blank_entry_into_empty_section_leaves_no_separator() {
        let content = "# Log\n\n# Footer\n";
        let merged = merge_entry(content, "").unwrap();
        assert_eq!(merged, "# Log\n# Footer\n");
    }

    #[test]
    fn surrounding_structure_is_preserved() {
        let content = "\
---
name: Tuesday, July 29th 2025
---
[[_2025-Index|2025]] | [[07-July 2025|July 2025]]

# Tue, Jul 29

# Reference
![[Active Projects#All Active Projects]]

# Details

# Log

- *09:00* - Morning coffee
- *14:00* - Team meeting
- *12:00* - Lunch break

# Footer
End of file
";
        let merged = merge_entry(content, "- *10:30* - Code review").unwrap();
        assert!(merged.contains("# Reference\n![[Active Projects#All Active Projects]]\n"));
        assert!(merged.contains("# Details\n"));
        assert!(merged.contains("# Footer\nEnd of file\n"));
        assert_eq!(
            entries_after_header(&merged),
            vec![
                "- *09:00* - Morning coffee",
                "- *10:30* - Code review",
                "- *12:00* - Lunch break",
                "- *14:00* - Team meeting",
            ]
        );
    }

    #[test]
    fn section_at_eof_appends_without_extra_content() {
        let content = "# Some Header\nContent\n\n# Log\n- *10:00* - First entry\n";
        let merged = merge_entry(content, "- *09:00* - Earlier entry").unwrap();
        assert!(merged.ends_with("- *09:00* - Earlier entry\n- *10:00* - First entry\n"));
    }

    // ── Filesystem wrapper ────────────────────────────────────────────

    #[test]
    fn append_entry_rewrites_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Log\n- *10:00* - Coffee\n").unwrap();
        append_entry(file.path(), "- *09:00* - Breakfast").unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(
            content,
            "# Log\n\n- *09:00* - Breakfast\n- *10:00* - Coffee\n"
        );
    }

    #[test]
    fn append_entry_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.md");
        let err = append_entry(&path, "- x").unwrap_err();
        assert!(matches!(err, SectionError::FileNotFound(_)));
    }

    #[test]
    fn append_entry_missing_header_leaves_file_unchanged() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "# Notes\nnothing to see\n").unwrap();
        let err = append_entry(file.path(), "- x").unwrap_err();
        assert!(matches!(err, SectionError::SectionNotFound(_)));
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "# Notes\nnothing to see\n");
    }
}
