//! Unified-style diff generation for `FileChange`.

use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;

/// Render a unified diff between `original` and `modified`, labeled with
/// `path`. Used exclusively by `FileChange::new`; never by the toolkit
/// itself (the toolkit writes the *new* content, the diff is a reporting
/// artifact).
pub fn unified_diff(path: &str, original: &str, modified: &str) -> String {
    let diff = TextDiff::from_lines(original, modified);
    let mut out = String::new();
    let _ = writeln!(out, "--- a/{path}");
    let _ = writeln!(out, "+++ b/{path}");
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        let _ = write!(out, "{sign}{change}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_marks_changed_lines() {
        let diff = unified_diff(
            "Header.tsx",
            "line one\nline two\n",
            "line one\nline TWO\n",
        );
        assert!(diff.contains("-line two"));
        assert!(diff.contains("+line TWO"));
    }
}
