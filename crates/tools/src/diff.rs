//! Line diffs shown to the user after file edits.

use std::path::Path;

use similar::{ChangeTag, TextDiff};

const RULE: &str = "───────────────────────────────────────────────────────";

/// Render a compact line diff between `old` and `new` with two lines of
/// context per hunk and a `+N -M lines` summary.
pub fn render_diff(path: &Path, old: &str, new: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = format!("{}\n{RULE}\n", path.display());
    let mut added = 0usize;
    let mut removed = 0usize;

    for (idx, group) in diff.grouped_ops(2).iter().enumerate() {
        if idx > 0 {
            output.push_str("  ...\n");
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let prefix = match change.tag() {
                    ChangeTag::Delete => {
                        removed += 1;
                        "- "
                    }
                    ChangeTag::Insert => {
                        added += 1;
                        "+ "
                    }
                    ChangeTag::Equal => "  ",
                };
                output.push_str(prefix);
                output.push_str(change.value());
                if change.missing_newline() {
                    output.push('\n');
                }
            }
        }
    }

    output.push_str(RULE);
    output.push_str(&format!("\n +{added} -{removed} lines"));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_additions_and_deletions() {
        let out = render_diff(Path::new("/tmp/a.txt"), "one\ntwo\nthree\n", "one\n2\nthree\nfour\n");
        assert!(out.starts_with("/tmp/a.txt\n"));
        assert!(out.contains("- two\n"));
        assert!(out.contains("+ 2\n"));
        assert!(out.contains("+ four\n"));
        assert!(out.ends_with(" +2 -1 lines"));
    }

    #[test]
    fn new_file_is_all_additions() {
        let out = render_diff(Path::new("new.rs"), "", "fn main() {}");
        assert!(out.contains("+ fn main() {}\n"));
        assert!(out.ends_with(" +1 -0 lines"));
    }

    #[test]
    fn identical_content_has_no_changes() {
        let out = render_diff(Path::new("same"), "a\n", "a\n");
        assert!(out.ends_with(" +0 -0 lines"));
    }
}
