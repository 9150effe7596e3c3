//! Context-matching hunk application for `update_file` diffs.
//!
//! A diff is split into hunks on `@@` headers (a diff without any header is one hunk). Lines
//! starting with ` ` or `-` form the old chunk, lines starting with ` ` or `+` the new chunk.
//! Each old chunk must occur exactly once in the progressively updated file.

use crate::ApplyDiffError;
use crate::sanitize::sanitize_diff;
use crate::seek_sequence::seek_all;

const HUNK_HEADER_MARKER: &str = "@@";
const EOF_MARKER: &str = "*** End of File";
const NO_NEWLINE_MARKER: char = '\\';

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Hunk {
    /// Line named by a `@@ <text>` header; the old chunk is searched after it.
    pub anchor: Option<String>,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
}

impl Hunk {
    fn is_empty(&self) -> bool {
        self.old_lines.is_empty() && self.new_lines.is_empty()
    }
}

/// Parse a sanitized diff into hunks.
pub(crate) fn parse_hunks(diff: &str) -> Result<Vec<Hunk>, ApplyDiffError> {
    // (header anchor, 1-based line number of each body line, body line)
    let mut sections: Vec<(Option<String>, Vec<(usize, &str)>)> = Vec::new();
    for (idx, line) in diff.lines().enumerate() {
        if line.starts_with(HUNK_HEADER_MARKER) {
            sections.push((parse_header(line), Vec::new()));
            continue;
        }
        if line.starts_with(NO_NEWLINE_MARKER) || line.trim() == EOF_MARKER {
            continue;
        }
        if sections.is_empty() {
            sections.push((None, Vec::new()));
        }
        if let Some((_, body)) = sections.last_mut() {
            body.push((idx + 1, line));
        }
    }

    let mut hunks = Vec::new();
    for (anchor, mut body) in sections {
        // Blank lines trailing a hunk separate it from the next header and are not context.
        while body.last().is_some_and(|(_, line)| line.is_empty()) {
            body.pop();
        }
        let mut hunk = Hunk {
            anchor,
            ..Default::default()
        };
        for (line_number, line) in body {
            match line.chars().next() {
                None => {
                    hunk.old_lines.push(String::new());
                    hunk.new_lines.push(String::new());
                }
                Some(' ') => {
                    hunk.old_lines.push(line[1..].to_string());
                    hunk.new_lines.push(line[1..].to_string());
                }
                Some('-') => hunk.old_lines.push(line[1..].to_string()),
                Some('+') => hunk.new_lines.push(line[1..].to_string()),
                _ => {
                    return Err(ApplyDiffError::InvalidHunkLine {
                        line_number,
                        line: line.to_string(),
                    });
                }
            }
        }
        if !hunk.is_empty() {
            hunks.push(hunk);
        }
    }
    Ok(hunks)
}

/// `@@` and `@@ -a,b +c,d @@ ...` carry no anchor; `@@ fn main() {` anchors on that line.
fn parse_header(line: &str) -> Option<String> {
    let rest = line[HUNK_HEADER_MARKER.len()..].trim();
    if rest.is_empty() {
        return None;
    }
    let mut chars = rest.chars();
    let is_range = chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_ascii_digit());
    if is_range {
        None
    } else {
        Some(rest.to_string())
    }
}

/// Apply `diff` to `content`, returning the new content.
pub fn apply_diff(content: &str, diff: &str) -> Result<String, ApplyDiffError> {
    let hunks = parse_hunks(&sanitize_diff(diff))?;
    if hunks.is_empty() {
        return Err(ApplyDiffError::EmptyDiff);
    }

    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let had_trailing_newline = content.ends_with('\n');
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    // Drop the trailing empty element produced by the final newline.
    if lines.last().is_some_and(|s| s.is_empty()) {
        lines.pop();
    }

    for hunk in &hunks {
        let floor = match &hunk.anchor {
            Some(anchor) => unique_match(&lines, std::slice::from_ref(anchor), 0)? + 1,
            None => 0,
        };
        if hunk.old_lines.is_empty() {
            // Pure addition: right after the anchor, or at the end of the file.
            let at = if hunk.anchor.is_some() {
                floor
            } else {
                lines.len()
            };
            lines.splice(at..at, hunk.new_lines.iter().cloned());
            continue;
        }
        let start = unique_match(&lines, &hunk.old_lines, floor)?;
        lines.splice(
            start..start + hunk.old_lines.len(),
            hunk.new_lines.iter().cloned(),
        );
    }

    let mut new_content = lines.join(newline);
    if had_trailing_newline && !lines.is_empty() && !new_content.ends_with('\n') {
        new_content.push_str(newline);
    }
    Ok(new_content)
}

fn unique_match(
    lines: &[String],
    pattern: &[String],
    start: usize,
) -> Result<usize, ApplyDiffError> {
    let context = pattern
        .iter()
        .find(|l| !l.trim().is_empty())
        .or(pattern.first())
        .cloned()
        .unwrap_or_default();
    match seek_all(lines, pattern, start).as_slice() {
        [] => Err(ApplyDiffError::HunkNotFound { context }),
        [idx] => Ok(*idx),
        many => Err(ApplyDiffError::AmbiguousHunk {
            context,
            matches: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_headerless_diff_as_single_hunk() {
        let hunks = parse_hunks(" a\n-b\n+c").unwrap_or_default();
        assert_eq!(
            hunks,
            vec![Hunk {
                anchor: None,
                old_lines: vec!["a".into(), "b".into()],
                new_lines: vec!["a".into(), "c".into()],
            }]
        );
    }

    #[test]
    fn distinguishes_range_headers_from_anchors() {
        assert_eq!(parse_header("@@"), None);
        assert_eq!(parse_header("@@ -3,4 +3,5 @@ fn x()"), None);
        assert_eq!(parse_header("@@ class Foo:"), Some("class Foo:".to_string()));
    }

    #[test]
    fn rejects_lines_without_diff_prefix() {
        assert_eq!(
            parse_hunks("@@\n a\nbogus"),
            Err(ApplyDiffError::InvalidHunkLine {
                line_number: 3,
                line: "bogus".to_string()
            })
        );
    }

    #[test]
    fn replaces_unique_context() {
        let content = "one\ntwo\nthree\n";
        let diff = "@@\n one\n-two\n+2\n three";
        assert_eq!(apply_diff(content, diff), Ok("one\n2\nthree\n".to_string()));
    }

    #[test]
    fn applies_hunks_in_order_against_updated_lines() {
        let content = "a\nb\nc\nd\n";
        let diff = "@@\n-a\n+A\n@@\n A\n-b\n+B\n@@\n-d\n+D\n";
        assert_eq!(apply_diff(content, diff), Ok("A\nB\nc\nD\n".to_string()));
    }

    #[test]
    fn duplicated_context_is_ambiguous() {
        let block = "start\nmiddle\nend\n";
        let content = format!("{block}---\n{block}");
        let diff = "@@\n start\n-middle\n+MIDDLE\n end";
        assert_eq!(
            apply_diff(&content, diff),
            Err(ApplyDiffError::AmbiguousHunk {
                context: "start".to_string(),
                matches: 2
            })
        );
    }

    #[test]
    fn anchor_disambiguates_repeated_blocks() {
        let content = "fn a() {\n    x\n}\nfn b() {\n    x\n}\n";
        let diff = "@@ fn b() {\n-    x\n+    y";
        assert_eq!(
            apply_diff(content, diff),
            Ok("fn a() {\n    x\n}\nfn b() {\n    y\n}\n".to_string())
        );
    }

    #[test]
    fn missing_context_is_reported() {
        assert_eq!(
            apply_diff("alpha\n", "@@\n-beta\n+gamma"),
            Err(ApplyDiffError::HunkNotFound {
                context: "beta".to_string()
            })
        );
    }

    #[test]
    fn preserves_absence_and_presence_of_trailing_newline() {
        assert_eq!(apply_diff("x\ny", "-y\n+z"), Ok("x\nz".to_string()));
        assert_eq!(apply_diff("x\ny\n", "-y\n+z"), Ok("x\nz\n".to_string()));
    }

    #[test]
    fn pure_addition_appends_to_end_of_file() {
        assert_eq!(
            apply_diff("a\n", "@@\n+b\n+c"),
            Ok("a\nb\nc\n".to_string())
        );
    }

    #[test]
    fn ignores_no_newline_markers_and_git_headers() {
        let diff = "--- a/f\n+++ b/f\n@@ -1 +1 @@\n-old\n\\ No newline at end of file\n+new\n\\ No newline at end of file";
        assert_eq!(apply_diff("old", diff), Ok("new".to_string()));
    }

    #[test]
    fn diff_without_changes_is_rejected() {
        assert_eq!(apply_diff("a\n", "@@\n\n"), Err(ApplyDiffError::EmptyDiff));
    }

    #[test]
    fn indented_patch_marker_is_matching_context() {
        let content = "intro\n*** Update File: x\nold\nold\n";
        assert_eq!(
            apply_diff(content, "@@\n *** Update File: x\n-old\n+new"),
            Ok("intro\n*** Update File: x\nnew\nold\n".to_string())
        );
    }

    #[test]
    fn crlf_files_keep_crlf_endings() {
        assert_eq!(
            apply_diff("a\r\nb\r\nc\r\n", "@@\n a\n-b\n+B"),
            Ok("a\r\nB\r\nc\r\n".to_string())
        );
    }
}
