//! Removal of patch framing and VCS header lines that agents wrap around diff fragments.
//!
//! Both content extraction and hunk application run on sanitized text, so everything here
//! must be idempotent: `sanitize_diff(&sanitize_diff(x)) == sanitize_diff(x)`.

const BEGIN_PATCH_MARKER: &str = "*** Begin Patch";
const END_PATCH_MARKER: &str = "*** End Patch";
const ADD_FILE_MARKER: &str = "*** Add File:";
const DELETE_FILE_MARKER: &str = "*** Delete File:";
const UPDATE_FILE_MARKER: &str = "*** Update File:";
const GIT_DIFF_MARKER: &str = "diff --git ";
const GIT_INDEX_MARKER: &str = "index ";
const OLD_FILE_HEADER: &str = "--- ";
const NEW_FILE_HEADER: &str = "+++ ";

/// Strip patch-marker lines from `diff`.
///
/// `---`/`+++` lines are only treated as headers when they appear as an adjacent pair, so a
/// removed line whose text happens to begin with `-- ` survives.
pub fn sanitize_diff(diff: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();
    for line in diff.lines() {
        if is_marker_line(line) {
            continue;
        }
        if line.starts_with(NEW_FILE_HEADER)
            && kept.last().is_some_and(|prev| prev.starts_with(OLD_FILE_HEADER))
        {
            kept.pop();
            continue;
        }
        kept.push(line);
    }
    kept.join("\n")
}

/// Turn a `+`-prefixed create fragment into literal file content.
///
/// Unprefixed whitespace-only lines become empty lines; other lines without a `+` prefix
/// are kept verbatim. No trailing newline is added.
pub fn extract_create_content(diff: &str) -> String {
    sanitize_diff(diff)
        .lines()
        .map(|line| match line.strip_prefix('+') {
            Some(content) => content,
            None if line.trim().is_empty() => "",
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Markers only count at column 0; an indented one is diff context.
fn is_marker_line(line: &str) -> bool {
    line.trim_end() == BEGIN_PATCH_MARKER
        || line.trim_end() == END_PATCH_MARKER
        || line.starts_with(ADD_FILE_MARKER)
        || line.starts_with(DELETE_FILE_MARKER)
        || line.starts_with(UPDATE_FILE_MARKER)
        || line.starts_with(GIT_DIFF_MARKER)
        || is_git_index_line(line)
}

/// `index 1a2b3c4..5d6e7f8 100644`
fn is_git_index_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix(GIT_INDEX_MARKER) else {
        return false;
    };
    let Some(range) = rest.split_whitespace().next() else {
        return false;
    };
    let Some((from, to)) = range.split_once("..") else {
        return false;
    };
    let is_hash = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit());
    is_hash(from) && is_hash(to)
}
