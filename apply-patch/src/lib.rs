mod hunks;
mod parser;
mod sanitize;
mod seek_sequence;

pub use hunks::apply_diff;
pub use parser::ParseError;
pub use parser::PatchSection;
pub use parser::parse_patch;
pub use sanitize::extract_create_content;
pub use sanitize::sanitize_diff;
use similar::TextDiff;
use thiserror::Error;

/// Number of unchanged lines shown around each change in rendered previews.
pub const DIFF_CONTEXT_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyDiffError {
    #[error("diff does not contain any changes")]
    EmptyDiff,
    #[error("invalid diff line {line_number}: '{line}'")]
    InvalidHunkLine { line_number: usize, line: String },
    #[error("hunk context not found: {context:?}")]
    HunkNotFound { context: String },
    #[error("hunk context is not unique: {context:?} matches {matches} locations")]
    AmbiguousHunk { context: String, matches: usize },
}

/// Render a unified diff between `old` and `new` with `---`/`+++` file headers.
///
/// Returns an empty string when the two texts are identical.
pub fn unified_diff(old: &str, new: &str, old_header: &str, new_header: &str) -> String {
    if old == new {
        return String::new();
    }
    let text_diff = TextDiff::from_lines(old, new);
    text_diff
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header(old_header, new_header)
        .to_string()
}
