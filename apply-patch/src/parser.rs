//! Parsing of the compact multi-file patch blob some agent tool calls send instead of
//! structured operations. It only splits the blob into per-file sections; hunk bodies are
//! left as text for [`crate::apply_diff`] and [`crate::extract_create_content`].
//!
//! patch: begin_patch? section+ end_patch?
//! begin_patch: "*** Begin Patch" LF
//! end_patch: "*** End Patch" LF?
//!
//! section: add_section | delete_section | update_section
//! add_section: "*** Add File: " filename LF add_line*
//! delete_section: "*** Delete File: " filename LF
//! update_section: "*** Update File: " filename LF change_line+
//!
//! Leading/trailing whitespace around markers is tolerated. `*** Move to:` is rejected.
use thiserror::Error;

const BEGIN_PATCH_MARKER: &str = "*** Begin Patch";
const END_PATCH_MARKER: &str = "*** End Patch";
const ADD_FILE_MARKER: &str = "*** Add File: ";
const DELETE_FILE_MARKER: &str = "*** Delete File: ";
const UPDATE_FILE_MARKER: &str = "*** Update File: ";
const MOVE_TO_MARKER: &str = "*** Move to: ";
const EOF_MARKER: &str = "*** End of File";

#[derive(Debug, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid patch: {0}")]
    InvalidPatchError(String),
    #[error("invalid hunk at line {line_number}, {message}")]
    InvalidHunkError { message: String, line_number: usize },
}
use ParseError::*;

#[derive(Debug, Clone, PartialEq)]
pub enum PatchSection {
    AddFile { path: String, diff: String },
    UpdateFile { path: String, diff: String },
    DeleteFile { path: String },
}

impl PatchSection {
    pub fn path(&self) -> &str {
        match self {
            PatchSection::AddFile { path, .. }
            | PatchSection::UpdateFile { path, .. }
            | PatchSection::DeleteFile { path } => path,
        }
    }
}

pub fn parse_patch(patch: &str) -> Result<Vec<PatchSection>, ParseError> {
    let all_lines: Vec<&str> = patch.trim().lines().collect();
    let mut lines = all_lines.as_slice();
    let mut line_number = 1;
    if lines.first().is_some_and(|l| l.trim() == BEGIN_PATCH_MARKER) {
        lines = &lines[1..];
        line_number += 1;
    }
    if lines.last().is_some_and(|l| l.trim() == END_PATCH_MARKER) {
        lines = &lines[..lines.len() - 1];
    }

    let mut sections = Vec::new();
    while !lines.is_empty() {
        if lines[0].trim().is_empty() {
            lines = &lines[1..];
            line_number += 1;
            continue;
        }
        let (section, consumed) = parse_one_section(lines, line_number)?;
        sections.push(section);
        line_number += consumed;
        lines = &lines[consumed..];
    }
    if sections.is_empty() {
        return Err(InvalidPatchError(
            "patch does not contain any file sections".to_string(),
        ));
    }
    Ok(sections)
}

/// Parse the section starting at `lines[0]`, returning it with the number of lines consumed.
fn parse_one_section(
    lines: &[&str],
    line_number: usize,
) -> Result<(PatchSection, usize), ParseError> {
    let first_line = lines[0].trim();
    if let Some(path) = first_line.strip_prefix(ADD_FILE_MARKER) {
        let body = section_body(&lines[1..]);
        return Ok((
            PatchSection::AddFile {
                path: path.trim().to_string(),
                diff: body.join("\n"),
            },
            body.len() + 1,
        ));
    } else if let Some(path) = first_line.strip_prefix(DELETE_FILE_MARKER) {
        return Ok((
            PatchSection::DeleteFile {
                path: path.trim().to_string(),
            },
            1,
        ));
    } else if let Some(path) = first_line.strip_prefix(UPDATE_FILE_MARKER) {
        if lines
            .get(1)
            .is_some_and(|l| l.trim_start().starts_with(MOVE_TO_MARKER))
        {
            return Err(InvalidHunkError {
                message: format!("moving '{}' is not supported", path.trim()),
                line_number: line_number + 1,
            });
        }
        let body = section_body(&lines[1..]);
        if body.iter().all(|l| l.trim().is_empty()) {
            return Err(InvalidHunkError {
                message: format!("Update file hunk for path '{}' is empty", path.trim()),
                line_number,
            });
        }
        return Ok((
            PatchSection::UpdateFile {
                path: path.trim().to_string(),
                diff: body.join("\n"),
            },
            body.len() + 1,
        ));
    }

    Err(InvalidHunkError {
        message: format!(
            "'{first_line}' is not a valid hunk header. Valid hunk headers: '*** Add File: {{path}}', '*** Delete File: {{path}}', '*** Update File: {{path}}'"
        ),
        line_number,
    })
}

/// Lines up to (not including) the next `***` section marker.
fn section_body<'a>(lines: &[&'a str]) -> Vec<&'a str> {
    lines
        .iter()
        .take_while(|l| !l.starts_with("***") || l.trim() == EOF_MARKER)
        .copied()
        .collect()
}
