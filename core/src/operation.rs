//! Canonical shapes for agent-proposed file operations and the normalization boundary that
//! produces them from loosely shaped JSON tool-call entries.

use serde_json::Map;
use serde_json::Value;
use strum_macros::Display;
use wangr_apply_patch::PatchSection;
use wangr_apply_patch::extract_create_content;
use wangr_apply_patch::parse_patch;
use wangr_protocol::protocol::PendingFileOpsEvent;

use crate::error::OperationError;

const MISSING_TYPE_OR_PATH: &str = "Operation must include 'type' and 'path'.";

/// One requested filesystem action, validated in shape but not yet against the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOperation {
    CreateFile { path: String, content: String },
    UpdateFile { path: String, diff: String },
    DeleteFile { path: String },
    ReadFile { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum OperationKind {
    CreateFile,
    UpdateFile,
    DeleteFile,
    ReadFile,
}

impl FileOperation {
    pub fn path(&self) -> &str {
        match self {
            FileOperation::CreateFile { path, .. }
            | FileOperation::UpdateFile { path, .. }
            | FileOperation::DeleteFile { path }
            | FileOperation::ReadFile { path } => path,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            FileOperation::CreateFile { .. } => OperationKind::CreateFile,
            FileOperation::UpdateFile { .. } => OperationKind::UpdateFile,
            FileOperation::DeleteFile { .. } => OperationKind::DeleteFile,
            FileOperation::ReadFile { .. } => OperationKind::ReadFile,
        }
    }
}

/// Normalize a single operation.
///
/// Accepts the flat shape `{type, path, diff}` as well as a tool-call entry wrapping it as
/// `{operation: {type, path, ...}, diff?}`, in which case an outer `diff` fills in for a
/// missing inner one.
pub fn normalize(raw: &Value) -> Result<FileOperation, OperationError> {
    let outer = raw
        .as_object()
        .ok_or_else(|| OperationError::InvalidOperation("Operation must be an object.".into()))?;
    let inner = match outer.get("operation") {
        Some(Value::Object(inner)) => inner,
        _ => outer,
    };

    let op_type = non_empty_str(inner, "type");
    let path = non_empty_str(inner, "path");
    let (Some(op_type), Some(path)) = (op_type, path) else {
        return Err(OperationError::InvalidOperation(MISSING_TYPE_OR_PATH.into()));
    };
    let path = path.to_string();
    let diff = inner
        .get("diff")
        .or_else(|| outer.get("diff"))
        .and_then(Value::as_str);

    match op_type {
        "create_file" => {
            let content = match (diff, inner.get("content").and_then(Value::as_str)) {
                (Some(diff), _) => extract_create_content(diff),
                (None, Some(content)) => content.to_string(),
                (None, None) => String::new(),
            };
            Ok(FileOperation::CreateFile { path, content })
        }
        "update_file" => {
            let diff = diff.ok_or_else(|| {
                OperationError::InvalidOperation(format!("update_file for {path} has no diff."))
            })?;
            Ok(FileOperation::UpdateFile {
                path,
                diff: diff.to_string(),
            })
        }
        "delete_file" => Ok(FileOperation::DeleteFile { path }),
        "read_file" => Ok(FileOperation::ReadFile { path }),
        other => Err(OperationError::UnsupportedOperation(other.to_string())),
    }
}

/// Convert a multi-file patch blob into operations, in blob order.
pub fn parse_patch_blob(patch: &str) -> Result<Vec<FileOperation>, OperationError> {
    let sections =
        parse_patch(patch).map_err(|e| OperationError::InvalidOperation(e.to_string()))?;
    Ok(sections
        .into_iter()
        .map(|section| match section {
            PatchSection::AddFile { path, diff } => FileOperation::CreateFile {
                path,
                content: extract_create_content(&diff),
            },
            PatchSection::UpdateFile { path, diff } => FileOperation::UpdateFile { path, diff },
            PatchSection::DeleteFile { path } => FileOperation::DeleteFile { path },
        })
        .collect())
}

fn non_empty_str<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// How the client must treat a pending entry, decided by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Mutating; subject to preview and user approval.
    ApplyPatch,
    /// Executed unconditionally.
    ReadFile,
    /// Executed unconditionally.
    ListFiles,
    Other(String),
}

/// One tool-call entry of a pending batch, kept raw until it is normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEntry {
    pub call_id: Option<String>,
    pub kind: EntryKind,
    pub raw: Value,
}

impl PendingEntry {
    pub fn from_value(raw: Value) -> Self {
        let call_id = raw
            .get("call_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let kind = match raw.get("type").and_then(Value::as_str) {
            Some("apply_patch") => EntryKind::ApplyPatch,
            Some("read_file") => EntryKind::ReadFile,
            Some("list_files") => EntryKind::ListFiles,
            Some(other) => EntryKind::Other(other.to_string()),
            None => EntryKind::Other(String::new()),
        };
        Self { call_id, kind, raw }
    }

    /// The operations an `apply_patch` or `read_file` entry stands for.
    ///
    /// An entry carrying a patch blob (`patch` or `input`) instead of a structured
    /// `operation` expands to one operation per file section.
    pub fn operations(&self) -> Result<Vec<FileOperation>, OperationError> {
        let has_operation = self.raw.get("operation").is_some_and(Value::is_object);
        let blob = ["patch", "input"]
            .iter()
            .find_map(|key| self.raw.get(*key).and_then(Value::as_str));
        match blob {
            Some(blob) if !has_operation => parse_patch_blob(blob),
            _ => normalize(&self.raw).map(|op| vec![op]),
        }
    }

    /// Best-effort path for messages about an entry that failed to normalize.
    pub fn display_path(&self) -> String {
        self.raw
            .get("operation")
            .and_then(|op| op.get("path"))
            .or_else(|| self.raw.get("path"))
            .and_then(Value::as_str)
            .unwrap_or("<unknown>")
            .to_string()
    }
}

/// A named, resumable set of proposed operations issued by the agent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PendingBatch {
    pub id: Option<String>,
    pub entries: Vec<PendingEntry>,
}

impl PendingBatch {
    pub fn has_patch_entries(&self) -> bool {
        self.entries.iter().any(|e| e.kind == EntryKind::ApplyPatch)
    }
}

impl From<PendingFileOpsEvent> for PendingBatch {
    fn from(event: PendingFileOpsEvent) -> Self {
        Self {
            id: event.id.filter(|id| !id.is_empty()),
            entries: event
                .operations
                .into_iter()
                .map(PendingEntry::from_value)
                .collect(),
        }
    }
}
