//! Read-only planning of file operations. The executor applies exactly what is planned here,
//! so previews and applied changes cannot drift apart.

use std::path::Path;
use std::path::PathBuf;

use wangr_apply_patch::apply_diff;
use wangr_apply_patch::unified_diff;

use crate::error::OperationError;
use crate::operation::FileOperation;
use crate::sandbox::resolve_path;

const DELETED_HEADER: &str = "(deleted)";

/// Old and new content of one planned mutation. `None` means the file is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// Workspace-relative path as the agent wrote it.
    pub display_path: String,
    /// Sandbox-resolved absolute path.
    pub path: PathBuf,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl PlannedChange {
    pub fn is_noop(&self) -> bool {
        self.old == self.new
    }

    /// Unified diff of the change, or an empty string when nothing changes.
    pub fn unified_diff(&self) -> String {
        let new_header = if self.new.is_none() {
            DELETED_HEADER
        } else {
            self.display_path.as_str()
        };
        unified_diff(
            self.old.as_deref().unwrap_or_default(),
            self.new.as_deref().unwrap_or_default(),
            &self.display_path,
            new_header,
        )
    }
}

/// Compute what `op` would do under `base` without writing anything.
pub fn plan_change(op: &FileOperation, base: &Path) -> Result<PlannedChange, OperationError> {
    let display_path = op.path().to_string();
    let path = resolve_path(base, op.path())?;
    let (old, new) = match op {
        FileOperation::CreateFile { content, .. } => {
            if path.exists() {
                return Err(OperationError::FileAlreadyExists(display_path));
            }
            (None, Some(content.clone()))
        }
        FileOperation::UpdateFile { diff, .. } => {
            let old = read_existing_file(&path, &display_path)?;
            let new = apply_diff(&old, diff)?;
            (Some(old), Some(new))
        }
        FileOperation::DeleteFile { .. } => {
            let bytes = match std::fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(OperationError::FileNotFound(display_path));
                }
                Err(_) if path.is_dir() => return Err(OperationError::NotAFile(display_path)),
                Err(e) => return Err(e.into()),
            };
            (Some(String::from_utf8_lossy(&bytes).into_owned()), None)
        }
        FileOperation::ReadFile { .. } => {
            return Err(OperationError::UnsupportedOperation(op.kind().to_string()));
        }
    };
    Ok(PlannedChange {
        display_path,
        path,
        old,
        new,
    })
}

/// Unified diff for `op`, or an empty string when it would not change anything.
pub fn preview(op: &FileOperation, base: &Path) -> Result<String, OperationError> {
    Ok(plan_change(op, base)?.unified_diff())
}

fn read_existing_file(path: &Path, display_path: &str) -> Result<String, OperationError> {
    if !path.exists() {
        return Err(OperationError::FileNotFound(display_path.to_string()));
    }
    if !path.is_file() {
        return Err(OperationError::NotAFile(display_path.to_string()));
    }
    Ok(std::fs::read_to_string(path)?)
}
