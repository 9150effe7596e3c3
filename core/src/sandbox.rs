//! Confinement of agent-supplied paths to the workspace root.

use std::ffi::OsStr;
use std::path::Path;
use std::path::PathBuf;

use path_clean::PathClean;

use crate::error::SandboxErr;

/// Resolve the workspace-relative `path` against `base`.
///
/// Rejects absolute paths, and any path whose lexically cleaned form or whose
/// symlink-resolved form is not inside the canonicalized `base`. The target itself
/// does not need to exist. Never touches file contents.
pub fn resolve_path(base: &Path, path: &str) -> Result<PathBuf, SandboxErr> {
    let candidate = Path::new(path);
    if candidate.is_absolute() || candidate.has_root() {
        return Err(SandboxErr::AbsolutePath(path.to_string()));
    }

    let root = base
        .canonicalize()
        .map_err(|source| SandboxErr::RootUnavailable {
            root: base.to_path_buf(),
            source,
        })?;

    let joined = root.join(candidate).clean();
    if !joined.starts_with(&root) {
        return Err(SandboxErr::EscapesRoot(path.to_string()));
    }

    // Symlinks inside the workspace may still point outside of it.
    let resolved = resolve_existing_prefix(&joined)
        .ok_or_else(|| SandboxErr::EscapesRoot(path.to_string()))?;
    if !resolved.starts_with(&root) {
        return Err(SandboxErr::EscapesRoot(path.to_string()));
    }
    Ok(resolved)
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
/// Returns `None` for a dangling symlink, whose eventual target cannot be checked.
fn resolve_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut missing: Vec<&OsStr> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for component in missing.iter().rev() {
                    resolved.push(component);
                }
                return Some(resolved);
            }
            Err(_) if existing.symlink_metadata().is_ok() => return None,
            Err(_) => {
                missing.push(existing.file_name()?);
                existing = existing.parent()?;
            }
        }
    }
}
