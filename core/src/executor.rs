//! The only component that mutates the workspace, plus the read-only local tools.

use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use wangr_protocol::protocol::ToolOutput;
use wildmatch::WildMatch;

use crate::categorize::PatchCall;
use crate::error::OperationError;
use crate::operation::FileOperation;
use crate::operation::PendingEntry;
use crate::operation::normalize;
use crate::preview::plan_change;
use crate::sandbox::resolve_path;

/// Reads refuse files larger than this many bytes.
pub const MAX_FILE_SIZE: u64 = 1_000_000;
/// Maximum number of lines returned by a numbered read.
pub const MAX_LINES: usize = 2000;
const MAX_LIST_RESULTS: usize = 100;
/// Upper bound on directory entries visited by a recursive listing.
const MAX_LIST_SCAN: usize = 10_000;

#[derive(Debug, Clone)]
pub struct LocalToolExecutor {
    root: PathBuf,
}

impl LocalToolExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Apply one operation, re-checking the sandbox and the operation's preconditions.
    pub fn apply(&self, op: &FileOperation) -> Result<String, OperationError> {
        let plan = plan_change(op, &self.root)?;
        let display_path = &plan.display_path;
        match (&plan.old, &plan.new) {
            (None, Some(content)) => {
                if let Some(parent) = plan.path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&plan.path, content)?;
                Ok(format!("Created {display_path}"))
            }
            (Some(_), Some(_)) if plan.is_noop() => Ok(format!("No changes for {display_path}")),
            (Some(_), Some(content)) => {
                std::fs::write(&plan.path, content)?;
                Ok(format!("Updated {display_path}"))
            }
            (Some(_), None) => {
                std::fs::remove_file(&plan.path)?;
                Ok(format!("Deleted {display_path}"))
            }
            (None, None) => Err(OperationError::UnsupportedOperation(op.kind().to_string())),
        }
    }

    /// Apply every operation of `call`. Never fails: errors are reported in the output, and a
    /// failing operation does not stop the ones after it.
    pub fn apply_call(&self, call: &PatchCall) -> ToolOutput {
        let mut lines = Vec::with_capacity(call.operations.len());
        let mut failed = false;
        for op in &call.operations {
            match self.apply(op) {
                Ok(message) => lines.push(message),
                Err(err) => {
                    tracing::warn!("failed to apply {} {}: {err}", op.kind(), op.path());
                    failed = true;
                    lines.push(format!("Error: {err}"));
                }
            }
        }
        let output = lines.join("\n");
        if failed {
            ToolOutput::failed(call.call_id.clone(), output)
        } else {
            ToolOutput::completed(call.call_id.clone(), output)
        }
    }

    /// Raw file content, subject to the sandbox and the size limit.
    pub fn read_raw(&self, path: &str) -> Result<String, OperationError> {
        let resolved = resolve_path(&self.root, path)?;
        let metadata = match std::fs::metadata(&resolved) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OperationError::FileNotFound(path.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        if !metadata.is_file() {
            return Err(OperationError::NotAFile(path.to_string()));
        }
        if metadata.len() > MAX_FILE_SIZE {
            return Err(OperationError::FileTooLarge {
                path: path.to_string(),
                size: metadata.len(),
                limit: MAX_FILE_SIZE,
            });
        }
        Ok(std::fs::read_to_string(&resolved)?)
    }

    /// Line-numbered view of a file, starting at the zero-based line `offset`.
    pub fn read_file(
        &self,
        path: &str,
        offset: usize,
        limit: usize,
    ) -> Result<String, OperationError> {
        let content = self.read_raw(path)?;
        let lines: Vec<&str> = content.lines().collect();
        let total = lines.len();
        let offset = offset.min(total);
        let limit = limit.min(MAX_LINES);
        let end = offset.saturating_add(limit).min(total);

        let numbered = lines[offset..end]
            .iter()
            .enumerate()
            .map(|(i, line)| format!("{:>6}| {line}", offset + i + 1))
            .collect::<Vec<_>>()
            .join("\n");

        let mut header = format!("File: {path} ({total} lines)");
        if offset > 0 || total > end {
            header.push_str(&format!(" [showing lines {}-{end}]", offset + 1));
        }
        Ok(format!("{header}\n{numbered}"))
    }

    /// List entries under `dir` whose relative path matches the glob `pattern`, directories
    /// first. Patterns containing `/` search recursively.
    pub fn list_files(&self, pattern: &str, dir: &str) -> Result<String, OperationError> {
        let search_root = resolve_path(&self.root, dir)?;
        if !search_root.exists() {
            return Err(OperationError::DirectoryNotFound(dir.to_string()));
        }
        if !search_root.is_dir() {
            return Err(OperationError::NotADirectory(dir.to_string()));
        }

        let recursive = pattern.contains('/');
        let mut found = Vec::new();
        collect_entries(&search_root, "", recursive, &mut found)?;

        let matcher = WildMatch::new(pattern);
        // `**/` also matches zero directories.
        let rootless = pattern.strip_prefix("**/").map(WildMatch::new);
        let mut matches: Vec<ListedEntry> = found
            .into_iter()
            .filter(|entry| {
                matcher.matches(&entry.relative)
                    || rootless.as_ref().is_some_and(|m| m.matches(&entry.relative))
            })
            .collect();
        matches.sort_by_key(|entry| (entry.size.is_some(), entry.relative.to_lowercase()));

        if matches.is_empty() {
            return Ok(format!("No files matching '{pattern}' in {dir}"));
        }
        let mut out = vec![format!("Files matching '{pattern}' in {dir}:")];
        for entry in matches.iter().take(MAX_LIST_RESULTS) {
            match entry.size {
                None => out.push(format!("  [dir]  {}/", entry.relative)),
                Some(size) => out.push(format!("  {:>6}  {}", format_size(size), entry.relative)),
            }
        }
        if matches.len() > MAX_LIST_RESULTS {
            out.push(format!(
                "  ... and {} more",
                matches.len() - MAX_LIST_RESULTS
            ));
        }
        Ok(out.join("\n"))
    }

    /// Execute a pending `read_file` entry. The output is the raw file content.
    pub fn execute_read_entry(&self, entry: &PendingEntry) -> ToolOutput {
        let result = normalize(&entry.raw).and_then(|op| self.read_raw(op.path()));
        match result {
            Ok(content) => ToolOutput::completed(entry.call_id.clone(), content),
            Err(err) => {
                tracing::warn!("read for call {:?} failed: {err}", entry.call_id);
                ToolOutput::failed(entry.call_id.clone(), format!("Error reading file: {err}"))
            }
        }
    }

    /// Execute a pending `list_files` entry (`pattern` defaults to `*`, `path` to `.`).
    pub fn execute_list_entry(&self, entry: &PendingEntry) -> ToolOutput {
        let (pattern, dir) = list_arguments(&entry.raw);
        match self.list_files(pattern, dir) {
            Ok(listing) => ToolOutput::completed(entry.call_id.clone(), listing),
            Err(err) => ToolOutput::failed(entry.call_id.clone(), format!("Error: {err}")),
        }
    }
}

/// `(pattern, path)` of a `list_files` entry, looking inside a nested `operation` first.
pub(crate) fn list_arguments(raw: &Value) -> (&str, &str) {
    let lookup = |key: &str| {
        raw.get("operation")
            .and_then(|op| op.get(key))
            .or_else(|| raw.get(key))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    };
    (lookup("pattern").unwrap_or("*"), lookup("path").unwrap_or("."))
}

struct ListedEntry {
    /// `/`-separated path relative to the listed directory.
    relative: String,
    /// `None` for directories.
    size: Option<u64>,
}

fn collect_entries(
    dir: &Path,
    prefix: &str,
    recursive: bool,
    out: &mut Vec<ListedEntry>,
) -> std::io::Result<()> {
    for dir_entry in std::fs::read_dir(dir)? {
        if out.len() >= MAX_LIST_SCAN {
            break;
        }
        let dir_entry = dir_entry?;
        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let relative = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        // Symlinks are listed but never followed.
        let file_type = dir_entry.file_type()?;
        if file_type.is_dir() {
            if recursive {
                collect_entries(&dir_entry.path(), &relative, recursive, out)?;
            }
            out.push(ListedEntry {
                relative,
                size: None,
            });
        } else {
            let size = dir_entry.metadata().map(|m| m.len()).unwrap_or_default();
            out.push(ListedEntry {
                relative,
                size: Some(size),
            });
        }
    }
    Ok(())
}

fn format_size(size: u64) -> String {
    if size >= 1_000_000 {
        format!("{:.1}M", size as f64 / 1_000_000.0)
    } else if size >= 1_000 {
        format!("{:.1}K", size as f64 / 1_000.0)
    } else {
        format!("{size}B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use wangr_protocol::protocol::ToolStatus;

    fn create(path: &str, content: &str) -> FileOperation {
        FileOperation::CreateFile {
            path: path.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn create_then_read_round_trips() {
        let root = TempDir::new().unwrap();
        let executor = LocalToolExecutor::new(root.path());
        let content = wangr_apply_patch::extract_create_content("+hello\n+world");
        assert_eq!(
            executor.apply(&create("docs/greeting.txt", &content)).unwrap(),
            "Created docs/greeting.txt"
        );
        assert_eq!(executor.read_raw("docs/greeting.txt").unwrap(), "hello\nworld");
    }

    #[test]
    fn update_and_delete_report_what_they_did() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("a.txt"), "one\ntwo\n").unwrap();
        let executor = LocalToolExecutor::new(root.path());

        let update = FileOperation::UpdateFile {
            path: "a.txt".to_string(),
            diff: "@@\n one\n-two\n+2".to_string(),
        };
        assert_eq!(executor.apply(&update).unwrap(), "Updated a.txt");
        assert_eq!(
            std::fs::read_to_string(root.path().join("a.txt")).unwrap(),
            "one\n2\n"
        );

        let delete = FileOperation::DeleteFile {
            path: "a.txt".to_string(),
        };
        assert_eq!(executor.apply(&delete).unwrap(), "Deleted a.txt");
        assert!(!root.path().join("a.txt").exists());
    }

    #[test]
    fn preconditions_are_rechecked_at_apply_time() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("exists.txt"), "x").unwrap();
        let executor = LocalToolExecutor::new(root.path());
        let err = executor.apply(&create("exists.txt", "y")).unwrap_err();
        assert_eq!(err.to_string(), "File already exists: exists.txt");
        assert_eq!(
            std::fs::read_to_string(root.path().join("exists.txt")).unwrap(),
            "x"
        );
    }

    #[test]
    fn apply_call_continues_after_a_failing_operation() {
        let root = TempDir::new().unwrap();
        let executor = LocalToolExecutor::new(root.path());
        let call = PatchCall {
            call_id: Some("c1".to_string()),
            operations: vec![
                create("one.txt", "1"),
                FileOperation::DeleteFile {
                    path: "missing.txt".to_string(),
                },
                create("two.txt", "2"),
            ],
        };
        let output = executor.apply_call(&call);
        assert_eq!(output.status, ToolStatus::Failed);
        assert_eq!(
            output.output,
            "Created one.txt\nError: File not found: missing.txt\nCreated two.txt"
        );
        assert!(root.path().join("two.txt").exists());
    }

    #[test]
    fn read_file_numbers_lines_and_reports_window() {
        let root = TempDir::new().unwrap();
        std::fs::write(root.path().join("f.txt"), "a\nb\nc\nd\n").unwrap();
        let executor = LocalToolExecutor::new(root.path());
        assert_eq!(
            executor.read_file("f.txt", 0, MAX_LINES).unwrap(),
            "File: f.txt (4 lines)\n     1| a\n     2| b\n     3| c\n     4| d"
        );
        assert_eq!(
            executor.read_file("f.txt", 1, 2).unwrap(),
            "File: f.txt (4 lines) [showing lines 2-3]\n     2| b\n     3| c"
        );
    }

    #[test]
    fn reads_refuse_directories_and_oversized_files() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("dir")).unwrap();
        let big = vec![b'x'; (MAX_FILE_SIZE + 1) as usize];
        std::fs::write(root.path().join("big.bin"), big).unwrap();
        let executor = LocalToolExecutor::new(root.path());

        assert_eq!(
            executor.read_raw("dir").unwrap_err().to_string(),
            "Not a file: dir"
        );
        assert!(matches!(
            executor.read_raw("big.bin"),
            Err(OperationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn read_entry_failure_is_a_failed_output() {
        let root = TempDir::new().unwrap();
        let executor = LocalToolExecutor::new(root.path());
        let entry = PendingEntry::from_value(json!({
            "type": "read_file", "call_id": "r1", "path": "nope.txt"
        }));
        assert_eq!(
            executor.execute_read_entry(&entry),
            ToolOutput::failed(
                Some("r1".to_string()),
                "Error reading file: File not found: nope.txt"
            )
        );
    }

    #[test]
    fn list_files_puts_directories_first() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("src/nested")).unwrap();
        std::fs::write(root.path().join("src/main.rs"), vec![b'x'; 2048]).unwrap();
        std::fs::write(root.path().join("src/nested/deep.rs"), "fn x() {}").unwrap();
        std::fs::write(root.path().join("README.md"), "hi").unwrap();
        let executor = LocalToolExecutor::new(root.path());

        assert_eq!(
            executor.list_files("*", ".").unwrap(),
            "Files matching '*' in .:\n  [dir]  src/\n      2B  README.md"
        );
        assert_eq!(
            executor.list_files("**/*.rs", "src").unwrap(),
            "Files matching '**/*.rs' in src:\n    2.0K  main.rs\n      9B  nested/deep.rs"
        );
        assert_eq!(
            executor.list_files("*.py", ".").unwrap(),
            "No files matching '*.py' in ."
        );
    }

    #[test]
    fn list_arguments_default_to_everything_in_root() {
        assert_eq!(list_arguments(&json!({"type": "list_files"})), ("*", "."));
        assert_eq!(
            list_arguments(&json!({"operation": {"pattern": "*.rs", "path": "src"}})),
            ("*.rs", "src")
        );
    }
}
