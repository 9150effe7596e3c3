//! Partitioning of a pending batch's `apply_patch` entries by preview outcome.

use std::path::Path;

use wangr_protocol::protocol::ToolOutput;

use crate::error::OperationError;
use crate::error::SandboxErr;
use crate::operation::EntryKind;
use crate::operation::FileOperation;
use crate::operation::OperationKind;
use crate::operation::PendingBatch;
use crate::preview::plan_change;

/// The operations behind one `apply_patch` tool call. A patch blob yields several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCall {
    pub call_id: Option<String>,
    pub operations: Vec<FileOperation>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Categorized {
    /// Unified diffs of every approvable call, in batch order.
    pub preview: String,
    /// Calls that previewed cleanly and await the user's decision.
    pub approvable: Vec<PatchCall>,
    /// Failed outputs for calls whose normalization or preview failed.
    pub auto_outputs: Vec<ToolOutput>,
    /// Completed outputs for updates that would not change anything.
    pub unchanged: Vec<ToolOutput>,
}

impl Categorized {
    pub fn requires_approval(&self) -> bool {
        !self.approvable.is_empty()
    }
}

/// Preview every `apply_patch` entry of `batch` against `base`.
///
/// Per-call failures become failed outputs; only a sandbox violation aborts.
pub fn categorize(batch: &PendingBatch, base: &Path) -> Result<Categorized, SandboxErr> {
    let mut categorized = Categorized::default();
    let mut previews: Vec<String> = Vec::new();

    for entry in batch
        .entries
        .iter()
        .filter(|entry| entry.kind == EntryKind::ApplyPatch)
    {
        let call_id = entry.call_id.clone();
        let operations = match entry.operations() {
            Ok(operations) => operations,
            Err(err) => {
                categorized.auto_outputs.push(ToolOutput::failed(
                    call_id,
                    format!("Preview error for {}: {err}", entry.display_path()),
                ));
                continue;
            }
        };

        let mut diffs = Vec::new();
        let mut failure = None;
        let mut only_noop_updates = true;
        for op in &operations {
            match plan_change(op, base) {
                Ok(plan) => {
                    if !(plan.is_noop() && op.kind() == OperationKind::UpdateFile) {
                        only_noop_updates = false;
                    }
                    let diff = plan.unified_diff();
                    if !diff.is_empty() {
                        diffs.push(diff);
                    }
                }
                Err(OperationError::Sandbox(err)) => return Err(err),
                Err(err) => {
                    failure.get_or_insert_with(|| {
                        format!("Preview error for {}: {err}", op.path())
                    });
                }
            }
        }

        if let Some(message) = failure {
            tracing::debug!("preview failed for call {call_id:?}: {message}");
            categorized
                .auto_outputs
                .push(ToolOutput::failed(call_id, message));
        } else if only_noop_updates {
            let message = operations
                .iter()
                .map(|op| format!("No changes for {}", op.path()))
                .collect::<Vec<_>>()
                .join("\n");
            categorized
                .unchanged
                .push(ToolOutput::completed(call_id, message));
        } else {
            previews.extend(diffs);
            categorized.approvable.push(PatchCall {
                call_id,
                operations,
            });
        }
    }

    categorized.preview = previews.join("\n");
    Ok(categorized)
}
