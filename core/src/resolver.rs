//! The pending-operation state machine: execute reads, apply or deny patches, hand the
//! outputs back to the agent, and decide whether the next batch may skip the prompt.

use std::future::Future;

use wangr_protocol::protocol::ToolOutput;

use crate::categorize::categorize;
use crate::error::Result;
use crate::error::WangrErr;
use crate::executor::LocalToolExecutor;
use crate::executor::list_arguments;
use crate::operation::EntryKind;
use crate::operation::PendingBatch;
use crate::sandbox::resolve_path;

pub const DENIED_REASON: &str = "User denied operation.";

/// What the agent answered after receiving a batch's tool outputs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinueOutcome {
    pub response_text: String,
    pub next_pending: Option<PendingBatch>,
}

/// Sends tool outputs for a pending batch back to the agent.
pub trait Continuation {
    fn continue_pending(
        &self,
        pending_id: &str,
        tool_outputs: Vec<ToolOutput>,
    ) -> impl Future<Output = Result<ContinueOutcome>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub response_text: String,
    pub next_pending: Option<PendingBatch>,
    pub auto_approve_chain: bool,
}

#[derive(Debug, Clone)]
pub struct PendingResolver {
    executor: LocalToolExecutor,
}

impl PendingResolver {
    pub fn new(executor: LocalToolExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &LocalToolExecutor {
        &self.executor
    }

    /// Resolve `pending` with the user's decision and report the outputs through
    /// `continuation`.
    ///
    /// A missing id or a path outside the workspace aborts before anything is read or
    /// written. Every other failure stays local to its tool call.
    pub async fn resolve<C>(
        &self,
        pending: &PendingBatch,
        approved: bool,
        auto_approve_chain: bool,
        continuation: &C,
    ) -> Result<Resolution>
    where
        C: Continuation + Sync,
    {
        let pending_id = pending
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(WangrErr::MissingPendingId)?;
        self.validate_paths(pending)?;

        let mut outputs: Vec<ToolOutput> = Vec::new();
        for entry in &pending.entries {
            match &entry.kind {
                EntryKind::ReadFile => outputs.push(self.executor.execute_read_entry(entry)),
                EntryKind::ListFiles => outputs.push(self.executor.execute_list_entry(entry)),
                EntryKind::ApplyPatch => {}
                EntryKind::Other(kind) => outputs.push(ToolOutput::failed(
                    entry.call_id.clone(),
                    format!("Unsupported pending operation type: {kind}"),
                )),
            }
        }

        let has_patch_ops = pending.has_patch_entries();
        let mut preview_failures = false;
        if has_patch_ops {
            let categorized = categorize(pending, self.executor.root())?;
            preview_failures = !categorized.auto_outputs.is_empty();
            let apply = approved || auto_approve_chain;
            tracing::info!(
                pending_id,
                approvable = categorized.approvable.len(),
                failed = categorized.auto_outputs.len(),
                unchanged = categorized.unchanged.len(),
                apply,
                "resolving pending file operations"
            );
            outputs.extend(categorized.auto_outputs);
            outputs.extend(categorized.unchanged);
            for call in &categorized.approvable {
                if apply {
                    outputs.push(self.executor.apply_call(call));
                } else {
                    outputs.push(ToolOutput::failed(call.call_id.clone(), DENIED_REASON));
                }
            }
        }

        let ContinueOutcome {
            response_text,
            next_pending,
        } = continuation.continue_pending(pending_id, outputs).await?;

        Ok(Resolution {
            response_text,
            next_pending,
            auto_approve_chain: next_chain(
                auto_approve_chain,
                approved,
                has_patch_ops,
                preview_failures,
            ),
        })
    }

    /// Check every path in the batch against the sandbox before any side effect. Entries
    /// that fail to normalize are skipped here; they become failed outputs later.
    fn validate_paths(&self, pending: &PendingBatch) -> Result<()> {
        let root = self.executor.root();
        for entry in &pending.entries {
            let paths: Vec<String> = match entry.kind {
                EntryKind::ApplyPatch | EntryKind::ReadFile => entry
                    .operations()
                    .map(|ops| ops.iter().map(|op| op.path().to_string()).collect())
                    .unwrap_or_default(),
                EntryKind::ListFiles => vec![list_arguments(&entry.raw).1.to_string()],
                EntryKind::Other(_) => Vec::new(),
            };
            for path in paths {
                resolve_path(root, &path).map_err(|err| {
                    tracing::warn!("rejecting pending batch {:?}: {err}", pending.id);
                    WangrErr::from(err)
                })?;
            }
        }
        Ok(())
    }
}

/// A clean, explicitly approved patch batch arms the chain; once armed it stays armed
/// until the caller resets it.
pub fn next_chain(
    auto_approve_chain: bool,
    approved: bool,
    has_patch_ops: bool,
    preview_failures: bool,
) -> bool {
    auto_approve_chain || (approved && has_patch_ops && !preview_failures)
}
