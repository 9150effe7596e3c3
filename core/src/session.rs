//! Per-screen session context: chat history, the batch awaiting a decision, and the
//! auto-approval chain.

use std::path::Path;

use wangr_protocol::protocol::HistoryMessage;
use wangr_protocol::protocol::Role;

use crate::categorize::categorize;
use crate::error::SandboxErr;
use crate::operation::PendingBatch;
use crate::resolver::Resolution;

pub const APPROVAL_PROMPT: &str = "Apply these changes? Y/N";
pub const NO_PREVIEW_NOTICE: &str = "Proposed changes (no diff preview available).";

/// What the front-end should do with a freshly received batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Show `preview` (may be empty) and ask the user.
    Prompt { preview: String },
    /// Resolve right away with the given decision: either nothing needs approval or the
    /// chain is armed.
    AutoResolve { approved: bool, preview: String },
}

#[derive(Debug, Default)]
pub struct ApprovalSession {
    history: Vec<HistoryMessage>,
    pending: Option<PendingBatch>,
    requires_approval: bool,
    auto_approve_chain: bool,
}

impl ApprovalSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[HistoryMessage] {
        &self.history
    }

    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.history.push(HistoryMessage {
            role: Role::User,
            content: user.to_string(),
        });
        self.history.push(HistoryMessage {
            role: Role::Assistant,
            content: assistant.to_string(),
        });
    }

    /// Append the agent's answer to a continued exchange. Empty answers are dropped.
    pub fn record_reply(&mut self, assistant: &str) {
        if assistant.is_empty() {
            return;
        }
        self.history.push(HistoryMessage {
            role: Role::Assistant,
            content: assistant.to_string(),
        });
    }

    pub fn pending(&self) -> Option<&PendingBatch> {
        self.pending.as_ref()
    }

    pub fn auto_approve_chain(&self) -> bool {
        self.auto_approve_chain
    }

    /// True while a batch is waiting for the user's `y`/`n`.
    pub fn awaiting_decision(&self) -> bool {
        self.pending.is_some() && self.requires_approval
    }

    /// Store `batch` and decide whether the user must be asked about it.
    ///
    /// On a sandbox violation the batch is dropped and the chain reset.
    pub fn receive_pending(
        &mut self,
        batch: PendingBatch,
        root: &Path,
    ) -> Result<PendingAction, SandboxErr> {
        let categorized = match categorize(&batch, root) {
            Ok(categorized) => categorized,
            Err(err) => {
                self.reset_pending();
                return Err(err);
            }
        };
        self.requires_approval = categorized.requires_approval();
        self.pending = Some(batch);
        let preview = categorized.preview;
        if self.requires_approval && !self.auto_approve_chain {
            Ok(PendingAction::Prompt { preview })
        } else {
            Ok(PendingAction::AutoResolve {
                approved: self.auto_approve_chain,
                preview,
            })
        }
    }

    /// Take the pending batch for resolution along with the current chain flag.
    pub fn take_pending(&mut self) -> Option<(PendingBatch, bool)> {
        self.pending
            .take()
            .map(|batch| (batch, self.auto_approve_chain))
    }

    /// Record the outcome of a resolution. Without a next batch the exchange is over and
    /// the chain resets.
    pub fn finish_resolution(&mut self, resolution: &Resolution) {
        self.auto_approve_chain = resolution.auto_approve_chain;
        self.pending = resolution.next_pending.clone();
        if self.pending.is_none() {
            self.reset_pending();
        }
    }

    /// A fatal resolution error ends the exchange.
    pub fn abort_resolution(&mut self) {
        self.reset_pending();
    }

    /// Forget history, any pending batch, and the chain.
    pub fn clear(&mut self) {
        self.history.clear();
        self.reset_pending();
    }

    fn reset_pending(&mut self) {
        self.pending = None;
        self.requires_approval = false;
        self.auto_approve_chain = false;
    }
}

/// Interpret typed input while a batch awaits a decision.
pub fn parse_decision(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
