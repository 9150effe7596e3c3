use wangr_core::ApprovalSession;
use wangr_core::protocol::AgentEvent;

use crate::slash_command::SlashCommand;

/// How a background worker left the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum WorkerStatus {
    /// The exchange is over.
    Idle,
    /// A batch is waiting for the user's `y`/`n`.
    AwaitingDecision,
    Cancelled,
    /// A fatal error ended the exchange; the message is ready for display.
    Failed(String),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
pub(crate) enum AppEvent {
    /// A displayable event from the agent's response stream.
    Agent(AgentEvent),

    /// A pending batch arrived. `awaiting_decision` is false when it is being
    /// resolved without asking.
    ProposedChanges {
        preview: String,
        awaiting_decision: bool,
    },

    /// The worker finished and hands the session back to the UI.
    WorkerFinished {
        session: ApprovalSession,
        status: WorkerStatus,
    },

    /// Latest formatted log line, shown in the status line.
    LatestLog(String),

    /// Dispatch a recognized slash command from the composer to the app
    /// layer so it can be handled centrally.
    DispatchCommand(SlashCommand, Vec<String>),
}
