use tokio_util::sync::CancellationToken;
use wangr_core::AgentClient;
use wangr_core::ApprovalSession;
use wangr_core::PendingResolver;
use wangr_core::StreamingContinuation;
use wangr_core::error::Result;
use wangr_core::error::WangrErr;
use wangr_core::error::get_error_message_ui;
use wangr_core::operation::PendingBatch;
use wangr_core::protocol::ChatRequest;
use wangr_core::session::PendingAction;

use crate::app_event::AppEvent;
use crate::app_event::WorkerStatus;
use crate::app_event_sender::AppEventSender;

/// Work handed to a background worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AgentJob {
    /// Send a chat message and follow any batches it produces.
    Chat { message: String },
    /// Resolve the batch the session is holding with the user's decision.
    Resolve { approved: bool },
}

/// Spawn the worker for `job`. The worker owns `session` until it reports
/// back with [`AppEvent::WorkerFinished`].
pub(crate) fn spawn_agent(
    job: AgentJob,
    mut session: ApprovalSession,
    client: AgentClient,
    resolver: PendingResolver,
    app_event_tx: AppEventSender,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = run_job(job, &mut session, &client, &resolver, &app_event_tx) => Some(result),
        };
        let status = match result {
            None => {
                tracing::info!("request cancelled");
                session.abort_resolution();
                WorkerStatus::Cancelled
            }
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                tracing::error!("request failed: {e}");
                session.abort_resolution();
                WorkerStatus::Failed(get_error_message_ui(&e))
            }
        };
        app_event_tx.send(AppEvent::WorkerFinished { session, status });
    });
}

async fn run_job(
    job: AgentJob,
    session: &mut ApprovalSession,
    client: &AgentClient,
    resolver: &PendingResolver,
    app_event_tx: &AppEventSender,
) -> Result<WorkerStatus> {
    let mut approved = match job {
        AgentJob::Chat { message } => {
            let request = ChatRequest {
                message: message.clone(),
                history: session.history().to_vec(),
            };
            let tx = app_event_tx.clone();
            let outcome = client
                .chat(&request, move |event| tx.send(AppEvent::Agent(event)))
                .await?;
            session.record_exchange(&message, &outcome.text);
            let Some(batch) = outcome.pending else {
                return Ok(WorkerStatus::Idle);
            };
            match receive_batch(session, batch, resolver, app_event_tx)? {
                Some(approved) => approved,
                None => return Ok(WorkerStatus::AwaitingDecision),
            }
        }
        AgentJob::Resolve { approved } => approved,
    };

    let tx = app_event_tx.clone();
    let continuation =
        StreamingContinuation::new(client, move |event| tx.send(AppEvent::Agent(event)));
    loop {
        let Some((batch, chain)) = session.take_pending() else {
            return Ok(WorkerStatus::Idle);
        };
        let resolution = resolver
            .resolve(&batch, approved, chain, &continuation)
            .await?;
        session.record_reply(&resolution.response_text);
        session.finish_resolution(&resolution);
        let Some(next) = resolution.next_pending else {
            return Ok(WorkerStatus::Idle);
        };
        approved = match receive_batch(session, next, resolver, app_event_tx)? {
            Some(approved) => approved,
            None => return Ok(WorkerStatus::AwaitingDecision),
        };
    }
}

/// Show `batch` to the user. Returns the decision to resolve it with, or
/// `None` when the user has to be asked.
fn receive_batch(
    session: &mut ApprovalSession,
    batch: PendingBatch,
    resolver: &PendingResolver,
    app_event_tx: &AppEventSender,
) -> Result<Option<bool>> {
    let action = session
        .receive_pending(batch, resolver.executor().root())
        .map_err(WangrErr::from)?;
    match action {
        PendingAction::Prompt { preview } => {
            app_event_tx.send(AppEvent::ProposedChanges {
                preview,
                awaiting_decision: true,
            });
            Ok(None)
        }
        PendingAction::AutoResolve { approved, preview } => {
            if !preview.is_empty() {
                app_event_tx.send(AppEvent::ProposedChanges {
                    preview,
                    awaiting_decision: false,
                });
            }
            Ok(Some(approved))
        }
    }
}
