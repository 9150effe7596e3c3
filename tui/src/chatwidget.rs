use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyModifiers;
use ratatui::buffer::Buffer;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::widgets::Block;
use ratatui::widgets::BorderType;
use ratatui::widgets::Borders;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use ratatui::widgets::WidgetRef;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;
use wangr_core::AgentClient;
use wangr_core::ApprovalSession;
use wangr_core::LocalToolExecutor;
use wangr_core::PendingResolver;
use wangr_core::config::Config;
use wangr_core::error::Result;
use wangr_core::executor::MAX_LINES;
use wangr_core::protocol::AgentEvent;

use crate::app_event::AppEvent;
use crate::app_event::WorkerStatus;
use crate::app_event_sender::AppEventSender;
use crate::conversation_history_widget::ConversationHistoryWidget;
use crate::history_cell::Activity;
use crate::history_cell::HistoryCell;
use crate::slash_command::SlashCommand;
use crate::slash_command::parse_slash_command;
use crate::status_indicator_widget::StatusIndicatorWidget;
use crate::text_formatting::tool_display_name;
use crate::user_approval_widget::ApprovalInput;
use crate::user_approval_widget::UserApprovalWidget;

mod agent;
use self::agent::AgentJob;
use self::agent::spawn_agent;

const BUSY_NOTICE: &str = "A request is already running. Wait for it to finish or press Ctrl+C.";
const COMPOSER_HEIGHT: u16 = 3;

pub(crate) struct ChatWidget {
    app_event_tx: AppEventSender,
    config: Config,
    client: AgentClient,
    resolver: PendingResolver,
    /// `None` while a worker owns the session.
    session: Option<ApprovalSession>,
    conversation: ConversationHistoryWidget,
    input: Input,
    status: StatusIndicatorWidget,
    /// Present while a batch waits for the user's decision.
    approval: Option<UserApprovalWidget>,
    /// Cancels the in-flight worker. `Some` exactly while busy.
    cancel: Option<CancellationToken>,
}

impl ChatWidget {
    pub(crate) fn new(
        config: Config,
        app_event_tx: AppEventSender,
        initial_prompt: Option<String>,
    ) -> Result<Self> {
        let client = AgentClient::new(&config)?;
        let resolver = PendingResolver::new(LocalToolExecutor::new(config.cwd.clone()));
        let mut conversation = ConversationHistoryWidget::new();
        conversation.add(HistoryCell::new_welcome(&config));

        let mut widget = Self {
            app_event_tx,
            config,
            client,
            resolver,
            session: Some(ApprovalSession::new()),
            conversation,
            input: Input::default(),
            status: StatusIndicatorWidget::new(),
            approval: None,
            cancel: None,
        };
        if let Some(prompt) = initial_prompt.filter(|p| !p.trim().is_empty()) {
            widget.submit_text(prompt);
        }
        Ok(widget)
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.cancel.is_some()
    }

    pub(crate) fn composer_is_empty(&self) -> bool {
        self.input.value().is_empty()
    }

    pub(crate) fn handle_key_event(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::PageUp => return self.conversation.scroll_page(true),
            KeyCode::PageDown => return self.conversation.scroll_page(false),
            KeyCode::Up => return self.conversation.scroll(-1),
            KeyCode::Down => return self.conversation.scroll(1),
            KeyCode::Char('l') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
                return self.clear();
            }
            _ => {}
        }

        let busy = self.is_busy();
        if let Some(approval) = self.approval.as_mut() {
            if busy {
                return;
            }
            match approval.handle_key_event(key_event) {
                ApprovalInput::Decided(approved) => self.resolve_pending(approved),
                ApprovalInput::Rejected | ApprovalInput::Pending => {}
            }
            return;
        }

        match key_event.code {
            KeyCode::Enter => {
                let text = self.input.value().to_string();
                self.input.reset();
                self.submit_text(text);
            }
            _ => {
                self.input.handle_event(&Event::Key(key_event));
            }
        }
    }

    pub(crate) fn handle_paste(&mut self, text: String) {
        if self.approval.is_some() {
            return;
        }
        // Many terminals convert newlines to \r when pasting; the composer is
        // single-line so both become spaces.
        let text = text.replace(['\r', '\n'], " ");
        let value = format!("{}{text}", self.input.value());
        self.input = Input::new(value);
    }

    /// Returns true when the app should exit.
    pub(crate) fn on_ctrl_c(&mut self) -> bool {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
            return false;
        }
        if !self.composer_is_empty() {
            self.input.reset();
            return false;
        }
        true
    }

    /// Stop any in-flight worker before the app exits.
    pub(crate) fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }

    /// Advance animations. Returns true when a redraw is needed.
    pub(crate) fn on_tick(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.status.tick();
        if let Some(HistoryCell::Pending { frame, .. }) = self.conversation.last_mut() {
            *frame = frame.wrapping_add(1);
        }
        true
    }

    pub(crate) fn update_latest_log(&mut self, line: String) {
        self.status.update_text(line);
    }

    fn submit_text(&mut self, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }
        if text.starts_with('/') {
            match parse_slash_command(&text) {
                Some((command, args)) => {
                    self.app_event_tx
                        .send(AppEvent::DispatchCommand(command, args));
                }
                None => self.show_commands(&text),
            }
            return;
        }
        if self.is_busy() {
            self.conversation
                .add(HistoryCell::new_background_event(BUSY_NOTICE));
            return;
        }
        self.conversation
            .add(HistoryCell::new_user_prompt(text.clone()));
        self.start_job(AgentJob::Chat { message: text });
    }

    fn show_commands(&mut self, text: &str) {
        let mut lines = vec![format!("Unknown command: {text}")];
        lines.extend(
            SlashCommand::iter()
                .map(|command| format!("  /{}  {}", command.command(), command.description())),
        );
        self.conversation
            .add(HistoryCell::new_background_event(lines.join("\n")));
    }

    fn resolve_pending(&mut self, approved: bool) {
        self.approval = None;
        self.conversation
            .add(HistoryCell::new_user_prompt(if approved { "y" } else { "n" }.to_string()));
        self.start_job(AgentJob::Resolve { approved });
    }

    fn start_job(&mut self, job: AgentJob) {
        let Some(session) = self.session.take() else {
            self.conversation
                .add(HistoryCell::new_background_event(BUSY_NOTICE));
            return;
        };
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.status.set_running(true);
        self.conversation.add(HistoryCell::new_pending());
        spawn_agent(
            job,
            session,
            self.client.clone(),
            self.resolver.clone(),
            self.app_event_tx.clone(),
            cancel,
        );
    }

    pub(crate) fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::Status { message } => self.set_activity(Activity::Status(message)),
            AgentEvent::ToolStart { name } => {
                self.set_activity(Activity::ToolRunning(tool_display_name(&name)));
            }
            AgentEvent::ToolEnd { name, duration, .. } => {
                self.set_activity(Activity::ToolDone {
                    label: tool_display_name(&name),
                    duration,
                });
            }
            AgentEvent::TextStart => {
                self.conversation.remove_pending();
                self.conversation.add(HistoryCell::new_streaming_message());
            }
            AgentEvent::TextDelta { content } => match self.conversation.last_mut() {
                Some(HistoryCell::AgentMessage {
                    text,
                    streaming: true,
                }) => text.push_str(&content),
                _ => {
                    self.conversation.remove_pending();
                    self.conversation.add(HistoryCell::AgentMessage {
                        text: content,
                        streaming: true,
                    });
                }
            },
            AgentEvent::TextEnd => self.finish_streaming_message(),
            AgentEvent::Text { content } => match self.conversation.last_mut() {
                Some(HistoryCell::AgentMessage { text, streaming }) if *streaming => {
                    *text = content;
                    *streaming = false;
                }
                _ => {
                    self.conversation.remove_pending();
                    self.conversation
                        .add(HistoryCell::new_agent_message(content));
                }
            },
            AgentEvent::Done(_) => {
                self.finish_streaming_message();
                self.conversation.remove_pending();
            }
            AgentEvent::Error { message } => {
                self.conversation.remove_pending();
                self.conversation
                    .add(HistoryCell::new_error_event(message));
            }
            AgentEvent::PendingFileOps(_) | AgentEvent::Unknown => {}
        }
    }

    fn set_activity(&mut self, activity: Activity) {
        if let Some(HistoryCell::Pending { activity: current, .. }) = self.conversation.last_mut()
        {
            *current = activity;
        }
    }

    fn finish_streaming_message(&mut self) {
        if let Some(HistoryCell::AgentMessage { streaming, .. }) = self.conversation.last_mut() {
            *streaming = false;
        }
    }

    pub(crate) fn on_proposed_changes(&mut self, preview: String, awaiting_decision: bool) {
        self.finish_streaming_message();
        self.conversation.remove_pending();
        self.conversation
            .add(HistoryCell::ProposedChanges { preview });
        if awaiting_decision {
            self.conversation.add(HistoryCell::ApprovalPrompt);
            self.approval = Some(UserApprovalWidget::new());
        } else {
            self.conversation.add(HistoryCell::new_pending());
        }
    }

    pub(crate) fn on_worker_finished(&mut self, session: ApprovalSession, status: WorkerStatus) {
        self.session = Some(session);
        self.cancel = None;
        self.status.set_running(false);
        self.finish_streaming_message();
        self.conversation.remove_pending();
        match status {
            WorkerStatus::Idle => {}
            WorkerStatus::AwaitingDecision => {
                if self.approval.is_none() {
                    self.approval = Some(UserApprovalWidget::new());
                }
            }
            WorkerStatus::Cancelled => {
                self.approval = None;
                self.conversation
                    .add(HistoryCell::new_background_event("Request cancelled."));
            }
            WorkerStatus::Failed(message) => {
                self.approval = None;
                self.conversation
                    .add(HistoryCell::new_error_event(message));
            }
        }
    }

    pub(crate) fn dispatch_command(&mut self, command: SlashCommand, args: Vec<String>) {
        match command {
            SlashCommand::Clear => self.clear(),
            SlashCommand::Read => self.read_file(&args),
            SlashCommand::Ls => self.list_files(&args),
            // Handled by the app.
            SlashCommand::Quit => {}
        }
    }

    fn read_file(&mut self, args: &[String]) {
        let Some(path) = args.first() else {
            self.conversation.add(HistoryCell::new_error_event(
                SlashCommand::Read.description(),
            ));
            return;
        };
        let number = |idx: usize, default: usize| {
            args.get(idx)
                .and_then(|arg| arg.parse::<usize>().ok())
                .unwrap_or(default)
        };
        let executor = self.resolver.executor();
        let cell = match executor.read_file(path, number(1, 0), number(2, MAX_LINES)) {
            Ok(output) => HistoryCell::CommandOutput {
                title: format!("/read {path}"),
                output,
            },
            Err(err) => HistoryCell::new_error_event(format!("Error reading file: {err}")),
        };
        self.conversation.add(cell);
    }

    fn list_files(&mut self, args: &[String]) {
        let pattern = args.first().map(String::as_str).unwrap_or("*");
        let dir = args.get(1).map(String::as_str).unwrap_or(".");
        let cell = match self.resolver.executor().list_files(pattern, dir) {
            Ok(output) => HistoryCell::CommandOutput {
                title: format!("/ls {pattern} {dir}"),
                output,
            },
            Err(err) => HistoryCell::new_error_event(format!("Error: {err}")),
        };
        self.conversation.add(cell);
    }

    /// Forget the conversation, any pending batch, and the auto-approval chain.
    pub(crate) fn clear(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.conversation
                .add(HistoryCell::new_background_event(BUSY_NOTICE));
            return;
        };
        session.clear();
        self.approval = None;
        self.input.reset();
        self.conversation.clear();
        self.conversation.add(HistoryCell::new_welcome(&self.config));
        self.conversation
            .add(HistoryCell::new_background_event("✓ History cleared."));
    }

    fn layout_areas(&self, area: Rect) -> [Rect; 3] {
        let bottom_height = self
            .approval
            .as_ref()
            .map_or(COMPOSER_HEIGHT, UserApprovalWidget::get_height);
        Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(bottom_height),
        ])
        .areas(area)
    }

    pub(crate) fn cursor_pos(&self, area: Rect) -> Option<(u16, u16)> {
        let [_, _, bottom] = self.layout_areas(area);
        if let Some(approval) = &self.approval {
            return Some(approval.cursor_pos(bottom));
        }
        if self.is_busy() {
            return None;
        }
        let width = bottom.width.saturating_sub(2) as usize;
        let scroll = self.input.visual_scroll(width);
        let x = self.input.visual_cursor().saturating_sub(scroll) as u16;
        Some((bottom.x + 1 + x, bottom.y + 1))
    }
}

impl WidgetRef for &ChatWidget {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let [history_area, status_area, bottom_area] = self.layout_areas(area);
        (&self.conversation).render_ref(history_area, buf);
        (&self.status).render_ref(status_area, buf);

        if let Some(approval) = &self.approval {
            approval.render_ref(bottom_area, buf);
            return;
        }

        let (title, border_style) = if self.is_busy() {
            (" waiting for the agent ", Style::default().dim())
        } else {
            (" message ", Style::default())
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border_style);
        let width = bottom_area.width.saturating_sub(2) as usize;
        let scroll = self.input.visual_scroll(width);
        Paragraph::new(self.input.value().to_string())
            .scroll((0, scroll as u16))
            .block(block)
            .render(bottom_area, buf);
    }
}
