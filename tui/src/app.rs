use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use tokio::select;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;
use wangr_core::config::Config;

use crate::app_event::AppEvent;
use crate::app_event_sender::AppEventSender;
use crate::chatwidget::ChatWidget;
use crate::slash_command::SlashCommand;
use crate::tui;

/// Spinner and status line refresh interval.
const TICK_INTERVAL: Duration = Duration::from_millis(120);

pub(crate) struct App {
    app_event_tx: AppEventSender,
    app_event_rx: UnboundedReceiver<AppEvent>,
    chat_widget: ChatWidget,
}

impl App {
    pub(crate) fn new(config: Config, initial_prompt: Option<String>) -> Result<Self> {
        let (app_event_tx, app_event_rx) = unbounded_channel();
        let app_event_tx = AppEventSender::new(app_event_tx);
        let chat_widget = ChatWidget::new(config, app_event_tx.clone(), initial_prompt)?;
        Ok(Self {
            app_event_tx,
            app_event_rx,
            chat_widget,
        })
    }

    /// Clone of the internal event sender so external components (e.g. the
    /// log bridge) can inject `AppEvent`s.
    pub fn event_sender(&self) -> AppEventSender {
        self.app_event_tx.clone()
    }

    pub(crate) async fn run(&mut self, terminal: &mut tui::Terminal) -> Result<()> {
        let mut terminal_events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK_INTERVAL);

        self.draw_next_frame(terminal)?;
        loop {
            let redraw = select! {
                Some(event) = self.app_event_rx.recv() => {
                    match self.handle_app_event(event) {
                        Some(redraw) => redraw,
                        None => break,
                    }
                }
                Some(event) = terminal_events.next() => {
                    match self.handle_terminal_event(event?) {
                        Some(redraw) => redraw,
                        None => break,
                    }
                }
                _ = ticker.tick() => self.chat_widget.on_tick(),
            };
            if redraw {
                self.draw_next_frame(terminal)?;
            }
        }
        self.chat_widget.shutdown();
        terminal.clear()?;
        Ok(())
    }

    /// Returns `None` when the app should exit, otherwise whether to redraw.
    fn handle_app_event(&mut self, event: AppEvent) -> Option<bool> {
        match event {
            AppEvent::Agent(event) => self.chat_widget.handle_agent_event(event),
            AppEvent::ProposedChanges {
                preview,
                awaiting_decision,
            } => self
                .chat_widget
                .on_proposed_changes(preview, awaiting_decision),
            AppEvent::WorkerFinished { session, status } => {
                self.chat_widget.on_worker_finished(session, status);
            }
            AppEvent::LatestLog(line) => self.chat_widget.update_latest_log(line),
            AppEvent::DispatchCommand(SlashCommand::Quit, _) => return None,
            AppEvent::DispatchCommand(command, args) => {
                self.chat_widget.dispatch_command(command, args);
            }
        }
        Some(true)
    }

    fn handle_terminal_event(&mut self, event: Event) -> Option<bool> {
        match event {
            Event::Key(key_event) => {
                if key_event.kind == KeyEventKind::Press {
                    return self.handle_key_event(key_event);
                }
                Some(false)
            }
            Event::Paste(pasted) => {
                self.chat_widget.handle_paste(pasted);
                Some(true)
            }
            Event::Resize(..) => Some(true),
            _ => Some(false),
        }
    }

    fn handle_key_event(&mut self, key_event: KeyEvent) -> Option<bool> {
        let ctrl = key_event.modifiers.contains(KeyModifiers::CONTROL);
        match key_event.code {
            KeyCode::Char('c') if ctrl => {
                if self.chat_widget.on_ctrl_c() {
                    return None;
                }
            }
            KeyCode::Char('d') if ctrl => {
                if self.chat_widget.composer_is_empty() && !self.chat_widget.is_busy() {
                    return None;
                }
            }
            _ => self.chat_widget.handle_key_event(key_event),
        }
        Some(true)
    }

    fn draw_next_frame(&mut self, terminal: &mut tui::Terminal) -> Result<()> {
        terminal.draw(|frame| {
            frame.render_widget_ref(&self.chat_widget, frame.area());
            if let Some((x, y)) = self.chat_widget.cursor_pos(frame.area()) {
                frame.set_cursor_position((x, y));
            }
        })?;
        Ok(())
    }
}
