use ratatui::prelude::*;
use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::text::Span;
use wangr_core::config::Config;
use wangr_core::session::APPROVAL_PROMPT;
use wangr_core::session::NO_PREVIEW_NOTICE;

use crate::diff_render::create_diff_summary;
use crate::diff_render::render_unified_diff;

const SPINNER: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

/// What the in-flight placeholder is currently reporting.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Activity {
    Thinking,
    Status(String),
    ToolRunning(String),
    ToolDone { label: String, duration: Option<f64> },
}

/// Represents an event to display in the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HistoryCell {
    /// Welcome banner.
    WelcomeMessage { workdir: String, endpoint: String },

    /// Message from the user.
    UserPrompt { message: String },

    /// Message from the agent. `streaming` is true until `text_end`.
    AgentMessage { text: String, streaming: bool },

    /// Spinner shown while a request is in flight.
    Pending { frame: usize, activity: Activity },

    /// Changes proposed by the agent, as a unified diff.
    ProposedChanges { preview: String },

    /// The `y`/`n` question for the batch above it.
    ApprovalPrompt,

    /// Output of a local slash command such as `/read`.
    CommandOutput { title: String, output: String },

    /// Informational line.
    BackgroundEvent { message: String },

    /// Error surfaced from the agent or the local session.
    ErrorEvent { message: String },
}

impl HistoryCell {
    pub(crate) fn new_welcome(config: &Config) -> Self {
        HistoryCell::WelcomeMessage {
            workdir: config.cwd.display().to_string(),
            endpoint: config.chat_api_url.clone(),
        }
    }

    pub(crate) fn new_user_prompt(message: String) -> Self {
        HistoryCell::UserPrompt { message }
    }

    pub(crate) fn new_streaming_message() -> Self {
        HistoryCell::AgentMessage {
            text: String::new(),
            streaming: true,
        }
    }

    pub(crate) fn new_agent_message(text: String) -> Self {
        HistoryCell::AgentMessage {
            text,
            streaming: false,
        }
    }

    pub(crate) fn new_pending() -> Self {
        HistoryCell::Pending {
            frame: 0,
            activity: Activity::Thinking,
        }
    }

    pub(crate) fn new_background_event(message: impl Into<String>) -> Self {
        HistoryCell::BackgroundEvent {
            message: message.into(),
        }
    }

    pub(crate) fn new_error_event(message: impl Into<String>) -> Self {
        HistoryCell::ErrorEvent {
            message: message.into(),
        }
    }

    pub(crate) fn lines(&self) -> Vec<Line<'static>> {
        match self {
            HistoryCell::WelcomeMessage { workdir, endpoint } => {
                let mut lines = vec![
                    Line::from(vec![
                        "wangr ".bold(),
                        format!("v{}", env!("CARGO_PKG_VERSION")).dim(),
                    ]),
                    Line::from(""),
                ];
                for (key, value) in [("workdir", workdir), ("agent", endpoint)] {
                    lines.push(Line::from(vec![
                        format!("{key}: ").bold(),
                        value.clone().into(),
                    ]));
                }
                lines.push(Line::from("Ctrl+L to clear, /quit to exit.".dim()));
                lines.push(Line::from(""));
                lines
            }
            HistoryCell::UserPrompt { message } => {
                let mut lines = vec![Line::from("user".cyan().bold())];
                lines.extend(message.lines().map(|l| Line::from(format!("> {l}"))));
                lines.push(Line::from(""));
                lines
            }
            HistoryCell::AgentMessage { text, streaming } => {
                let mut lines = vec![Line::from("agent".magenta().bold())];
                lines.extend(text.lines().map(|l| Line::from(l.to_string())));
                if !streaming {
                    lines.push(Line::from(""));
                }
                lines
            }
            HistoryCell::Pending { frame, activity } => {
                let spinner = SPINNER[frame % SPINNER.len()];
                let mut spans = vec![Span::raw(format!("{spinner} Thinking..."))];
                match activity {
                    Activity::Thinking => {}
                    Activity::Status(message) => spans.push(format!(" {message}").dim()),
                    Activity::ToolRunning(label) => spans.push(format!(" {label}...").cyan()),
                    Activity::ToolDone { label, duration } => {
                        spans.push(format!(" {label}").green());
                        if let Some(secs) = duration {
                            spans.push(format!(" ({secs:.1}s)").dim());
                        }
                    }
                }
                vec![Line::from(spans), Line::from("")]
            }
            HistoryCell::ProposedChanges { preview } => {
                if preview.is_empty() {
                    return vec![Line::from(NO_PREVIEW_NOTICE.bold()), Line::from("")];
                }
                let mut lines = create_diff_summary("Proposed changes", preview);
                lines.push(Line::from(""));
                lines.extend(render_unified_diff(preview));
                lines.push(Line::from(""));
                lines
            }
            HistoryCell::ApprovalPrompt => vec![
                Line::from(Span::styled(
                    APPROVAL_PROMPT,
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                )),
                Line::from(""),
            ],
            HistoryCell::CommandOutput { title, output } => {
                let mut lines = vec![Line::from(title.clone().bold())];
                lines.extend(output.lines().map(|l| Line::from(l.to_string()).dim()));
                lines.push(Line::from(""));
                lines
            }
            HistoryCell::BackgroundEvent { message } => {
                let mut lines: Vec<Line<'static>> = message
                    .lines()
                    .map(|l| Line::from(l.to_string()).dim())
                    .collect();
                lines.push(Line::from(""));
                lines
            }
            HistoryCell::ErrorEvent { message } => {
                vec![
                    Line::from(vec!["ERROR: ".red().bold(), message.clone().into()]),
                    Line::from(""),
                ]
            }
        }
    }
}
