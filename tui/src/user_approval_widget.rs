//! Prompt shown in place of the composer while a batch of proposed changes
//! waits for the user's decision. Only `y`/`n` are accepted.

use crossterm::event::Event;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::prelude::*;
use ratatui::text::Line;
use ratatui::widgets::Block;
use ratatui::widgets::BorderType;
use ratatui::widgets::Borders;
use ratatui::widgets::Paragraph;
use ratatui::widgets::WidgetRef;
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;
use unicode_width::UnicodeWidthStr;
use wangr_core::session::APPROVAL_PROMPT;
use wangr_core::session::parse_decision;

/// Result of feeding a key to the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApprovalInput {
    Decided(bool),
    /// A line was submitted that is neither yes nor no.
    Rejected,
    Pending,
}

pub(crate) struct UserApprovalWidget {
    input: Input,
    /// Set after a rejected line so the hint can be highlighted.
    show_hint: bool,
}

// Number of lines automatically added by ratatui’s [`Block`] when
// borders are enabled (one at the top, one at the bottom).
const BORDER_LINES: u16 = 2;

impl UserApprovalWidget {
    pub(crate) fn new() -> Self {
        Self {
            input: Input::default(),
            show_hint: false,
        }
    }

    pub(crate) fn get_height(&self) -> u16 {
        1 + BORDER_LINES
    }

    /// A bare `y`/`n` decides immediately; anything else is typed and checked
    /// on Enter.
    pub(crate) fn handle_key_event(&mut self, key: KeyEvent) -> ApprovalInput {
        match key.code {
            KeyCode::Char(c) if self.input.value().is_empty() => {
                if let Some(approved) = parse_decision(&c.to_string()) {
                    return ApprovalInput::Decided(approved);
                }
                self.input.handle_event(&Event::Key(key));
                ApprovalInput::Pending
            }
            KeyCode::Enter => {
                let line = self.input.value().to_string();
                self.input.reset();
                match parse_decision(&line) {
                    Some(approved) => ApprovalInput::Decided(approved),
                    None => {
                        self.show_hint = true;
                        ApprovalInput::Rejected
                    }
                }
            }
            _ => {
                self.input.handle_event(&Event::Key(key));
                ApprovalInput::Pending
            }
        }
    }

    pub(crate) fn cursor_pos(&self, area: Rect) -> (u16, u16) {
        let prompt_width = APPROVAL_PROMPT.width() as u16 + 1;
        (
            area.x + 1 + prompt_width + self.input.visual_cursor() as u16,
            area.y + 1,
        )
    }
}

impl WidgetRef for &UserApprovalWidget {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        let hint = if self.show_hint {
            " answer y or n ".red()
        } else {
            " y/n ".dim()
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Yellow))
            .title_bottom(Line::from(hint));
        let line = Line::from(vec![
            APPROVAL_PROMPT.yellow().bold(),
            " ".into(),
            self.input.value().to_string().into(),
        ]);
        Paragraph::new(line).block(block).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn bare_keys_decide() {
        let mut widget = UserApprovalWidget::new();
        assert_eq!(
            widget.handle_key_event(key(KeyCode::Char('Y'))),
            ApprovalInput::Decided(true)
        );
        assert_eq!(
            widget.handle_key_event(key(KeyCode::Char('n'))),
            ApprovalInput::Decided(false)
        );
    }

    #[test]
    fn other_lines_are_rejected() {
        let mut widget = UserApprovalWidget::new();
        for c in "ok".chars() {
            assert_eq!(
                widget.handle_key_event(key(KeyCode::Char(c))),
                ApprovalInput::Pending
            );
        }
        assert_eq!(
            widget.handle_key_event(key(KeyCode::Enter)),
            ApprovalInput::Rejected
        );
        assert!(widget.show_hint);
        assert_eq!(widget.input.value(), "");
    }
}
