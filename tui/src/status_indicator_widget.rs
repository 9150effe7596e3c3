//! One-line status bar under the conversation. While a request is running it
//! shows an animated `Working [...]` header followed by the latest log line.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Paragraph;
use ratatui::widgets::Widget;
use ratatui::widgets::WidgetRef;

use crate::text_formatting::truncate_text;

const IDLE_HINT: &str = "Enter to send · Ctrl+C to quit · Ctrl+L to clear · PgUp/PgDn to scroll";

pub(crate) struct StatusIndicatorWidget {
    /// Latest text to display, truncated to the available width at render time.
    text: String,
    frame_idx: usize,
    running: bool,
}

impl StatusIndicatorWidget {
    pub(crate) fn new() -> Self {
        Self {
            text: String::new(),
            frame_idx: 0,
            running: false,
        }
    }

    pub(crate) fn set_running(&mut self, running: bool) {
        self.running = running;
        if !running {
            self.text.clear();
        }
    }

    pub(crate) fn tick(&mut self) {
        self.frame_idx = self.frame_idx.wrapping_add(1);
    }

    /// Update the line that is displayed in the widget.
    pub(crate) fn update_text(&mut self, text: String) {
        self.text = text.replace(['\n', '\r'], " ");
    }
}

impl WidgetRef for &StatusIndicatorWidget {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        if !self.running {
            Paragraph::new(Line::from(IDLE_HINT.dim())).render(area, buf);
            return;
        }

        // Bouncing dot: 0 1 2 1 0 ...
        const DOT_COUNT: usize = 3;
        let phase = self.frame_idx % (DOT_COUNT * 2 - 2);
        let active = if phase < DOT_COUNT {
            phase
        } else {
            (DOT_COUNT * 2 - 2) - phase
        };
        let bold = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);

        let mut spans = vec![Span::styled("Working [", bold)];
        for i in 0..DOT_COUNT {
            let style = if i == active {
                bold
            } else {
                Style::default().dim()
            };
            spans.push(Span::styled(".", style));
        }
        spans.push(Span::styled("] ", bold));

        let header_len: usize = spans.iter().map(|s| s.content.len()).sum();
        let available = (area.width as usize).saturating_sub(header_len);
        spans.push(Span::styled(
            truncate_text(&self.text, available),
            Style::default().dim(),
        ));
        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}
