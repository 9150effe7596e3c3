use std::cell::Cell;

use ratatui::prelude::*;
use ratatui::style::Style;
use ratatui::widgets::*;

use crate::history_cell::HistoryCell;

/// Scrollable list of [`HistoryCell`]s, pinned to the bottom unless the user
/// scrolls up.
pub(crate) struct ConversationHistoryWidget {
    entries: Vec<HistoryCell>,
    /// `usize::MAX` means "stick to the bottom".
    scroll_position: usize,
    /// Number of wrapped lines the last time render_ref() was called.
    num_rendered_lines: Cell<usize>,
    /// The height of the viewport last time render_ref() was called.
    last_viewport_height: Cell<usize>,
}

impl ConversationHistoryWidget {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            scroll_position: usize::MAX,
            num_rendered_lines: Cell::new(0),
            last_viewport_height: Cell::new(0),
        }
    }

    /// Negative delta scrolls up; positive delta scrolls down.
    pub(crate) fn scroll(&mut self, delta: i32) {
        match delta.cmp(&0) {
            std::cmp::Ordering::Less => self.scroll_up(delta.unsigned_abs() as usize),
            std::cmp::Ordering::Greater => self.scroll_down(delta as usize),
            std::cmp::Ordering::Equal => {}
        }
    }

    /// Scroll by most of a viewport.
    pub(crate) fn scroll_page(&mut self, up: bool) {
        let page = self.last_viewport_height.get().saturating_sub(1).max(1) as i32;
        self.scroll(if up { -page } else { page });
    }

    fn scroll_up(&mut self, num_lines: usize) {
        // Leaving stick-to-bottom mode: anchor at the current bottom first.
        if self.scroll_position == usize::MAX {
            self.scroll_position = self.max_scroll();
        }
        self.scroll_position = self.scroll_position.saturating_sub(num_lines);
    }

    fn scroll_down(&mut self, num_lines: usize) {
        if self.scroll_position == usize::MAX {
            return;
        }
        let new_pos = self.scroll_position.saturating_add(num_lines);
        if new_pos >= self.max_scroll() {
            self.scroll_position = usize::MAX;
        } else {
            self.scroll_position = new_pos;
        }
    }

    fn max_scroll(&self) -> usize {
        self.num_rendered_lines
            .get()
            .saturating_sub(self.last_viewport_height.get())
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_position = usize::MAX;
    }

    pub(crate) fn add(&mut self, cell: HistoryCell) {
        self.entries.push(cell);
        self.scroll_to_bottom();
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut HistoryCell> {
        self.entries.last_mut()
    }

    /// Remove the trailing spinner, if any.
    pub(crate) fn remove_pending(&mut self) {
        if matches!(self.entries.last(), Some(HistoryCell::Pending { .. })) {
            self.entries.pop();
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.scroll_to_bottom();
    }

    #[cfg(test)]
    pub(crate) fn entries(&self) -> &[HistoryCell] {
        &self.entries
    }
}

impl WidgetRef for &ConversationHistoryWidget {
    fn render_ref(&self, area: Rect, buf: &mut Buffer) {
        // Reserve the right-most column for the scrollbar.
        let text_area = Rect {
            width: area.width.saturating_sub(1),
            ..area
        };
        if text_area.width == 0 || area.height == 0 {
            return;
        }

        let lines: Vec<Line<'static>> = self.entries.iter().flat_map(HistoryCell::lines).collect();
        let paragraph = Paragraph::new(lines).wrap(wrap_cfg());
        let num_lines = paragraph.line_count(text_area.width);
        let viewport_height = area.height as usize;

        // The stored position can exceed the maximum after a resize.
        let max_scroll = num_lines.saturating_sub(viewport_height);
        let scroll_pos = if self.scroll_position == usize::MAX {
            max_scroll
        } else {
            self.scroll_position.min(max_scroll)
        };

        Clear.render(area, buf);
        paragraph
            .scroll((scroll_pos.min(u16::MAX as usize) as u16, 0))
            .render(text_area, buf);

        let mut scroll_state = ScrollbarState::default()
            .content_length(max_scroll)
            .position(scroll_pos);
        StatefulWidget::render(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .begin_style(Style::reset().fg(Color::DarkGray))
                .end_style(Style::reset().fg(Color::DarkGray))
                .thumb_symbol("█")
                .thumb_style(Style::reset().fg(Color::Gray))
                .track_symbol(Some("│"))
                .track_style(Style::reset().fg(Color::DarkGray)),
            area,
            buf,
            &mut scroll_state,
        );

        self.num_rendered_lines.set(num_lines);
        self.last_viewport_height.set(viewport_height);
    }
}

/// Common [`Wrap`] configuration used for both measurement and rendering so
/// they stay in sync.
#[inline]
const fn wrap_cfg() -> ratatui::widgets::Wrap {
    ratatui::widgets::Wrap { trim: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filled(n: usize) -> ConversationHistoryWidget {
        let mut widget = ConversationHistoryWidget::new();
        for i in 0..n {
            widget.add(HistoryCell::new_background_event(format!("line {i}")));
        }
        widget
    }

    fn render(widget: &ConversationHistoryWidget) -> Vec<String> {
        let area = Rect::new(0, 0, 20, 4);
        let mut buf = Buffer::empty(area);
        widget.render_ref(area, &mut buf);
        (0..area.height)
            .map(|y| {
                (0..area.width - 1)
                    .map(|x| buf[(x, y)].symbol().to_string())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn sticks_to_bottom_until_scrolled() {
        // Each background event renders as its text plus a blank line.
        let mut widget = filled(5);
        assert_eq!(render(&widget), vec!["line 3", "", "line 4", ""]);

        widget.scroll(-2);
        assert_eq!(render(&widget)[0], "line 2");

        widget.scroll(10);
        widget.add(HistoryCell::new_background_event("line 5"));
        assert_eq!(render(&widget)[2], "line 5");
    }

    #[test]
    fn remove_pending_only_drops_spinner() {
        let mut widget = filled(1);
        widget.remove_pending();
        assert_eq!(widget.entries().len(), 1);
        widget.add(HistoryCell::new_pending());
        widget.remove_pending();
        assert_eq!(widget.entries().len(), 1);
    }
}
