//! Single-line message input

use crate::input::Action;
use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    widgets::{Block, Borders, Paragraph, Widget},
};
use unicode_width::UnicodeWidthChar;

/// Single-line text input.
///
/// While disabled the box keeps accepting edits but shows the disabled
/// placeholder and a dimmed border; [`InputBox::take`] refuses to submit.
#[derive(Debug, Default)]
pub struct InputBox {
    content: String,
    /// Cursor position in chars
    cursor: usize,
    /// Horizontal scroll offset in columns
    scroll: usize,
    placeholder: String,
    disabled_placeholder: String,
    title: Option<String>,
    focused: bool,
    enabled: bool,
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Placeholder shown while submissions are disabled
    pub fn with_disabled_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.disabled_placeholder = placeholder.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn set_title(&mut self, title: Option<String>) {
        self.title = title;
    }

    pub fn set_placeholder(&mut self, placeholder: impl Into<String>) {
        self.placeholder = placeholder.into();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.cursor = self.content.chars().count();
        self.scroll = 0;
    }

    pub fn clear(&mut self) {
        self.content.clear();
        self.cursor = 0;
        self.scroll = 0;
    }

    /// Take the trimmed content for submission, leaving the box empty.
    /// Returns `None` when disabled or when there is nothing to send.
    pub fn take(&mut self) -> Option<String> {
        if !self.enabled || self.content.trim().is_empty() {
            return None;
        }
        let text = self.content.trim().to_string();
        self.clear();
        Some(text)
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }

    fn columns_before_cursor(&self) -> usize {
        self.content
            .chars()
            .take(self.cursor)
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }

    fn remove_chars(&mut self, from: usize, to: usize) {
        let start = self.byte_index(from);
        let end = self.byte_index(to);
        self.content.drain(start..end);
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor);
        self.content.insert(at, c);
        self.cursor += 1;
    }

    /// Apply an editing action. Returns whether the action was consumed.
    pub fn handle_action(&mut self, action: &Action, width: u16) -> bool {
        let len = self.content.chars().count();

        let handled = match action {
            Action::Char(c) => {
                self.insert_char(*c);
                true
            }
            Action::Backspace if self.cursor > 0 => {
                self.remove_chars(self.cursor - 1, self.cursor);
                self.cursor -= 1;
                true
            }
            Action::Delete if self.cursor < len => {
                self.remove_chars(self.cursor, self.cursor + 1);
                true
            }
            Action::Left if self.cursor > 0 => {
                self.cursor -= 1;
                true
            }
            Action::Right if self.cursor < len => {
                self.cursor += 1;
                true
            }
            Action::Home => {
                self.cursor = 0;
                true
            }
            Action::End => {
                self.cursor = len;
                true
            }
            Action::ClearLine => {
                self.clear();
                true
            }
            Action::DeleteWord => {
                let chars: Vec<char> = self.content.chars().collect();
                let mut start = self.cursor;
                while start > 0 && chars[start - 1] == ' ' {
                    start -= 1;
                }
                while start > 0 && chars[start - 1] != ' ' {
                    start -= 1;
                }
                self.remove_chars(start, self.cursor);
                self.cursor = start;
                true
            }
            Action::Paste(text) => {
                for c in text.chars() {
                    if c == '\n' || c == '\r' {
                        if self.cursor > 0 && !self.content.ends_with(' ') {
                            self.insert_char(' ');
                        }
                    } else {
                        self.insert_char(c);
                    }
                }
                true
            }
            _ => false,
        };

        if handled {
            self.update_scroll(width as usize);
        }
        handled
    }

    fn update_scroll(&mut self, width: usize) {
        // Borders and cursor cell
        let visible = width.saturating_sub(3).max(1);
        let cursor = self.columns_before_cursor();

        if cursor < self.scroll {
            self.scroll = cursor;
        } else if cursor >= self.scroll + visible {
            self.scroll = cursor + 1 - visible;
        }
    }

    fn visible_text(&self, columns: usize) -> String {
        let mut skipped = 0;
        let mut used = 0;
        let mut out = String::new();

        for c in self.content.chars() {
            let w = c.width().unwrap_or(0);
            if skipped < self.scroll {
                skipped += w;
                continue;
            }
            if used + w > columns {
                break;
            }
            out.push(c);
            used += w;
        }
        out
    }

    /// Render the input box
    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme) {
        let border = if !self.enabled {
            theme.dim_style()
        } else if self.focused {
            theme.accent_style()
        } else {
            theme.border_style()
        };
        let mut block = Block::default().borders(Borders::ALL).border_style(border);
        if let Some(title) = &self.title {
            block = block.title(format!(" {} ", title));
        }

        let inner = block.inner(area);
        block.render(area, buf);

        let (text, style) = if self.content.is_empty() {
            let placeholder = if self.enabled || self.disabled_placeholder.is_empty() {
                &self.placeholder
            } else {
                &self.disabled_placeholder
            };
            (placeholder.clone(), theme.dim_style())
        } else {
            (self.visible_text(inner.width as usize), theme.base_style())
        };
        Paragraph::new(text).style(style).render(inner, buf);

        if self.focused && inner.width > 0 {
            let x = self.columns_before_cursor().saturating_sub(self.scroll);
            if x < inner.width as usize {
                if let Some(cell) = buf.cell_mut((inner.x + x as u16, inner.y)) {
                    cell.set_style(Style::default().bg(theme.accent));
                }
            }
        }
    }
}
