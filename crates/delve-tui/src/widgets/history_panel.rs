//! Sidebar listing past sessions or search results

use crate::theme::Theme;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget, Widget},
};
use unicode_width::UnicodeWidthChar;

/// What the panel is listing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PanelMode {
    #[default]
    Sessions,
    /// Results for the given query
    Search(String),
}

/// One sidebar row, already formatted for display
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelItem {
    pub title: String,
    /// Second line, e.g. "3 queries · 5m ago" or a response preview
    pub detail: String,
    /// Optional third line with a timestamp
    pub when: Option<String>,
    /// Whether this row is the active session
    pub is_current: bool,
}

/// Cut `text` to at most `width` columns, ending with "…" when shortened
pub fn truncate(text: &str, width: usize) -> String {
    let flat = text.replace('\n', " ");
    let mut out = String::new();
    let mut used = 0;
    for c in flat.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            if width > 0 {
                // Make room for the ellipsis
                while used + 1 > width {
                    match out.pop() {
                        Some(removed) => used -= removed.width().unwrap_or(0),
                        None => break,
                    }
                }
                out.push('…');
            }
            return out;
        }
        out.push(c);
        used += w;
    }
    out
}

/// Session history sidebar
pub struct HistoryPanel<'a> {
    items: &'a [PanelItem],
    mode: &'a PanelMode,
    footer: String,
    selected: Option<usize>,
    focused: bool,
    theme: &'a Theme,
}

impl<'a> HistoryPanel<'a> {
    pub fn new(items: &'a [PanelItem], mode: &'a PanelMode, theme: &'a Theme) -> Self {
        Self {
            items,
            mode,
            footer: String::new(),
            selected: None,
            focused: false,
            theme,
        }
    }

    /// Summary line under the list
    pub fn footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = footer.into();
        self
    }

    /// Highlight an entry (only drawn while focused)
    pub fn selected(mut self, index: Option<usize>) -> Self {
        self.selected = index;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }

    fn list_item(&self, item: &PanelItem, width: usize) -> ListItem<'static> {
        let width = width.saturating_sub(2);
        let (marker, title_style) = match (&self.mode, item.is_current) {
            (PanelMode::Sessions, true) => ("● ", self.theme.accent_bold()),
            (PanelMode::Sessions, false) => ("  ", self.theme.base_style()),
            (PanelMode::Search(_), _) => ("  ", self.theme.base_style().add_modifier(Modifier::BOLD)),
        };

        let mut lines = vec![
            Line::from(Span::styled(
                format!("{}{}", marker, truncate(&item.title, width)),
                title_style,
            )),
            Line::from(Span::styled(
                format!("  {}", truncate(&item.detail, width)),
                self.theme.dim_style(),
            )),
        ];
        if let Some(when) = &item.when {
            lines.push(Line::from(Span::styled(
                format!("  {}", when),
                self.theme.dim_style(),
            )));
        }
        ListItem::new(Text::from(lines))
    }

    fn empty_message(&self) -> String {
        match self.mode {
            PanelMode::Sessions => "No research history yet".to_string(),
            PanelMode::Search(query) => format!("No results for \"{}\"", query),
        }
    }
}

impl Widget for HistoryPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = match self.mode {
            PanelMode::Sessions => " History ".to_string(),
            PanelMode::Search(query) => format!(" Search: {} ", truncate(query, 16)),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(if self.focused {
                self.theme.accent_style()
            } else {
                self.theme.border_style()
            })
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);
        if inner.width == 0 || inner.height < 2 {
            return;
        }

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let width = chunks[0].width as usize;
        if self.items.is_empty() {
            Paragraph::new(Span::styled(self.empty_message(), self.theme.dim_style()))
                .render(chunks[0], buf);
        } else {
            let items: Vec<ListItem> = self
                .items
                .iter()
                .map(|item| self.list_item(item, width))
                .collect();
            let list = List::new(items).highlight_style(
                Style::default()
                    .bg(self.theme.border)
                    .add_modifier(Modifier::BOLD),
            );
            let mut state = ListState::default();
            if self.focused {
                state.select(self.selected);
            }
            StatefulWidget::render(list, chunks[0], buf, &mut state);
        }

        Paragraph::new(Span::styled(
            truncate(&self.footer, chunks[1].width as usize),
            self.theme.dim_style(),
        ))
        .render(chunks[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(panel: HistoryPanel, width: u16, height: u16) -> String {
        let area = Rect::new(0, 0, width, height);
        let mut buf = Buffer::empty(area);
        panel.render(area, &mut buf);
        buf.content().iter().map(|cell| cell.symbol()).collect()
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is too long", 8), "this is…");
        assert_eq!(truncate("line\nbreak", 20), "line break");
        assert_eq!(truncate("abc", 0), "");
    }

    #[test]
    fn test_empty_search_message() {
        let mode = PanelMode::Search("tokio".into());
        let theme = Theme::dark();
        let text = screen(HistoryPanel::new(&[], &mode, &theme), 34, 6);
        assert!(text.contains("No results for \"tokio\""));
        assert!(text.contains("Search: tokio"));
    }

    #[test]
    fn test_current_session_marked_and_footer_drawn() {
        let items = vec![PanelItem {
            title: "What is Rust?".into(),
            detail: "3 queries · 5m ago".into(),
            when: None,
            is_current: true,
        }];
        let mode = PanelMode::Sessions;
        let theme = Theme::dark();
        let panel = HistoryPanel::new(&items, &mode, &theme).footer("3 queries · 1 sessions");
        let text = screen(panel, 34, 6);
        assert!(text.contains("● What is Rust?"));
        assert!(text.contains("3 queries · 5m ago"));
        assert!(text.contains("3 queries · 1 sessions"));
    }
}
