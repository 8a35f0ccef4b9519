//! Popup selector for choosing one item from a list

use crate::Theme;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, HighlightSpacing, List, ListItem, ListState, StatefulWidget, Widget,
    },
};
use unicode_width::UnicodeWidthStr;

const MAX_POPUP_WIDTH: u16 = 90;
const MAX_POPUP_HEIGHT: u16 = 20;

/// An entry in the selector
#[derive(Debug, Clone)]
pub struct SelectorItem {
    /// Display label
    pub label: String,
    /// Secondary text shown dimmed after the label
    pub description: Option<String>,
    /// Whether this item is currently active
    pub is_current: bool,
}

/// Centered popup listing [`SelectorItem`]s
pub struct Selector<'a> {
    title: String,
    items: Vec<SelectorItem>,
    selected: usize,
    theme: &'a Theme,
}

impl<'a> Selector<'a> {
    pub fn new(title: impl Into<String>, items: Vec<SelectorItem>, theme: &'a Theme) -> Self {
        let selected = items.iter().position(|item| item.is_current).unwrap_or(0);
        Self {
            title: title.into(),
            items,
            selected,
            theme,
        }
    }

    pub fn with_selected(mut self, index: usize) -> Self {
        self.selected = index.min(self.items.len().saturating_sub(1));
        self
    }

    fn popup_size(&self) -> (u16, u16) {
        let widest = self
            .items
            .iter()
            .map(|item| {
                item.label.width() + item.description.as_deref().map_or(0, |d| d.width() + 3) + 6
            })
            .max()
            .unwrap_or(0)
            .max(self.title.width() + 4);
        let width = (widest as u16).clamp(24, MAX_POPUP_WIDTH);
        let height = (self.items.len().max(1) as u16 + 2).min(MAX_POPUP_HEIGHT);
        (width, height)
    }

    fn list_item(&self, index: usize, item: &SelectorItem) -> ListItem<'static> {
        let marker = if item.is_current { "● " } else { "  " };
        let label_style = if index == self.selected {
            Style::default()
                .bg(self.theme.accent)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD)
        } else if item.is_current {
            self.theme.accent_style()
        } else {
            self.theme.base_style()
        };

        let mut spans = vec![Span::styled(format!("{}{}", marker, item.label), label_style)];
        if let Some(description) = &item.description {
            spans.push(Span::styled(format!(" · {}", description), self.theme.dim_style()));
        }
        ListItem::new(Line::from(spans))
    }

    /// Render centered in `area`
    pub fn render_centered(&self, area: Rect, buf: &mut Buffer) {
        let (width, height) = self.popup_size();
        let popup = Rect::new(
            area.x + area.width.saturating_sub(width) / 2,
            area.y + area.height.saturating_sub(height) / 2,
            width.min(area.width),
            height.min(area.height),
        );
        Clear.render(popup, buf);

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_style(self.theme.accent_bold())
            .borders(Borders::ALL)
            .border_style(self.theme.accent_style());

        let items: Vec<ListItem> = if self.items.is_empty() {
            vec![ListItem::new(Span::styled("  (empty)", self.theme.dim_style()))]
        } else {
            self.items
                .iter()
                .enumerate()
                .map(|(i, item)| self.list_item(i, item))
                .collect()
        };

        let list = List::new(items)
            .block(block)
            .highlight_spacing(HighlightSpacing::Always);
        let mut state = ListState::default();
        state.select(Some(self.selected));
        StatefulWidget::render(list, popup, buf, &mut state);
    }
}

/// Selection and visibility of a selector popup
#[derive(Debug, Default)]
pub struct SelectorState {
    pub selected: usize,
    pub visible: bool,
}

impl SelectorState {
    pub fn show(&mut self) {
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Move selection up, wrapping to the bottom
    pub fn up(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.selected = if self.selected == 0 {
            item_count - 1
        } else {
            self.selected - 1
        };
    }

    /// Move selection down, wrapping to the top
    pub fn down(&mut self, item_count: usize) {
        if item_count == 0 {
            return;
        }
        self.selected = (self.selected + 1) % item_count;
    }

    /// Keep the selection inside a list that may have shrunk
    pub fn clamp(&mut self, item_count: usize) {
        self.selected = self.selected.min(item_count.saturating_sub(1));
    }
}
