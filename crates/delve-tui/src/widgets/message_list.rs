//! Message list widget for the conversation area

use crate::theme::Theme;
use crate::widgets::{markdown::render_markdown, spinner};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use std::time::Instant;

/// Indent of bubble content under its header
const INDENT: &str = "  ";

/// Kind of bubble
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
    /// Informational line outside the conversation
    Notice,
}

/// A single bubble as drawn in the conversation area
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub content: String,
    /// Header time, e.g. "14:05"
    pub time: String,
    /// Whether this is an error message
    pub is_error: bool,
    /// Whether this is currently streaming
    pub is_streaming: bool,
}

impl ChatMessage {
    fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            time: String::new(),
            is_error: false,
            is_streaming: false,
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageKind::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Assistant, content)
    }

    /// Create a streaming assistant message
    pub fn assistant_streaming(content: impl Into<String>) -> Self {
        Self {
            is_streaming: true,
            ..Self::new(MessageKind::Assistant, content)
        }
    }

    /// Create a notice line
    pub fn notice(content: impl Into<String>, is_error: bool) -> Self {
        Self {
            is_error,
            ..Self::new(MessageKind::Notice, content)
        }
    }

    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = time.into();
        self
    }
}

/// Widget drawing the conversation bubbles
pub struct MessageList<'a> {
    messages: &'a [ChatMessage],
    theme: &'a Theme,
    scroll: usize,
    animation_start: Instant,
}

impl<'a> MessageList<'a> {
    pub fn new(messages: &'a [ChatMessage], theme: &'a Theme) -> Self {
        Self {
            messages,
            theme,
            scroll: 0,
            animation_start: Instant::now(),
        }
    }

    /// Set scroll offset in lines
    pub fn scroll(mut self, scroll: usize) -> Self {
        self.scroll = scroll;
        self
    }

    /// Start time for the typing indicator animation
    pub fn animation_start(mut self, start: Instant) -> Self {
        self.animation_start = start;
        self
    }
}

/// Lay out one message as terminal lines, including the trailing separator
pub fn render_message(
    message: &ChatMessage,
    theme: &Theme,
    width: usize,
    animation_start: Instant,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let content_width = width.saturating_sub(INDENT.len()).max(1);

    match message.kind {
        MessageKind::Notice => {
            let style = if message.is_error {
                theme.error_style()
            } else {
                theme.dim_style()
            };
            for line in textwrap::wrap(&message.content, width.max(1)) {
                lines.push(Line::from(Span::styled(format!("● {}", line), style)));
            }
            lines.push(Line::from(""));
            return lines;
        }
        MessageKind::User => lines.push(Line::from(vec![
            Span::styled("▶ You", theme.user_header()),
            Span::styled(format!("  {}", message.time), theme.dim_style()),
        ])),
        MessageKind::Assistant => lines.push(Line::from(vec![
            Span::styled("◀ Assistant", theme.assistant_header()),
            Span::styled(format!("  {}", message.time), theme.dim_style()),
        ])),
    }

    if message.kind == MessageKind::Assistant && message.is_streaming && message.content.is_empty() {
        lines.push(Line::from(Span::styled(
            format!(
                "{}{} researching...",
                INDENT,
                spinner::frame_at(animation_start.elapsed())
            ),
            theme.warning_style(),
        )));
    } else if message.kind == MessageKind::Assistant && !message.is_error {
        for line in render_markdown(&message.content, theme, content_width) {
            let mut spans = vec![Span::raw(INDENT)];
            spans.extend(line.spans);
            lines.push(Line::from(spans));
        }
        if message.is_streaming {
            if let Some(last) = lines.last_mut() {
                last.spans.push(Span::styled("▌", theme.accent_style()));
            }
        }
    } else {
        let style = if message.is_error {
            theme.error_style()
        } else {
            theme.base_style()
        };
        for line in textwrap::wrap(&message.content, content_width) {
            lines.push(Line::from(Span::styled(format!("{}{}", INDENT, line), style)));
        }
    }

    lines.push(Line::from(""));
    lines
}

/// Total height in lines of all messages at the given width
pub fn calculate_message_height(messages: &[ChatMessage], theme: &Theme, width: usize) -> usize {
    let now = Instant::now();
    messages
        .iter()
        .map(|message| render_message(message, theme, width, now).len())
        .sum()
}

impl Widget for MessageList<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }

        let width = area.width as usize;
        let visible: Vec<Line> = self
            .messages
            .iter()
            .flat_map(|message| render_message(message, self.theme, width, self.animation_start))
            .skip(self.scroll)
            .take(area.height as usize)
            .collect();

        Paragraph::new(visible).render(area, buf);
    }
}
