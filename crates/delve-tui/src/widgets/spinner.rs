//! Animated spinner

use crate::theme::Theme;
use ratatui::{buffer::Buffer, layout::Rect, text::Span, widgets::Widget};
use std::time::{Duration, Instant};

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_DURATION: Duration = Duration::from_millis(80);

/// Animation frame for the given elapsed time
pub fn frame_at(elapsed: Duration) -> &'static str {
    let index = (elapsed.as_millis() / FRAME_DURATION.as_millis()) as usize;
    FRAMES[index % FRAMES.len()]
}

/// Spinner followed by a label, e.g. "⠋ Searching the web..."
pub struct Spinner<'a> {
    label: &'a str,
    theme: &'a Theme,
    start_time: Instant,
}

impl<'a> Spinner<'a> {
    pub fn new(label: &'a str, theme: &'a Theme) -> Self {
        Self {
            label,
            theme,
            start_time: Instant::now(),
        }
    }

    /// Animate relative to `start` so redraws continue the same cycle
    pub fn with_start_time(mut self, start: Instant) -> Self {
        self.start_time = start;
        self
    }
}

impl Widget for Spinner<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 3 {
            return;
        }

        let text = format!("{} {}", frame_at(self.start_time.elapsed()), self.label);
        let span = Span::styled(text, self.theme.accent_style());
        buf.set_span(area.x, area.y, &span, area.width);
    }
}
