//! Color theme

use ratatui::style::{Color, Modifier, Style};

/// Color theme for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    /// Background color
    pub bg: Color,
    /// Primary text color
    pub fg: Color,
    /// Dimmed/secondary text
    pub dim: Color,
    /// Accent color (highlights, prompts)
    pub accent: Color,
    /// User bubble header
    pub user: Color,
    /// Assistant bubble header
    pub assistant: Color,
    /// Error color
    pub error: Color,
    /// Warning color (confirmation prompts)
    pub warning: Color,
    /// Border color
    pub border: Color,
    /// Link color
    pub link: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default)
    pub fn dark() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            dim: Color::DarkGray,
            accent: Color::Cyan,
            user: Color::Cyan,
            assistant: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            border: Color::DarkGray,
            link: Color::Blue,
        }
    }

    /// Light theme
    pub fn light() -> Self {
        Self {
            bg: Color::White,
            fg: Color::Black,
            dim: Color::Gray,
            accent: Color::Blue,
            user: Color::Blue,
            assistant: Color::Rgb(0, 120, 60),
            error: Color::Red,
            warning: Color::Rgb(180, 120, 0),
            border: Color::Gray,
            link: Color::Blue,
        }
    }

    /// Look up a theme by name
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "dark" => Some(Self::dark()),
            "light" => Some(Self::light()),
            _ => None,
        }
    }

    pub fn base_style(&self) -> Style {
        Style::default().fg(self.fg).bg(self.bg)
    }

    pub fn dim_style(&self) -> Style {
        Style::default().fg(self.dim)
    }

    pub fn accent_style(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn accent_bold(&self) -> Style {
        self.accent_style().add_modifier(Modifier::BOLD)
    }

    pub fn user_header(&self) -> Style {
        Style::default().fg(self.user).add_modifier(Modifier::BOLD)
    }

    pub fn assistant_header(&self) -> Style {
        Style::default()
            .fg(self.assistant)
            .add_modifier(Modifier::BOLD)
    }

    pub fn error_style(&self) -> Style {
        Style::default().fg(self.error)
    }

    pub fn warning_style(&self) -> Style {
        Style::default().fg(self.warning)
    }

    pub fn border_style(&self) -> Style {
        Style::default().fg(self.border)
    }
}
