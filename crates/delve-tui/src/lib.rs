//! delve-tui: Terminal UI components
//!
//! Widgets, input mapping and terminal setup for the delve chat client,
//! built on ratatui and crossterm.

pub mod input;
pub mod terminal;
pub mod theme;
pub mod widgets;

pub use terminal::TerminalSession;
pub use theme::Theme;
