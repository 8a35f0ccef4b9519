//! Input handling

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Processed input action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Regular character input
    Char(char),
    /// Enter/submit
    Submit,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    /// Switch focus between input and sidebar
    Tab,
    Escape,
    /// Ctrl+C
    Interrupt,
    /// Ctrl+U (clear line)
    ClearLine,
    /// Ctrl+W (delete word)
    DeleteWord,
    /// Bracketed paste
    Paste(String),
    /// Ctrl+K (open session picker)
    SessionSelect,
    /// Ctrl+N (start a new session)
    NewSession,
    /// Ctrl+F (focus search)
    Search,
    /// Unknown/unhandled
    Unknown,
}

/// Convert a crossterm key event to an action
pub fn key_to_action(event: KeyEvent) -> Action {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => Action::Interrupt,
            KeyCode::Char('u') => Action::ClearLine,
            KeyCode::Char('w') => Action::DeleteWord,
            KeyCode::Char('k') => Action::SessionSelect,
            KeyCode::Char('n') => Action::NewSession,
            KeyCode::Char('f') => Action::Search,
            _ => Action::Unknown,
        };
    }

    if modifiers.contains(KeyModifiers::ALT) {
        return Action::Unknown;
    }

    match code {
        KeyCode::Char(c) => Action::Char(c),
        KeyCode::Enter => Action::Submit,
        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        KeyCode::Tab | KeyCode::BackTab => Action::Tab,
        KeyCode::Esc => Action::Escape,
        _ => Action::Unknown,
    }
}

/// Convert a crossterm event to an action. Key releases are ignored.
pub fn event_to_action(event: Event) -> Option<Action> {
    match event {
        Event::Key(key) if key.kind != KeyEventKind::Release => Some(key_to_action(key)),
        Event::Paste(text) => Some(Action::Paste(text)),
        _ => None,
    }
}

/// Interpret an action as a yes/no answer
pub fn confirmation_answer(action: &Action) -> Option<bool> {
    match action {
        Action::Char('y' | 'Y') | Action::Submit => Some(true),
        Action::Char('n' | 'N') | Action::Escape => Some(false),
        _ => None,
    }
}
