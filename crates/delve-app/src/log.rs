//! Message log view model
//!
//! Renderer-independent model of the conversation area: an ordered list of
//! bubbles, at most one of which is an in-progress streaming bubble, plus the
//! welcome placeholder and the auto-scroll flag. It is updated by applying
//! [`AppEvent`]s and read by whichever front end draws it.

use chrono::{DateTime, Local};
use delve_api::Role;

use crate::events::AppEvent;

/// Kind of bubble in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Assistant,
    /// Client-side informational line (not part of the conversation)
    Notice,
}

/// A single bubble in the message log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub kind: EntryKind,
    pub content: String,
    /// Whether this is an error message
    pub is_error: bool,
    /// Whether this is the in-progress streaming bubble
    pub is_streaming: bool,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            is_error: false,
            is_streaming: false,
            timestamp: Local::now(),
        }
    }

    /// Display time, e.g. "14:05"
    pub fn time_display(&self) -> String {
        self.timestamp.format("%H:%M").to_string()
    }
}

/// Ordered list of chat bubbles
#[derive(Debug)]
pub struct MessageLog {
    entries: Vec<LogEntry>,
    show_welcome: bool,
    follow_tail: bool,
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageLog {
    /// Create an empty log showing the welcome placeholder
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            show_welcome: true,
            follow_tail: true,
        }
    }

    /// All bubbles in display order
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Whether the welcome placeholder should be drawn instead of bubbles
    pub fn shows_welcome(&self) -> bool {
        self.show_welcome && self.entries.is_empty()
    }

    /// Whether the view should stick to the newest content
    pub fn follows_tail(&self) -> bool {
        self.follow_tail
    }

    /// Stop auto-scrolling until new content arrives
    pub fn scroll_manually(&mut self) {
        self.follow_tail = false;
    }

    fn push(&mut self, entry: LogEntry) {
        self.show_welcome = false;
        self.entries.push(entry);
        self.follow_tail = true;
    }

    /// Append a user bubble
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(LogEntry::new(EntryKind::User, content));
    }

    /// Append a finished assistant bubble
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(LogEntry::new(EntryKind::Assistant, content));
    }

    /// Append an assistant bubble flagged as an error
    pub fn push_assistant_error(&mut self, content: impl Into<String>) {
        let mut entry = LogEntry::new(EntryKind::Assistant, content);
        entry.is_error = true;
        self.push(entry);
    }

    /// Append a notice line
    pub fn push_notice(&mut self, content: impl Into<String>, is_error: bool) {
        let mut entry = LogEntry::new(EntryKind::Notice, content);
        entry.is_error = is_error;
        self.push(entry);
    }

    /// The in-progress streaming bubble, if any
    pub fn streaming_entry(&self) -> Option<&LogEntry> {
        self.entries.iter().rev().find(|e| e.is_streaming)
    }

    fn streaming_entry_mut(&mut self) -> Option<&mut LogEntry> {
        self.entries.iter_mut().rev().find(|e| e.is_streaming)
    }

    /// Open the streaming bubble. An existing one is reused.
    pub fn begin_streaming(&mut self) {
        if self.streaming_entry().is_some() {
            return;
        }
        let mut entry = LogEntry::new(EntryKind::Assistant, "");
        entry.is_streaming = true;
        self.push(entry);
    }

    /// Replace the streaming bubble's text with `text`
    pub fn update_streaming(&mut self, text: &str) {
        if let Some(entry) = self.streaming_entry_mut() {
            entry.content.clear();
            entry.content.push_str(text);
            self.follow_tail = true;
        }
    }

    /// Mark the streaming bubble complete with its final text.
    /// Without a streaming bubble the text becomes a new assistant bubble.
    pub fn finish_assistant(&mut self, text: &str) {
        match self.streaming_entry_mut() {
            Some(entry) => {
                entry.content = text.to_string();
                entry.is_streaming = false;
                self.follow_tail = true;
            }
            None => self.push_assistant(text),
        }
    }

    /// Remove the streaming bubble
    pub fn discard_streaming(&mut self) {
        self.entries.retain(|e| !e.is_streaming);
    }

    /// Remove all bubbles; the welcome placeholder returns if requested
    pub fn clear(&mut self, show_welcome: bool) {
        self.entries.clear();
        self.show_welcome = show_welcome;
        self.follow_tail = true;
    }

    /// Update the log from a controller event
    pub fn apply(&mut self, event: &AppEvent) {
        match event {
            AppEvent::UserMessage { text } => self.push_user(text.clone()),
            AppEvent::StreamStarted => self.begin_streaming(),
            AppEvent::MessageUpdate { text } => self.update_streaming(text),
            AppEvent::MessageEnd { text } => self.finish_assistant(text),
            AppEvent::SubmissionFailed { message } => {
                self.discard_streaming();
                self.push_assistant_error(message.clone());
            }
            AppEvent::SessionLoaded { messages, .. } => {
                self.clear(false);
                for message in messages {
                    match message.role {
                        Role::User => self.push_user(message.content.clone()),
                        _ => self.push_assistant(message.content.clone()),
                    }
                }
            }
            AppEvent::SessionCleared => self.clear(true),
            AppEvent::Notice { message, is_error } => self.push_notice(message.clone(), *is_error),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_api::Message;

    #[test]
    fn test_first_message_replaces_welcome() {
        let mut log = MessageLog::new();
        assert!(log.shows_welcome());
        log.push_user("hello");
        assert!(!log.shows_welcome());
        assert_eq!(log.entries().len(), 1);
    }

    #[test]
    fn test_single_streaming_bubble() {
        let mut log = MessageLog::new();
        log.begin_streaming();
        log.begin_streaming();
        assert_eq!(log.entries().len(), 1);
        log.update_streaming("Hel");
        log.update_streaming("Hello");
        assert_eq!(log.streaming_entry().unwrap().content, "Hello");
        log.finish_assistant("Hello!");
        assert!(log.streaming_entry().is_none());
        assert_eq!(log.entries()[0].content, "Hello!");
        assert_eq!(log.entries()[0].kind, EntryKind::Assistant);
    }

    #[test]
    fn test_failure_discards_partial_bubble() {
        let mut log = MessageLog::new();
        log.apply(&AppEvent::UserMessage { text: "q".into() });
        log.apply(&AppEvent::StreamStarted);
        log.apply(&AppEvent::MessageUpdate {
            text: "partial".into(),
        });
        log.apply(&AppEvent::SubmissionFailed {
            message: "Error: boom".into(),
        });
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].content, "Error: boom");
        assert!(entries[1].is_error);
        assert!(entries.iter().all(|e| !e.is_streaming));
    }

    #[test]
    fn test_finish_without_stream_appends() {
        let mut log = MessageLog::new();
        log.apply(&AppEvent::MessageEnd {
            text: "buffered".into(),
        });
        assert_eq!(log.entries().len(), 1);
        assert!(!log.entries()[0].is_streaming);
    }

    #[test]
    fn test_session_loaded_replaces_entries() {
        let mut log = MessageLog::new();
        log.push_user("old");
        log.apply(&AppEvent::SessionLoaded {
            session_id: "s".into(),
            messages: vec![Message::user("q1"), Message::assistant("a1")],
        });
        let kinds: Vec<_> = log.entries().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntryKind::User, EntryKind::Assistant]);
        assert!(!log.shows_welcome());
    }

    #[test]
    fn test_session_cleared_restores_welcome() {
        let mut log = MessageLog::new();
        log.push_user("x");
        log.apply(&AppEvent::SessionCleared);
        assert!(log.entries().is_empty());
        assert!(log.shows_welcome());
    }

    #[test]
    fn test_manual_scroll_until_new_content() {
        let mut log = MessageLog::new();
        log.push_user("x");
        log.scroll_manually();
        assert!(!log.follows_tail());
        log.begin_streaming();
        assert!(log.follows_tail());
    }
}
