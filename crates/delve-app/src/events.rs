//! Application event types

use delve_api::{HistorySession, Message, SearchResult, Stats};
use serde::{Deserialize, Serialize};

/// Events emitted by the controller for the rendering layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A chat request is (or is no longer) in flight
    LoadingChanged { loading: bool },

    /// The user's message was accepted
    UserMessage { text: String },

    /// A streaming response was opened; an in-progress bubble should appear
    StreamStarted,

    /// The server assigned the session id used by subsequent requests
    SessionAssigned { session_id: String },

    /// Full response text so far
    MessageUpdate { text: String },

    /// Final response text
    MessageEnd { text: String },

    /// The submission failed; the message is ready for display
    SubmissionFailed { message: String },

    /// Session list refreshed
    HistoryLoaded { sessions: Vec<HistorySession> },

    /// Search finished
    SearchResults {
        query: String,
        results: Vec<SearchResult>,
    },

    /// Stats refreshed
    StatsUpdated { stats: Stats },

    /// A stored session replaced the current conversation
    SessionLoaded {
        session_id: String,
        messages: Vec<Message>,
    },

    /// Local conversation cleared; no session is active
    SessionCleared,

    /// Streaming toggled
    StreamingChanged { enabled: bool },

    /// The user must answer yes/no before a destructive action proceeds
    ConfirmationRequested { prompt: String },

    /// The pending confirmation was declined
    ConfirmationCancelled,

    /// Informational message for the user
    Notice { message: String, is_error: bool },
}

impl AppEvent {
    /// Create a notice
    pub fn notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            is_error: false,
        }
    }

    /// Create an error notice
    pub fn error_notice(message: impl Into<String>) -> Self {
        Self::Notice {
            message: message.into(),
            is_error: true,
        }
    }
}
