//! Application state: conversation, session, cached history and loading flags.

use delve_api::{HistorySession, Message, SearchResult, Stats};

use crate::history::{PendingConfirmation, session_label};

/// Application state owned by the controller.
#[derive(Debug, Default)]
pub struct AppState {
    /// Conversation sent along with every request
    pub messages: Vec<Message>,
    /// Session assigned by the server, if any
    pub session_id: Option<String>,
    /// Whether a chat request is in flight
    pub is_loading: bool,
    /// Whether the in-flight request is streaming
    pub is_streaming: bool,
    /// Whether new requests use the streaming endpoint
    pub use_streaming: bool,
    /// Last fetched session list
    pub sessions: Vec<HistorySession>,
    /// Last search results
    pub search_results: Vec<SearchResult>,
    /// Last fetched stats
    pub stats: Stats,
    /// Destructive action waiting for a yes/no answer
    pub pending_confirmation: Option<PendingConfirmation>,
}

impl AppState {
    /// Create state with the given streaming preference
    pub fn new(use_streaming: bool) -> Self {
        Self {
            use_streaming,
            ..Default::default()
        }
    }

    /// Forget the current conversation and session id
    pub fn clear_conversation(&mut self) {
        self.messages.clear();
        self.session_id = None;
    }

    /// Label describing the active session
    pub fn session_label(&self) -> String {
        session_label(self.session_id.as_deref(), &self.sessions)
    }
}
