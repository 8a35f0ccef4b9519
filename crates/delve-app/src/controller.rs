//! Chat controller: drives submissions and owns the application state

use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;

use delve_api::{ChatBackend, ChatReply, ChatRequest, Message, StreamUpdate};

use crate::{
    error::{Error, Result},
    events::AppEvent,
    state::AppState,
};

/// Bubble text shown for any failure below the application protocol
pub const GENERIC_FAILURE: &str =
    "Sorry, I encountered an error processing your request. Please try again.";

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Use the streaming endpoint for new requests
    pub stream: bool,
    /// Maximum number of search results requested
    pub search_limit: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stream: true,
            search_limit: 20,
        }
    }
}

/// Owns the conversation and talks to the chat server on the UI's behalf.
///
/// One submission runs at a time; the caller awaits each operation and
/// renders progress from the events published on [`Controller::subscribe`].
/// The event queue is unbounded so a reply that arrives in one burst is
/// never dropped before the renderer catches up.
pub struct Controller {
    pub(crate) backend: Arc<dyn ChatBackend>,
    pub(crate) state: AppState,
    pub(crate) config: ControllerConfig,
    event_tx: Option<mpsc::UnboundedSender<AppEvent>>,
}

impl Controller {
    /// Create a new controller
    pub fn new(backend: Arc<dyn ChatBackend>, config: ControllerConfig) -> Self {
        Self {
            backend,
            state: AppState::new(config.stream),
            config,
            event_tx: None,
        }
    }

    /// Subscribe to controller events. A new subscriber replaces the
    /// previous one.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<AppEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_tx = Some(tx);
        rx
    }

    /// Get the current state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get the controller config
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub(crate) fn emit(&self, event: AppEvent) {
        // No subscriber is fine
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
        if !loading {
            self.state.is_streaming = false;
        }
        self.emit(AppEvent::LoadingChanged { loading });
    }

    /// Probe the server and load the session list and stats
    pub async fn initialize(&mut self) {
        match self.backend.health().await {
            Ok(health) => tracing::info!("Server health: {}", health),
            Err(e) => tracing::warn!("Health check failed: {}", e),
        }
        self.refresh().await;
    }

    /// Turn streaming on, off, or flip it. Returns the new setting.
    pub fn toggle_streaming(&mut self, enabled: Option<bool>) -> bool {
        let enabled = enabled.unwrap_or(!self.state.use_streaming);
        self.state.use_streaming = enabled;
        self.emit(AppEvent::StreamingChanged { enabled });
        enabled
    }

    /// Send a user message and render the reply.
    ///
    /// Failures of the exchange itself are reported as a failed bubble, not
    /// as an error; `Err` means the submission was not accepted.
    pub async fn submit(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if self.state.is_loading {
            return Err(Error::Busy);
        }

        self.emit(AppEvent::UserMessage {
            text: text.to_string(),
        });
        self.set_loading(true);

        let streaming = self.state.use_streaming;
        self.state.is_streaming = streaming;
        if streaming {
            self.emit(AppEvent::StreamStarted);
        }

        let request = ChatRequest::new(
            text,
            &self.state.messages,
            self.state.session_id.as_deref(),
        )
        .streaming(streaming);

        match self.run_request(&request).await {
            Ok(reply) => {
                self.complete(text, reply);
                self.set_loading(false);
                self.refresh().await;
            }
            Err(e) => {
                tracing::error!("Chat request failed: {}", e);
                let message = match &e {
                    delve_api::Error::Api { message } => format!("Error: {}", message),
                    _ => GENERIC_FAILURE.to_string(),
                };
                self.emit(AppEvent::SubmissionFailed { message });
                self.set_loading(false);
            }
        }

        Ok(())
    }

    async fn run_request(&mut self, request: &ChatRequest) -> delve_api::Result<ChatReply> {
        let mut updates = self.backend.respond(request).await?;

        while let Some(update) = updates.next().await {
            match update {
                StreamUpdate::SessionStarted { session_id } => self.assign_session(session_id),
                StreamUpdate::Content { text } => self.emit(AppEvent::MessageUpdate { text }),
                StreamUpdate::Done(reply) => return Ok(reply),
                StreamUpdate::Failed(e) => return Err(e),
            }
        }

        Err(delve_api::Error::Stream(
            "response ended without a result".to_string(),
        ))
    }

    fn assign_session(&mut self, session_id: String) {
        if self.state.session_id.as_deref() == Some(session_id.as_str()) {
            return;
        }
        tracing::debug!("Session assigned: {}", session_id);
        self.state.session_id = Some(session_id.clone());
        self.emit(AppEvent::SessionAssigned { session_id });
    }

    fn complete(&mut self, text: &str, reply: ChatReply) {
        if let Some(session_id) = reply.session_id {
            self.assign_session(session_id);
        }

        match reply.messages {
            Some(messages) => self.state.messages = messages,
            None => {
                self.state.messages.push(Message::user(text));
                self.state.messages.push(Message::assistant(reply.text.clone()));
            }
        }

        self.emit(AppEvent::MessageEnd { text: reply.text });
    }
}
