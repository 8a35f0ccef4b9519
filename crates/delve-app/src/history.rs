//! Session history: listing, search, loading and destructive actions
//!
//! Fetch failures here are logged and leave the previously displayed data in
//! place. Clear and reset go through [`PendingConfirmation`]; the front end
//! answers the prompt with [`Controller::answer_confirmation`].

use chrono::{DateTime, Utc};
use delve_api::{HistoryEntry, HistorySession, Message, parse_server_time};

use crate::{controller::Controller, error::Error, events::AppEvent};

const CLEAR_PROMPT: &str =
    "Are you sure you want to clear all research history? This action cannot be undone.";
const RESET_PROMPT: &str = "Are you sure you want to RESET the entire database?\n\n\
    This will permanently delete:\n\
    • All research history\n\
    • All saved sessions\n\
    • All statistics\n\n\
    This action cannot be undone!";
const RESET_FINAL_PROMPT: &str = "FINAL WARNING: You are about to permanently delete ALL data.\n\n\
    Answer yes to proceed, or no to abort.";

pub const RESET_SUCCESS: &str = "Database reset successfully!";
pub const RESET_FAILURE: &str =
    "An error occurred while resetting the database. Please try again.";

/// A destructive action waiting for the user's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmation {
    /// Clear the local history view
    ClearHistory,
    /// First of the two reset confirmations
    Reset,
    /// Second reset confirmation; "yes" issues the reset request
    ResetFinal,
}

/// What happens after the user answers a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Declined; nothing happens
    Cancelled,
    /// Another confirmation is required
    Next(PendingConfirmation),
    /// Confirmed; run the action
    Proceed,
}

impl PendingConfirmation {
    /// Question shown to the user
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::ClearHistory => CLEAR_PROMPT,
            Self::Reset => RESET_PROMPT,
            Self::ResetFinal => RESET_FINAL_PROMPT,
        }
    }

    /// Advance the state machine with a yes/no answer
    pub fn answer(self, yes: bool) -> ConfirmOutcome {
        match (self, yes) {
            (_, false) => ConfirmOutcome::Cancelled,
            (Self::Reset, true) => ConfirmOutcome::Next(Self::ResetFinal),
            (Self::ClearHistory | Self::ResetFinal, true) => ConfirmOutcome::Proceed,
        }
    }
}

/// Relative time for list display: "Just now", "5m ago", "3h ago", "2d ago",
/// or the date once a week has passed.
pub fn format_relative(time: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(time);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        time.format("%Y-%m-%d").to_string()
    }
}

/// [`format_relative`] for a raw server timestamp; unparsable input is
/// returned unchanged.
pub fn format_server_time(raw: &str, now: DateTime<Utc>) -> String {
    match parse_server_time(raw) {
        Some(time) => format_relative(time, now),
        None => raw.to_string(),
    }
}

/// Label describing the active session
pub fn session_label(session_id: Option<&str>, sessions: &[HistorySession]) -> String {
    let Some(id) = session_id else {
        return "New Session".to_string();
    };
    match sessions.iter().find(|s| s.session_id == id) {
        Some(session) => format!("Session: {} queries", session.query_count),
        None => "Active Session".to_string(),
    }
}

/// Title line for a session entry: its last query, or a short id
pub fn session_title(session: &HistorySession) -> String {
    match session.last_query.as_deref().map(str::trim) {
        Some(query) if !query.is_empty() => query.to_string(),
        _ => {
            let short: String = session.session_id.chars().take(8).collect();
            format!("Session {}", short)
        }
    }
}

/// Detail line for a session entry, e.g. "3 queries · 5m ago"
pub fn session_detail(session: &HistorySession, now: DateTime<Utc>) -> String {
    let count = match session.query_count {
        1 => "1 query".to_string(),
        n => format!("{} queries", n),
    };
    match session.last_activity() {
        Some(time) => format!("{} · {}", count, format_relative(time, now)),
        None => count,
    }
}

/// Turn a stored transcript into the user/assistant conversation
pub fn transcript_messages(entries: &[HistoryEntry]) -> Vec<Message> {
    entries
        .iter()
        .flat_map(|entry| {
            [
                Message::user(entry.query.clone()),
                Message::assistant(entry.response.clone()),
            ]
        })
        .collect()
}

impl Controller {
    /// Reload the session list. Returns whether the fetch succeeded.
    pub async fn refresh_history(&mut self) -> bool {
        let result = self.backend.history().await;
        self.apply_history(result)
    }

    /// Reload the aggregate counters
    pub async fn refresh_stats(&mut self) {
        let result = self.backend.stats().await;
        self.apply_stats(result);
    }

    /// Reload the session list and counters concurrently
    pub async fn refresh(&mut self) {
        let (history, stats) = tokio::join!(self.backend.history(), self.backend.stats());
        self.apply_history(history);
        self.apply_stats(stats);
    }

    fn apply_history(&mut self, result: delve_api::Result<Vec<HistorySession>>) -> bool {
        match result {
            Ok(sessions) => {
                self.state.sessions = sessions.clone();
                self.emit(AppEvent::HistoryLoaded { sessions });
                true
            }
            Err(e) => {
                tracing::warn!("Error loading history: {}", e);
                false
            }
        }
    }

    fn apply_stats(&mut self, result: delve_api::Result<delve_api::Stats>) {
        match result {
            Ok(stats) => {
                self.state.stats = stats.clone();
                self.emit(AppEvent::StatsUpdated { stats });
            }
            Err(e) => tracing::warn!("Error loading stats: {}", e),
        }
    }

    /// Search stored exchanges. A blank query lists sessions instead.
    ///
    /// Returns whether the lookup succeeded; on failure the previous
    /// results are kept.
    pub async fn search(&mut self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return self.refresh_history().await;
        }

        match self.backend.search(query, self.config.search_limit).await {
            Ok(results) => {
                self.state.search_results = results.clone();
                self.emit(AppEvent::SearchResults {
                    query: query.to_string(),
                    results,
                });
                true
            }
            Err(e) => {
                tracing::warn!("Error searching: {}", e);
                false
            }
        }
    }

    /// Replace the conversation with a stored session.
    ///
    /// Nothing changes if the fetch fails.
    pub async fn load_session(&mut self, session_id: &str) -> crate::Result<()> {
        if self.state.is_loading {
            return Err(Error::Busy);
        }

        let entries = match self.backend.session_history(session_id).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Error loading session {}: {}", session_id, e);
                return Err(e.into());
            }
        };

        let messages = transcript_messages(&entries);
        self.state.session_id = Some(session_id.to_string());
        self.state.messages = messages.clone();
        self.emit(AppEvent::SessionLoaded {
            session_id: session_id.to_string(),
            messages,
        });
        Ok(())
    }

    /// Forget the current conversation. No request is made.
    pub fn start_new_session(&mut self) {
        self.state.clear_conversation();
        self.emit(AppEvent::SessionCleared);
    }

    /// Ask before clearing the history view
    pub fn request_clear_history(&mut self) {
        self.ask(PendingConfirmation::ClearHistory);
    }

    /// Ask before resetting the server database
    pub fn request_reset(&mut self) {
        self.ask(PendingConfirmation::Reset);
    }

    fn ask(&mut self, confirmation: PendingConfirmation) {
        self.state.pending_confirmation = Some(confirmation);
        self.emit(AppEvent::ConfirmationRequested {
            prompt: confirmation.prompt().to_string(),
        });
    }

    /// Answer the pending confirmation, running the action once confirmed
    pub async fn answer_confirmation(&mut self, yes: bool) {
        let Some(pending) = self.state.pending_confirmation.take() else {
            return;
        };

        match pending.answer(yes) {
            ConfirmOutcome::Cancelled => self.emit(AppEvent::ConfirmationCancelled),
            ConfirmOutcome::Next(next) => self.ask(next),
            ConfirmOutcome::Proceed => match pending {
                PendingConfirmation::ClearHistory => self.clear_history().await,
                _ => self.reset_database().await,
            },
        }
    }

    async fn clear_history(&mut self) {
        self.clear_local();
        self.refresh().await;
    }

    async fn reset_database(&mut self) {
        self.set_loading(true);
        let result = self.backend.reset().await;
        self.set_loading(false);

        match result {
            Ok(()) => {
                tracing::info!("Database reset");
                self.clear_local();
                self.emit(AppEvent::notice(RESET_SUCCESS));
                self.refresh().await;
            }
            Err(delve_api::Error::Api { message }) => {
                self.emit(AppEvent::error_notice(format!(
                    "Failed to reset database: {}",
                    message
                )));
            }
            Err(e) => {
                tracing::warn!("Error resetting database: {}", e);
                self.emit(AppEvent::error_notice(RESET_FAILURE));
            }
        }
    }

    fn clear_local(&mut self) {
        self.state.clear_conversation();
        self.state.sessions.clear();
        self.state.search_results.clear();
        self.emit(AppEvent::SessionCleared);
    }
}
