//! delve-app: Application state and chat controller
//!
//! This crate holds everything between the HTTP client and a concrete user
//! interface: the conversation state, the controller that drives chat
//! submissions and history operations, and the renderer-agnostic view model
//! of the message log. Front ends subscribe to [`AppEvent`]s.

pub mod controller;
pub mod error;
pub mod events;
pub mod history;
pub mod log;
pub mod state;

pub use controller::{Controller, ControllerConfig, GENERIC_FAILURE};
pub use error::{Error, Result};
pub use events::AppEvent;
pub use history::{
    ConfirmOutcome, PendingConfirmation, format_relative, format_server_time, session_detail,
    session_label, session_title, transcript_messages,
};
pub use log::{EntryKind, LogEntry, MessageLog};
pub use state::AppState;
