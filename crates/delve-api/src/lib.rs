//! delve-api: Client for the delve research-chat HTTP API
//!
//! This crate provides the wire types, the streaming frame consumer and an
//! HTTP client for the chat, history, search, stats and reset endpoints.

pub mod client;
pub mod error;
pub mod stream;
pub mod types;

pub use client::{ChatBackend, ChatClient};
pub use error::{Error, Result};
pub use stream::{ChatEventStream, StreamEvent, StreamUpdate};
pub use types::*;
