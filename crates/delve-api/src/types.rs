//! Core types for the chat API

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// A message in the conversation sent along with every chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a `POST /api/chat` request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub messages: Vec<Message>,
    pub session_id: Option<String>,
    pub stream: bool,
}

impl ChatRequest {
    /// Build a request for `message` on top of the existing conversation
    pub fn new(message: impl Into<String>, messages: &[Message], session_id: Option<&str>) -> Self {
        Self {
            message: message.into(),
            messages: messages.to_vec(),
            session_id: session_id.map(str::to_string),
            stream: false,
        }
    }

    /// Set the streaming flag
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Normalized result of a successful chat round trip, buffered or streamed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatReply {
    /// Full assistant response text
    pub text: String,
    /// Session the exchange was recorded under
    pub session_id: Option<String>,
    /// Server's view of the conversation after this exchange
    pub messages: Option<Vec<Message>>,
}

/// Summary of a past session as listed by `GET /api/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySession {
    pub session_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub query_count: u32,
    #[serde(default)]
    pub last_query: Option<String>,
}

impl HistorySession {
    /// Most recent activity, falling back to creation time
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.updated_at
            .as_deref()
            .or(self.created_at.as_deref())
            .and_then(parse_server_time)
    }
}

/// One query/response pair of a stored session transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: Option<i64>,
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<u64>,
    #[serde(default)]
    pub response_time: Option<f64>,
}

/// A transcript entry matching a free-text search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub id: Option<i64>,
    pub session_id: String,
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl SearchResult {
    /// Short preview of the response for list display
    pub fn preview(&self) -> String {
        let head: String = self.response.chars().take(100).collect();
        format!("{}...", head)
    }
}

/// Aggregate counters from `GET /api/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub total_queries: u64,
    pub total_sessions: u64,
    pub total_tokens: u64,
    pub avg_response_time: f64,
}

/// Parse a server timestamp.
///
/// The server stores SQLite `CURRENT_TIMESTAMP` values (`YYYY-MM-DD HH:MM:SS`,
/// UTC); RFC 3339 is accepted as well.
pub fn parse_server_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

// Response envelopes

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sessions: Vec<HistorySession>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SessionHistoryBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<SearchResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResetBody {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_chat_request_serializes_null_session() {
        let req = ChatRequest::new("hi", &[Message::user("earlier")], None).streaming(true);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["message"], "hi");
        assert_eq!(json["stream"], true);
        assert!(json["session_id"].is_null());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_history_session_tolerates_missing_fields() {
        let s: HistorySession =
            serde_json::from_str(r#"{"session_id":"abc","query_count":3}"#).unwrap();
        assert_eq!(s.session_id, "abc");
        assert_eq!(s.query_count, 3);
        assert!(s.last_query.is_none());
        assert!(s.last_activity().is_none());
    }

    #[test]
    fn test_stats_defaults_missing_counters() {
        let body: StatsBody =
            serde_json::from_str(r#"{"success":true,"stats":{"total_queries":7}}"#).unwrap();
        assert_eq!(body.stats.total_queries, 7);
        assert_eq!(body.stats.total_sessions, 0);
    }

    #[test]
    fn test_parse_sqlite_timestamp() {
        let dt = parse_server_time("2024-03-05 14:07:09").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (14, 7, 9));
    }

    #[test]
    fn test_parse_rfc3339_timestamp() {
        let dt = parse_server_time("2024-03-05T14:07:09+02:00").unwrap();
        assert_eq!(dt.hour(), 12);
        assert!(parse_server_time("yesterday").is_none());
    }

    #[test]
    fn test_search_preview_truncates_on_chars() {
        let result = SearchResult {
            id: None,
            session_id: "s".into(),
            query: "q".into(),
            response: "é".repeat(150),
            created_at: None,
        };
        let preview = result.preview();
        assert_eq!(preview.chars().count(), 103);
        assert!(preview.ends_with("..."));
    }
}
