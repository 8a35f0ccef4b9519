//! HTTP client for the chat server

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::{
    error::{Error, Result},
    stream::{self, ChatEventStream, StreamUpdate},
    types::{
        ChatReply, ChatRequest, ChatResponseBody, HistoryBody, HistoryEntry, HistorySession,
        ResetBody, SearchBody, SearchResult, SessionHistoryBody, Stats, StatsBody,
    },
};

/// Operations offered by the chat server
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Buffered chat round trip
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply>;

    /// Streaming chat request
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatEventStream>;

    /// List past sessions
    async fn history(&self) -> Result<Vec<HistorySession>>;

    /// Full transcript of one session
    async fn session_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>>;

    /// Free-text search over stored queries and responses
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>>;

    /// Aggregate counters
    async fn stats(&self) -> Result<Stats>;

    /// Delete all stored sessions on the server
    async fn reset(&self) -> Result<()>;

    /// Health probe; the payload is opaque
    async fn health(&self) -> Result<serde_json::Value>;

    /// Send a chat request honouring its streaming flag.
    ///
    /// Both request shapes come back as a [`ChatEventStream`]; a buffered
    /// reply is a stream holding a single `Done` update.
    async fn respond(&self, request: &ChatRequest) -> Result<ChatEventStream> {
        if request.stream {
            return self.chat_stream(request).await;
        }
        let reply = self.chat(request).await?;
        Ok(Box::pin(futures::stream::once(async move {
            StreamUpdate::Done(reply)
        })))
    }
}

/// reqwest-based client for the chat server
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
}

impl ChatClient {
    /// Create a client for the server at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client that gives up connecting after `timeout`.
    ///
    /// Only connection setup is bounded; a stalled response stream is not.
    pub fn with_connect_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        Self::with_client(client, base_url)
    }

    /// Create from an existing reqwest client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "base URL must start with http:// or https://, got {:?}",
                base_url
            )));
        }
        Ok(Self { client, base_url })
    }

    /// Server base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response)?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        tracing::warn!("Request to {} failed with status {}", response.url(), status);
        return Err(Error::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

/// Map an envelope's `success`/`error` pair to a Result
fn ensure_success(success: bool, error: Option<String>, what: &str) -> Result<()> {
    if success {
        Ok(())
    } else {
        Err(Error::api(
            error.unwrap_or_else(|| format!("Failed to {}", what)),
        ))
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply> {
        let mut request = request.clone();
        request.stream = false;

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await?;
        let response = check_status(response)?;
        let body: ChatResponseBody = serde_json::from_str(&response.text().await?)?;

        ensure_success(body.success, body.error, "process chat request")?;
        Ok(ChatReply {
            text: body.response.unwrap_or_default(),
            session_id: body.session_id,
            messages: body.messages,
        })
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChatEventStream> {
        let mut request = request.clone();
        request.stream = true;

        let response = self
            .client
            .post(self.url("/api/chat"))
            .header("accept", "text/event-stream")
            .json(&request)
            .send()
            .await?;
        let response = check_status(response)?;

        Ok(stream::consume(response.bytes_stream()))
    }

    async fn history(&self) -> Result<Vec<HistorySession>> {
        let body: HistoryBody = self.get_json(&self.url("/api/history")).await?;
        ensure_success(body.success, body.error, "fetch research history")?;
        Ok(body.sessions)
    }

    async fn session_history(&self, session_id: &str) -> Result<Vec<HistoryEntry>> {
        let url = self.url(&format!(
            "/api/history/{}",
            urlencoding::encode(session_id)
        ));
        let body: SessionHistoryBody = self.get_json(&url).await?;
        ensure_success(body.success, body.error, "fetch session history")?;
        Ok(body.history)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let response = self
            .client
            .get(self.url("/api/search"))
            .query(&[("q", query.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        let response = check_status(response)?;
        let body: SearchBody = serde_json::from_str(&response.text().await?)?;
        ensure_success(body.success, body.error, "search research")?;
        Ok(body.results)
    }

    async fn stats(&self) -> Result<Stats> {
        let body: StatsBody = self.get_json(&self.url("/api/stats")).await?;
        ensure_success(body.success, body.error, "fetch database stats")?;
        Ok(body.stats)
    }

    async fn reset(&self) -> Result<()> {
        let response = self
            .client
            .post(self.url("/api/reset"))
            .json(&serde_json::json!({ "confirm": true }))
            .send()
            .await?;
        let response = check_status(response)?;
        let body: ResetBody = serde_json::from_str(&response.text().await?)?;
        ensure_success(body.success, body.error, "reset database")
    }

    async fn health(&self) -> Result<serde_json::Value> {
        self.get_json(&self.url("/api/health")).await
    }
}
