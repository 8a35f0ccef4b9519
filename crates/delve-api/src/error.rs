//! Error types for delve-api

use thiserror::Error;

/// Result type alias using delve-api Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the chat server
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed (connection refused, reset, body read error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server answered with a non-success status code
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// Server reported an application-level failure (`success: false` or an
    /// `error` frame). The message is shown to the user verbatim.
    #[error("{message}")]
    Api { message: String },

    /// The response stream broke before a terminal frame was seen
    #[error("Stream error: {0}")]
    Stream(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an application-level error from a server message
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Whether this failure happened below the application protocol:
    /// network, status code, undecodable body or a broken stream.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Status { .. } | Error::Json(_) | Error::Stream(_)
        )
    }

    /// Whether the server itself reported the failure
    pub fn is_application(&self) -> bool {
        matches!(self, Error::Api { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_message_verbatim() {
        let e = Error::api("Model overloaded, try later");
        assert_eq!(e.to_string(), "Model overloaded, try later");
        assert!(e.is_application());
        assert!(!e.is_transport());
    }

    #[test]
    fn test_status_error_is_transport() {
        let e = Error::Status { status: 502 };
        assert!(e.is_transport());
        assert!(!e.is_application());
        assert_eq!(e.to_string(), "HTTP error! status: 502");
    }

    #[test]
    fn test_stream_and_json_errors_are_transport() {
        assert!(Error::Stream("connection reset".into()).is_transport());
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(Error::Json(json).is_transport());
    }

    #[test]
    fn test_invalid_config_is_neither() {
        let e = Error::InvalidConfig("bad url".into());
        assert!(!e.is_transport());
        assert!(!e.is_application());
    }
}
