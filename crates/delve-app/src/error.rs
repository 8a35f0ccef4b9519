//! Error types for delve-app

use thiserror::Error;

/// Result type alias using delve-app Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during controller operations
#[derive(Error, Debug)]
pub enum Error {
    /// An error from the API client
    #[error(transparent)]
    Api(#[from] delve_api::Error),

    /// A chat submission is already in flight
    #[error("A request is already in progress")]
    Busy,

    /// A generic controller error
    #[error("{0}")]
    Other(String),
}
