//! Client error types.

use thiserror::Error;

/// Error type for the authenticated client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network-level failure; propagated unmodified to the caller
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server returned a non-success status
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// An authenticated call failed with 401 and the refresh also failed;
    /// the session has been torn down
    #[error("Session expired")]
    SessionExpired,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] lar_storage::StorageError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

/// Result type alias using ClientError.
pub type ClientResult<T> = Result<T, ClientError>;
