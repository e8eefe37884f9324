//! Session error types.

use lar_client::ClientError;
use lar_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the session manager.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Input rejected before any request went out.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The server rejected the credentials.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The lifecycle machine refused the requested transition.
    #[error("Invalid session state transition: {0}")]
    InvalidStateTransition(String),

    /// The server answered with a shape we do not understand.
    #[error("Unexpected server response: {0}")]
    UnexpectedResponse(String),

    /// Token storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The underlying HTTP client failed.
    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

/// Convenience result alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
