//! Persisted session storage for the lar client.
//!
//! This crate provides the token store: a key/value abstraction holding the
//! current access token, refresh token, and serialized user profile. The
//! default backend persists to a JSON file under `~/.lar` and survives
//! process restarts.

mod file;
mod keys;
mod store;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use store::{StoredSession, TokenStore, User};
pub use traits::TokenStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a TokenStore backed by the default file storage location.
pub fn create_token_store(paths: &lar_core::Paths) -> StorageResult<TokenStore> {
    let storage = FileStorage::new(paths.session_file())?;
    Ok(TokenStore::new(Box::new(storage)))
}
