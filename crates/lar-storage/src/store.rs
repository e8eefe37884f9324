//! High-level API for the persisted session.

use crate::{StorageKeys, StorageResult, TokenStorage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User profile as returned by the API.
///
/// Immutable once fetched; replaced wholesale on re-login. Wire field names
/// are Portuguese, matching the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: i64,
    /// Display name
    #[serde(rename = "nome")]
    pub name: String,
    /// Email address
    pub email: String,
    /// Account creation timestamp
    #[serde(rename = "criado_em")]
    pub created_at: DateTime<Utc>,
}

/// The persisted session triple.
///
/// Either absent or fully populated; the three fields are always written and
/// cleared together.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSession {
    /// Short-lived credential attached to each authenticated request
    pub access_token: String,
    /// Longer-lived credential exchanged for a new access token
    pub refresh_token: String,
    /// Profile of the logged-in user
    pub user: User,
}

/// High-level API for storing and retrieving the session
pub struct TokenStore {
    storage: Box<dyn TokenStorage>,
}

impl TokenStore {
    /// Create a new token store with the given storage backend
    pub fn new(storage: Box<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the full session.
    ///
    /// Returns `None` unless all three fields are present and the user
    /// profile deserializes; a torn triple reads as no session.
    pub fn session(&self) -> StorageResult<Option<StoredSession>> {
        let access_token = match self.storage.get(StorageKeys::AUTH_TOKEN)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let refresh_token = match self.storage.get(StorageKeys::REFRESH_TOKEN)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let user_json = match self.storage.get(StorageKeys::USER)? {
            Some(u) => u,
            None => return Ok(None),
        };

        let user: User = match serde_json::from_str(&user_json) {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, "Stored user profile failed to deserialize");
                return Ok(None);
            }
        };

        Ok(Some(StoredSession {
            access_token,
            refresh_token,
            user,
        }))
    }

    /// Persist a full session, writing all three fields together.
    pub fn set_session(&self, session: &StoredSession) -> StorageResult<()> {
        let user_json = serde_json::to_string(&session.user)?;
        self.storage
            .set(StorageKeys::AUTH_TOKEN, &session.access_token)?;
        self.storage
            .set(StorageKeys::REFRESH_TOKEN, &session.refresh_token)?;
        self.storage.set(StorageKeys::USER, &user_json)?;
        tracing::debug!(user_id = session.user.id, "Session persisted");
        Ok(())
    }

    /// Remove all three fields together. Idempotent.
    pub fn clear_session(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::USER)?;
        tracing::debug!("Session cleared");
        Ok(())
    }

    /// Retrieve the access token
    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::AUTH_TOKEN)
    }

    /// Retrieve the refresh token
    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Retrieve the stored user profile
    pub fn user(&self) -> StorageResult<Option<User>> {
        Ok(self.session()?.map(|s| s.user))
    }

    /// Replace only the access token after a successful refresh.
    /// The refresh token and user profile are left untouched.
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::AUTH_TOKEN, token)
    }

    /// Check whether a stored session exists.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.session()?.is_some())
    }
}
