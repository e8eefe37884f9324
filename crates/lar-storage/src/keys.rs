//! Storage key constants.

/// Storage keys used by the token store
pub struct StorageKeys;

impl StorageKeys {
    /// Access token attached to authenticated requests
    pub const AUTH_TOKEN: &'static str = "auth_token";

    /// Refresh token exchanged for a new access token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Serialized user profile (JSON)
    pub const USER: &'static str = "user";
}
