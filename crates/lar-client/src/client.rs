//! The authenticated client.
//!
//! Request phase: read the access token from the store and attach it as a
//! bearer credential when present. Response phase: a `401` on a fresh
//! envelope triggers one refresh against `/auth/refresh` followed by one
//! re-dispatch of the original request; a `401` on a retried envelope
//! propagates as-is. A failed refresh (or a bearer-carrying request with no
//! refresh token to fall back on) tears the session down: the store is
//! cleared and the injected session-ended hook fires so the UI can navigate
//! to the login entry point. A `401` on a request that never carried a
//! bearer simply propagates; there is no session to end.

use crate::request::{should_attempt_refresh, ApiRequest, PreparedRequest, RequestEnvelope};
use crate::transport::{HttpTransport, RawResponse, ReqwestTransport};
use crate::{ClientError, ClientResult};
use lar_core::Config;
use lar_storage::TokenStore;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Hook invoked when the session has been torn down after an unrecoverable
/// authentication failure. Navigation to the login entry point belongs here.
pub type SessionEndHook = Box<dyn Fn() + Send + Sync>;

/// Refresh endpoint request body.
#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// Refresh endpoint response body.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    token: String,
}

/// Error body shape used by the API for non-success responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Authenticated HTTP client wrapping all outbound API calls.
pub struct AuthClient<T: HttpTransport = ReqwestTransport> {
    transport: T,
    store: Arc<TokenStore>,
    base_url: String,
    session_end_hook: Mutex<Option<SessionEndHook>>,
}

impl AuthClient<ReqwestTransport> {
    /// Create a client from the SDK configuration.
    pub fn new(config: &Config, store: Arc<TokenStore>) -> Self {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs));
        Self::with_transport(transport, config.base_url(), store)
    }
}

impl<T: HttpTransport> AuthClient<T> {
    /// Create a client over an explicit transport.
    pub fn with_transport(transport: T, base_url: &str, store: Arc<TokenStore>) -> Self {
        Self {
            transport,
            store,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_end_hook: Mutex::new(None),
        }
    }

    /// Install the hook fired on forced session teardown.
    pub fn set_session_end_hook(&self, hook: SessionEndHook) {
        let mut guard = self.session_end_hook.lock().unwrap();
        *guard = Some(hook);
    }

    /// The token store this client reads credentials from.
    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Send a request through the full protocol.
    ///
    /// Returns the raw response for any status the protocol does not act on;
    /// returns `ClientError::SessionExpired` when teardown was forced.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<RawResponse> {
        let envelope = RequestEnvelope::new(request);
        let had_bearer = self.store.access_token()?.is_some();
        let response = self.dispatch(&envelope).await?;

        if !should_attempt_refresh(response.status, &envelope) {
            return Ok(response);
        }

        debug!(
            method = %envelope.request.method,
            path = %envelope.request.path,
            "Unauthorized response, attempting token refresh"
        );

        let refresh_token = match self.store.refresh_token()? {
            Some(token) => token,
            None if had_bearer => {
                // A bearer was presented but there is no refresh token to
                // recover with: the stored state is torn. Tear down fully.
                warn!("Unauthorized with access token but no refresh token, ending session");
                return Err(self.end_session());
            }
            None => {
                // The request went out unauthenticated (e.g. a rejected
                // login); there is no session to end.
                return Ok(response);
            }
        };

        let new_token = match self.refresh(&refresh_token).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                return Err(self.end_session());
            }
        };

        self.store.set_access_token(&new_token)?;
        debug!("Token refreshed, re-dispatching original request once");

        // The retried envelope's response is final, whatever its status.
        let envelope = envelope.into_retried();
        self.dispatch(&envelope).await
    }

    /// Resolve the envelope against the base URL, attach the current bearer
    /// credential if one is stored, and hand it to the transport.
    async fn dispatch(&self, envelope: &RequestEnvelope) -> ClientResult<RawResponse> {
        let bearer = self.store.access_token()?;
        let prepared = PreparedRequest {
            method: envelope.request.method.clone(),
            url: format!("{}{}", self.base_url, envelope.request.path),
            bearer,
            body: envelope.request.body.clone(),
        };
        self.transport.execute(prepared).await
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Sent without a bearer credential; the refresh token itself is the
    /// authentication.
    async fn refresh(&self, refresh_token: &str) -> ClientResult<String> {
        let prepared = PreparedRequest {
            method: Method::POST,
            url: format!("{}/auth/refresh", self.base_url),
            bearer: None,
            body: Some(serde_json::to_value(RefreshRequest { refresh_token })?),
        };

        let response = self.transport.execute(prepared).await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }

        let body: RefreshResponse = response.json()?;
        Ok(body.token)
    }

    /// Tear the session down: clear the full stored triple and fire the
    /// session-ended hook. Returns the error the caller should propagate.
    fn end_session(&self) -> ClientError {
        if let Err(e) = self.store.clear_session() {
            warn!(error = %e, "Failed to clear token store during session teardown");
        }

        let hook = self.session_end_hook.lock().unwrap();
        if let Some(ref hook) = *hook {
            hook();
        }

        ClientError::SessionExpired
    }

    // ==========================================
    // Typed helpers for session ops and domain resource clients
    // ==========================================

    /// GET a JSON resource.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> ClientResult<R> {
        let response = self.send(ApiRequest::get(path)).await?;
        decode(&response)
    }

    /// POST a JSON body, decoding the JSON response.
    pub async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<R> {
        let request = ApiRequest::post(path, serde_json::to_value(body)?);
        let response = self.send(request).await?;
        decode(&response)
    }

    /// PUT a JSON body, decoding the JSON response.
    pub async fn put_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<R> {
        let request = ApiRequest::put(path, serde_json::to_value(body)?);
        let response = self.send(request).await?;
        decode(&response)
    }

    /// POST with no body, ignoring the response body. Used for logout.
    pub async fn post_empty(&self, path: &str) -> ClientResult<()> {
        let response = self.send(ApiRequest::post_empty(path)).await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }
        Ok(())
    }

    /// DELETE a resource, ignoring the response body.
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        let response = self.send(ApiRequest::delete(path)).await?;
        if !response.is_success() {
            return Err(api_error(&response));
        }
        Ok(())
    }
}

/// Decode a success response, or map a non-success status to an API error.
fn decode<R: DeserializeOwned>(response: &RawResponse) -> ClientResult<R> {
    if !response.is_success() {
        return Err(api_error(response));
    }
    response.json()
}

/// Build an API error from a non-success response, preferring the body's
/// `error`/`message` fields.
fn api_error(response: &RawResponse) -> ClientError {
    let message = serde_json::from_str::<ApiErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| {
            if response.body.is_empty() {
                "(empty body)".to_string()
            } else {
                response.body.chars().take(200).collect()
            }
        });
    ClientError::Api {
        status: response.status,
        message,
    }
}
