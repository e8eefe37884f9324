//! HTTP transport seam.
//!
//! The client's protocol logic is written against `HttpTransport` so tests
//! can script responses without a network; production uses the reqwest
//! implementation.

use crate::{ClientResult, PreparedRequest};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// Connect timeout for the reqwest transport.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A raw HTTP response: status plus body text.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
}

impl RawResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Trait for executing a prepared HTTP request.
pub trait HttpTransport: Send + Sync {
    /// Execute the request, returning the raw response.
    ///
    /// A `RawResponse` is returned for any status code; only network-level
    /// failures are errors.
    fn execute(
        &self,
        request: PreparedRequest,
    ) -> impl Future<Output = ClientResult<RawResponse>> + Send;
}

/// Production transport backed by reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: PreparedRequest) -> ClientResult<RawResponse> {
        let mut builder = self.client.request(request.method, &request.url);

        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(RawResponse { status, body })
    }
}
