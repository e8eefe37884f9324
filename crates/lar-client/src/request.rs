//! Request types and the retry-once decision.

use reqwest::Method;
use serde_json::Value;

/// Status code that triggers the refresh-and-retry protocol.
const UNAUTHORIZED: u16 = 401;

/// An outbound API call, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL, e.g. `/auth/me`
    pub path: String,
    /// Optional JSON body
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Build a GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    /// Build a POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a POST request with no body.
    pub fn post_empty(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: None,
        }
    }

    /// Build a PUT request with a JSON body.
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            body: Some(body),
        }
    }

    /// Build a DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::DELETE,
            path: path.into(),
            body: None,
        }
    }
}

/// An `ApiRequest` plus its retried marker.
///
/// The marker is part of the value, created once per dispatch, never mutated
/// in place: a retried envelope can only be obtained by consuming a fresh
/// one. At most one refresh-and-retry cycle per originating call.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    /// The originating request
    pub request: ApiRequest,
    /// Whether this envelope has already been through a refresh-and-retry
    pub retried: bool,
}

impl RequestEnvelope {
    /// Wrap a fresh request.
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Consume this envelope, producing its retried counterpart.
    pub fn into_retried(self) -> Self {
        Self {
            request: self.request,
            retried: true,
        }
    }
}

/// Whether a response should trigger a refresh-and-retry cycle.
///
/// Pure function of the status and envelope: true only for a 401 on an
/// envelope that has not already been retried.
pub fn should_attempt_refresh(status: u16, envelope: &RequestEnvelope) -> bool {
    status == UNAUTHORIZED && !envelope.retried
}

/// A fully resolved request handed to the transport: absolute URL, optional
/// bearer credential, optional JSON body.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Bearer credential for the Authorization header, if any
    pub bearer: Option<String>,
    /// Optional JSON body
    pub body: Option<Value>,
}
