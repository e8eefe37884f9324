//! Authenticated HTTP client for the lar API.
//!
//! This crate provides:
//! - A transport seam (`HttpTransport`) with a reqwest-backed implementation
//! - Bearer token injection from the persisted token store
//! - Automatic refresh-and-retry on `401 Unauthorized`, capped at one cycle
//!   per originating request by an immutable per-dispatch envelope
//! - Forced session teardown (store cleared + session-ended hook) when the
//!   refresh itself fails

mod client;
mod error;
mod request;
mod transport;

pub use client::{AuthClient, SessionEndHook};
pub use error::{ClientError, ClientResult};
pub use request::{should_attempt_refresh, ApiRequest, PreparedRequest, RequestEnvelope};
pub use transport::{HttpTransport, RawResponse, ReqwestTransport};

/// Re-export so callers can build requests without a direct http dependency.
pub use reqwest::Method;
