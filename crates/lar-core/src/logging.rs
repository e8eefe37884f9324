//! Logging initialization for the client SDK.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// The filter is taken from `RUST_LOG` when set, otherwise from the provided
/// default level. Safe to call more than once; later calls are no-ops.
///
/// # Example
///
/// ```ignore
/// lar_core::init_logging("info");
/// tracing::info!("client started");
/// ```
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
