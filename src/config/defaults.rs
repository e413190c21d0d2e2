//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default HTTP method.
pub const METHOD: &str = crate::message::DEFAULT_METHOD;

/// Default connection timeout in seconds.
pub const TIMEOUT_SECS: u64 = crate::connection::DEFAULT_CONNECTION_TIMEOUT.as_secs();

/// Default interval between connection polls in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 50;

/// Default redirect limit. Negative means the transport decides.
pub const MAX_REDIRECTS: i32 = -1;

/// Redirects are followed unless disabled.
pub const FOLLOW_REDIRECTS: bool = true;

/// Default config file name written by `init`.
pub const CONFIG_FILE: &str = "urlclient.toml";

/// Default connection timeout as Duration.
#[must_use]
pub const fn timeout() -> Duration {
    Duration::from_secs(TIMEOUT_SECS)
}

/// Default poll interval as Duration.
#[must_use]
pub const fn poll_interval() -> Duration {
    Duration::from_millis(POLL_INTERVAL_MS)
}
