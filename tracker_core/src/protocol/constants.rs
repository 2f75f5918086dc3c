/**
 * SDK-wide constants and configuration defaults.
 */
use std::time::Duration;

/// SDK version string attached to the `open` / `first_open` events.
/// Derived at compile time from the `tracker_core` package version.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default maximum number of events sent in one request.
pub const DEFAULT_BATCH_LIMIT: usize = 20;

/// Default pause between batches and between failed attempts, in milliseconds.
pub const DEFAULT_SEND_DELAY_MS: u64 = 500;

/// Default number of delivery attempts per batch before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default upper bound for a single HTTP request, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Connect timeout used by the HTTP transport.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
