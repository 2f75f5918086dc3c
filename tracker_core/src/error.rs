/**
 * Error types for the tracker SDK.
 *
 * Only `NotInitialized`, `ConfigError`, `Spawn` and `UserId` ever reach
 * application code. `MissingConfig`, `DeliveryFailed`, `Abandoned` and
 * `TransportPanicked` are produced inside the drain loop, where they are logged and handed to the
 * `on_batch_dropped` callback but never returned from `submit`.
 */
use thiserror::Error;

/// Result alias used throughout the SDK.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// The SDK was never initialized, or `shutdown` has been called.
    #[error("SDK not initialized. Call initialize() first.")]
    NotInitialized,

    /// Options were rejected at construction time.
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// A required identifier was absent when a batch was about to be sent.
    /// The batch is dropped without retrying.
    #[error("{0} is not set. Call initialize() first.")]
    MissingConfig(&'static str),

    /// Every allowed attempt failed; the batch was discarded.
    #[error("All {attempts} attempts to send events failed")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        last_error: Option<TransportError>,
    },

    /// Shutdown arrived after at least one failed attempt; the remaining
    /// attempts were skipped.
    #[error("Batch abandoned on shutdown after {attempts} attempts")]
    Abandoned {
        attempts: u32,
        #[source]
        last_error: Option<TransportError>,
    },

    /// The transport panicked while sending; the batch was discarded.
    #[error("Transport panicked while sending events")]
    TransportPanicked,

    #[error("Failed to spawn drain thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to read or persist user id: {0}")]
    UserId(#[source] std::io::Error),
}

/**
 * A failed delivery attempt. Every variant is retry-eligible.
 */
#[derive(Debug, Error)]
pub enum TransportError {
    /// The collector answered with something other than `200 OK`.
    #[error("Collector responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Host unreachable, connection reset, timeout, TLS failure and so on.
    #[error("Network unavailable: {0}")]
    Network(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        Self::Network(err.to_string())
    }
}
