/**
 * Dispatcher configuration.
 *
 * `Options` is what callers fill in (or deserialize). It is validated and
 * frozen into a `DispatchConfig` exactly once, in `Dispatcher::new`; the
 * resulting value is shared read-only with the drain worker for the
 * dispatcher's whole lifetime.
 */
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, TrackerError};
use crate::protocol::constants::{
    DEFAULT_BATCH_LIMIT, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SEND_DELAY_MS,
};
use crate::protocol::types::Event;

/// Callback invoked with a batch that will never be delivered, and why.
pub type DropCallback = Arc<dyn Fn(&[Event], &TrackerError) + Send + Sync>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/**
 * Configuration options for a `Dispatcher`.
 *
 * All fields have defaults, so options can be built with struct update
 * syntax or read from JSON where missing keys fall back to `Default`:
 *
 * ```ignore
 * let options = tracker_core::Options {
 *     server_endpoint: "https://collector.example.com/events".into(),
 *     app_id: Some(7),
 *     user_id: Some("3f0c...".into()),
 *     batch_limit: 50,
 *     ..Default::default()
 * };
 * ```
 */
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Collector URL every batch is PUT to.
    pub server_endpoint: String,

    /// Application identifier included in every request.
    pub app_id: Option<i64>,

    /// Stable per-install user identifier included in every request.
    pub user_id: Option<String>,

    /// Maximum number of events per request. Must be positive.
    /// Default: `20`.
    pub batch_limit: usize,

    /// Pause after each batch and after each failed attempt, in milliseconds.
    /// Default: `500`.
    pub send_delay_ms: u64,

    /// Delivery attempts per batch before it is dropped. `0` drops every
    /// batch without contacting the collector.
    /// Default: `3`.
    pub max_attempts: u32,

    /// Upper bound for a single HTTP request, in milliseconds.
    /// Default: `30000`.
    pub request_timeout_ms: u64,

    /// Optional hook told about every batch that is dropped: retries ran
    /// out, identifiers were missing, shutdown cut retries short, or the
    /// transport panicked.
    #[serde(skip)]
    pub on_batch_dropped: Option<DropCallback>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            server_endpoint: String::new(),
            app_id: None,
            user_id: None,
            batch_limit: DEFAULT_BATCH_LIMIT,
            send_delay_ms: DEFAULT_SEND_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            on_batch_dropped: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("server_endpoint", &self.server_endpoint)
            .field("app_id", &self.app_id)
            .field("user_id", &self.user_id)
            .field("batch_limit", &self.batch_limit)
            .field("send_delay_ms", &self.send_delay_ms)
            .field("max_attempts", &self.max_attempts)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("on_batch_dropped", &self.on_batch_dropped.is_some())
            .finish()
    }
}

impl Options {
    /// Deserializes options from a JSON document, e.g. a bundled config file.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrackerError::ConfigError(e.to_string()))
    }

    pub fn send_delay(&self) -> Duration {
        Duration::from_millis(self.send_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// DispatchConfig
// ---------------------------------------------------------------------------

/**
 * Immutable, validated view of `Options` owned by a dispatcher.
 *
 * Identifiers stay optional here: a missing one is reported per batch at
 * send time (`TrackerError::MissingConfig`) rather than refusing to build
 * the dispatcher.
 */
pub struct DispatchConfig {
    pub server_endpoint: Option<String>,
    pub app_id: Option<i64>,
    pub user_id: Option<String>,
    pub batch_limit: usize,
    pub send_delay: Duration,
    pub max_attempts: u32,
    pub on_batch_dropped: Option<DropCallback>,
}

impl DispatchConfig {
    pub fn from_options(options: Options) -> Result<Self> {
        if options.batch_limit == 0 {
            return Err(TrackerError::ConfigError(
                "batch_limit must be a positive integer".into(),
            ));
        }

        let send_delay = options.send_delay();
        Ok(Self {
            server_endpoint: non_empty(options.server_endpoint),
            app_id: options.app_id,
            user_id: options.user_id.and_then(non_empty),
            batch_limit: options.batch_limit,
            send_delay,
            max_attempts: options.max_attempts,
            on_batch_dropped: options.on_batch_dropped,
        })
    }

    /**
     * Returns `(endpoint, app_id, user_id)`, or the first one missing.
     */
    pub fn identifiers(&self) -> Result<(&str, i64, &str)> {
        let endpoint = self
            .server_endpoint
            .as_deref()
            .ok_or(TrackerError::MissingConfig("Server endpoint"))?;
        let app_id = self.app_id.ok_or(TrackerError::MissingConfig("App ID"))?;
        let user_id = self
            .user_id
            .as_deref()
            .ok_or(TrackerError::MissingConfig("User ID"))?;
        Ok((endpoint, app_id, user_id))
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
