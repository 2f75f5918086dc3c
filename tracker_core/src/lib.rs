/*!
 * Tracker Core: the internal SDK engine.
 *
 * This crate provides the event model, the batching dispatcher, its retry
 * policy, and the HTTP transport. Applications should depend on the
 * `activity_tracker` facade crate instead, which owns the SDK lifecycle
 * and user identity.
 *
 * # Module structure
 *
 * - `protocol/`: what we send (`Event`, the `RequestData` envelope, constants)
 * - `transport/`: how we deliver (queue, retry, cancellation, HTTP, worker)
 * - `dispatcher`: `submit` / `shutdown` / `flush` over one queue and worker
 * - `config`: `Options` and its validated form
 * - `error`: `TrackerError` and `TransportError`
 *
 * # Delivery semantics
 *
 * Best effort. A batch removed from the queue is never put back: once its
 * attempts run out it is logged, handed to `Options::on_batch_dropped`, and
 * discarded. Events still queued at shutdown are discarded as well.
 */

mod config;
mod dispatcher;
mod error;
mod protocol;
pub mod transport;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use config::{DispatchConfig, DropCallback, Options};
pub use dispatcher::Dispatcher;
pub use error::{Result, TrackerError, TransportError};
pub use protocol::constants::{
    DEFAULT_BATCH_LIMIT, DEFAULT_MAX_ATTEMPTS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SEND_DELAY_MS,
    SDK_VERSION,
};
pub use protocol::types::{Event, RequestData};
pub use transport::{DispatcherState, HttpTransport, RetryPolicy, Transport};

// Re-exported so callers can build event data without naming serde_json.
pub use serde_json::{json, Map, Value};
