/**
 * Transport layer: queueing, retry, HTTP delivery and the drain worker.
 *
 * Everything related to *how* events reach the collector:
 * - `queue`: the locked event buffer and the drain-loop state machine
 * - `retry`: bounded fixed-delay retry for one batch
 * - `cancel`: shutdown token checked between attempts and batches
 * - `http`: the `Transport` seam and its `ureq` implementation
 * - `worker`: the background thread that drains the queue
 */

pub mod cancel;
pub mod http;
pub mod queue;
pub mod retry;
pub mod worker;

pub use cancel::CancelToken;
pub use http::{HttpTransport, Transport};
pub use queue::{Admission, DispatcherState, EventQueue};
pub use retry::{RetryOutcome, RetryPolicy};
pub use worker::{DrainContext, Worker};
