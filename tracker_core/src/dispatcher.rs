/**
 * The dispatcher: owns the event queue, the drain worker, and the
 * transport for one initialized SDK.
 *
 * Lifecycle:
 * 1. `Dispatcher::new(options)` validates the options and builds the
 *    shared `DrainContext`. No thread is started yet.
 * 2. `submit(event)` enqueues and, if no loop is running, spawns one.
 * 3. `shutdown()` (or dropping the dispatcher) discards queued events and
 *    stops the worker after its current transport call.
 *
 * There is no global instance: the facade owns the dispatcher and passes
 * configuration in explicitly.
 */
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{DispatchConfig, Options};
use crate::error::{Result, TrackerError};
use crate::protocol::types::Event;
use crate::transport::{
    Admission, DispatcherState, DrainContext, HttpTransport, Transport, Worker,
};

pub struct Dispatcher {
    ctx: Arc<DrainContext>,
}

impl Dispatcher {
    /**
     * Creates a dispatcher that delivers over HTTP.
     *
     * # Returns
     * `Err(TrackerError::ConfigError)` if `batch_limit` is zero.
     */
    pub fn new(options: Options) -> Result<Self> {
        let transport = HttpTransport::new(options.request_timeout());
        Self::with_transport(options, Arc::new(transport))
    }

    /**
     * Creates a dispatcher that delivers through a caller-supplied
     * `Transport`.
     */
    pub fn with_transport(options: Options, transport: Arc<dyn Transport>) -> Result<Self> {
        let config = DispatchConfig::from_options(options)?;
        debug!(
            batch_limit = config.batch_limit,
            send_delay_ms = config.send_delay.as_millis() as u64,
            max_attempts = config.max_attempts,
            "dispatcher created"
        );

        Ok(Self {
            ctx: Arc::new(DrainContext::new(config, transport)),
        })
    }

    /**
     * Enqueues an event for delivery. Never waits on the network.
     *
     * # Returns
     * - `Ok(())` once the event is queued. Delivery failures are never
     *   reported here.
     * - `Err(TrackerError::NotInitialized)` after `shutdown`; nothing is
     *   enqueued.
     * - `Err(TrackerError::Spawn)` if the OS refused a drain thread. The
     *   event stays queued and the next `submit` tries again.
     */
    pub fn submit(&self, event: Event) -> Result<()> {
        match self.ctx.queue.enqueue(event) {
            Admission::Queued => Ok(()),
            Admission::Rejected => Err(TrackerError::NotInitialized),
            Admission::StartDrain => Worker::spawn(Arc::clone(&self.ctx)).map_err(|err| {
                warn!(error = %err, "could not start drain loop");
                self.ctx.queue.abandon_drain();
                TrackerError::Spawn(err)
            }),
        }
    }

    /**
     * Discards every queued event and moves to the terminal state.
     *
     * A transport call already in progress is allowed to finish; its
     * remaining retries and the pending delay are skipped and no further
     * batch is taken. Idempotent.
     */
    pub fn shutdown(&self) {
        if self.ctx.queue.state() == DispatcherState::Closed {
            return;
        }

        let discarded = self.ctx.queue.close();
        self.ctx.cancel.cancel();
        info!(discarded, "dispatcher shut down");
    }

    /**
     * Blocks until the drain loop has emptied the queue and gone idle, or
     * `timeout` elapses.
     *
     * # Returns
     * `true` if the loop went idle in time.
     */
    pub fn flush(&self, timeout: Duration) -> bool {
        self.ctx.queue.wait_idle(timeout)
    }

    /// Number of events waiting to be taken into a batch.
    pub fn pending(&self) -> usize {
        self.ctx.queue.len()
    }

    pub fn state(&self) -> DispatcherState {
        self.ctx.queue.state()
    }

    /// Number of drain loops started over the dispatcher's lifetime.
    pub fn drain_starts(&self) -> usize {
        self.ctx.drain_starts.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == DispatcherState::Closed
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
