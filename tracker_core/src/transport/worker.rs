/**
 * Background drain worker that turns queued events into delivered batches.
 *
 * Architecture overview:
 *
 * ```text
 *  ┌──────────────┐   enqueue    ┌────────────┐  take_batch  ┌───────────────┐
 *  │  User code    │ ──────────► │ EventQueue │ ───────────► │ Drain thread  │
 *  │  (any thread) │             └────────────┘              │ (at most one) │
 *  └──────────────┘                                          └───────┬───────┘
 *                                                                    │
 *                                                 RetryPolicy + Transport::send()
 *                                                                    │
 *                                                             ┌──────▼──────┐
 *                                                             │  Collector  │
 *                                                             └─────────────┘
 * ```
 *
 * A worker is spawned by the producer whose `enqueue` flipped the queue
 * from `Idle` to `Draining`, and exits as soon as it observes the queue
 * empty. The next producer after that spawns a fresh one.
 */
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use super::cancel::CancelToken;
use super::http::Transport;
use super::queue::EventQueue;
use super::retry::{RetryOutcome, RetryPolicy};
use crate::config::DispatchConfig;
use crate::error::TrackerError;
use crate::protocol::types::{Event, RequestData};

// ---------------------------------------------------------------------------
// DrainContext: state shared by the dispatcher and its worker
// ---------------------------------------------------------------------------

/**
 * Everything the drain loop needs, shared by `Arc` between the
 * `Dispatcher` handle and whichever worker thread is currently running.
 */
pub struct DrainContext {
    pub queue: EventQueue,
    pub cancel: CancelToken,
    pub config: DispatchConfig,
    pub retry: RetryPolicy,
    pub transport: Arc<dyn Transport>,

    /// Number of drain loops ever started.
    pub drain_starts: AtomicUsize,
}

impl DrainContext {
    pub fn new(config: DispatchConfig, transport: Arc<dyn Transport>) -> Self {
        let retry = RetryPolicy::new(config.max_attempts, config.send_delay);
        Self {
            queue: EventQueue::new(),
            cancel: CancelToken::new(),
            config,
            retry,
            transport,
            drain_starts: AtomicUsize::new(0),
        }
    }

    /**
     * Hands a discarded batch to the drop callback. A panicking callback is
     * logged and ignored.
     */
    fn report_drop(&self, batch: &[Event], reason: &TrackerError) {
        if let Some(ref callback) = self.config.on_batch_dropped {
            let reported = panic::catch_unwind(AssertUnwindSafe(|| callback(batch, reason)));
            if reported.is_err() {
                error!(events = batch.len(), "on_batch_dropped callback panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Worker: the background thread
// ---------------------------------------------------------------------------

pub struct Worker;

impl Worker {
    /**
     * Spawns one drain thread.
     *
     * The caller must have won the `Idle → Draining` transition. On a spawn
     * failure the error is returned and the queue is left `Draining`; the
     * caller is responsible for `abandon_drain`.
     */
    pub fn spawn(ctx: Arc<DrainContext>) -> io::Result<()> {
        Self::spawn_with(thread::Builder::new().name("tracker-drain".into()), ctx)
    }

    fn spawn_with(builder: thread::Builder, ctx: Arc<DrainContext>) -> io::Result<()> {
        let worker_ctx = Arc::clone(&ctx);
        builder.spawn(move || Self::run_loop(&worker_ctx))?;

        /* Only loops that actually started are counted. */
        ctx.drain_starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /**
     * Takes batches until the queue is observed empty or shutdown is
     * requested, pausing `send_delay` after every batch.
     *
     * A panic inside the transport costs only the batch being sent; the
     * loop goes on to the next one, so it never exits with events queued.
     */
    fn run_loop(ctx: &DrainContext) {
        debug!("drain loop started");

        loop {
            if ctx.cancel.is_cancelled() {
                break;
            }

            let batch = ctx.queue.take_batch(ctx.config.batch_limit);
            if batch.is_empty() {
                break;
            }

            let delivered = panic::catch_unwind(AssertUnwindSafe(|| Self::deliver(ctx, &batch)));
            if delivered.is_err() {
                error!(events = batch.len(), "transport panicked; dropping batch");
                ctx.report_drop(&batch, &TrackerError::TransportPanicked);
            }

            if !ctx.cancel.sleep(ctx.config.send_delay) {
                break;
            }
        }

        debug!("drain loop finished");
    }

    /**
     * Delivers one batch with retries. Failures end here: they are logged
     * and reported to the drop callback, never propagated.
     */
    fn deliver(ctx: &DrainContext, batch: &[Event]) {
        if batch.is_empty() {
            return;
        }

        let (endpoint, app_id, user_id) = match ctx.config.identifiers() {
            Ok(ids) => ids,
            Err(err) => {
                error!(events = batch.len(), error = %err, "dropping batch");
                ctx.report_drop(batch, &err);
                return;
            }
        };

        let payload = RequestData {
            app_id,
            user_id,
            events: batch,
        };

        let outcome = ctx
            .retry
            .run(&ctx.cancel, |_| ctx.transport.send(endpoint, &payload));

        match outcome {
            RetryOutcome::Delivered { attempts } => {
                debug!(events = batch.len(), attempts, "batch delivered");
            }
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                error!(events = batch.len(), attempts, "all attempts to send events failed");
                let err = TrackerError::DeliveryFailed {
                    attempts,
                    last_error,
                };
                ctx.report_drop(batch, &err);
            }
            RetryOutcome::Cancelled {
                attempts,
                last_error,
            } => {
                info!(events = batch.len(), attempts, "batch abandoned on shutdown");
                let err = TrackerError::Abandoned {
                    attempts,
                    last_error,
                };
                ctx.report_drop(batch, &err);
            }
        }
    }
}
