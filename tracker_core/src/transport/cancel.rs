/**
 * Cancellation token checked by the drain worker between attempts and
 * between batches.
 *
 * Built on a crossbeam channel that never carries a message: cancelling
 * drops the only `Sender`, which disconnects the channel. A waiter parked
 * in `recv_timeout` therefore wakes immediately on shutdown instead of
 * sleeping out the full delay.
 */
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

pub struct CancelToken {
    /// `Some` until `cancel` is called.
    sender: Mutex<Option<Sender<()>>>,

    receiver: Receiver<()>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /**
     * Trips the token. Idempotent.
     */
    pub fn cancel(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /**
     * Sleeps for `delay` unless cancelled first.
     *
     * # Returns
     * `true` if the full delay elapsed, `false` if the token was (or
     * became) cancelled.
     */
    pub fn sleep(&self, delay: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        if delay.is_zero() {
            return true;
        }
        matches!(
            self.receiver.recv_timeout(delay),
            Err(RecvTimeoutError::Timeout)
        )
    }
}
