/**
 * Bounded, fixed-delay retry for one batch.
 *
 * The delay does not grow between attempts and an exhausted batch is simply
 * reported back; there is no backoff curve and no dead-letter storage.
 */
use std::time::Duration;

use tracing::{debug, warn};

use super::cancel::CancelToken;
use crate::error::TransportError;

/**
 * How a batch fared under the policy.
 */
#[derive(Debug)]
pub enum RetryOutcome {
    /// An attempt succeeded. `attempts` counts the successful one.
    Delivered { attempts: u32 },

    /// Every allowed attempt failed. `last_error` is `None` only when
    /// `max_attempts` is zero.
    Exhausted {
        attempts: u32,
        last_error: Option<TransportError>,
    },

    /// Shutdown interrupted the wait between failed attempts.
    Cancelled {
        attempts: u32,
        last_error: Option<TransportError>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /**
     * Runs `attempt` until it succeeds, `max_attempts` is reached, or
     * `cancel` trips.
     *
     * The closure receives the zero-based attempt number. A batch that was
     * taken before shutdown still gets its first attempt; cancellation only
     * interrupts the wait between attempts, so later attempts are skipped.
     */
    pub fn run<F>(&self, cancel: &CancelToken, mut attempt: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Result<(), TransportError>,
    {
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_attempts {
            debug!(attempt = attempts, "sending batch");
            match attempt(attempts) {
                Ok(()) => {
                    return RetryOutcome::Delivered {
                        attempts: attempts + 1,
                    };
                }
                Err(err) => {
                    attempts += 1;
                    warn!(attempt = attempts, error = %err, "delivery attempt failed");
                    last_error = Some(err);
                }
            }

            if attempts < self.max_attempts && !cancel.sleep(self.delay) {
                return RetryOutcome::Cancelled {
                    attempts,
                    last_error,
                };
            }
        }

        RetryOutcome::Exhausted {
            attempts,
            last_error,
        }
    }
}
