/**
 * The in-memory event queue shared between producers and the drain worker.
 *
 * One `Mutex` guards both the pending events and the `DispatcherState`, so
 * every decision about starting or stopping the drain loop is made in the
 * same critical section that observes the queue contents:
 *
 * - `enqueue` appends and flips `Idle → Draining` together; exactly one
 *   caller is told to start a loop.
 * - `take_batch` returning empty flips `Draining → Idle` together; an event
 *   pushed after that point starts a fresh loop, an event pushed before it
 *   is picked up by the current one.
 *
 * A `Condvar` is notified whenever the loop goes idle so `wait_idle` can
 * block a flushing caller, the same Mutex + Condvar pairing as a flush
 * signal.
 */
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::protocol::types::Event;

// ---------------------------------------------------------------------------
// DispatcherState
// ---------------------------------------------------------------------------

/**
 * Lifecycle of the drain loop.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// No loop is running.
    Idle,

    /// Exactly one loop is pulling batches.
    Draining,

    /// Terminal: the queue was shut down and rejects new events.
    Closed,
}

/**
 * What `enqueue` tells the caller to do next.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The event is queued and the caller owns starting the drain loop.
    StartDrain,

    /// The event is queued and a running loop will pick it up.
    Queued,

    /// The queue is closed; the event was not stored.
    Rejected,
}

// ---------------------------------------------------------------------------
// EventQueue
// ---------------------------------------------------------------------------

struct Inner {
    events: VecDeque<Event>,
    state: DispatcherState,
}

pub struct EventQueue {
    inner: Mutex<Inner>,
    idle: Condvar,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                state: DispatcherState::Idle,
            }),
            idle: Condvar::new(),
        }
    }

    /**
     * Locks the queue. A poisoned lock is recovered: every mutation below
     * leaves `Inner` consistent, so a panic elsewhere cannot corrupt it.
     */
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /**
     * Appends an event to the tail.
     *
     * Returns `StartDrain` to exactly one caller per `Idle → Draining`
     * transition; that caller must start the loop or call `abandon_drain`.
     */
    pub fn enqueue(&self, event: Event) -> Admission {
        let mut inner = self.lock();
        match inner.state {
            DispatcherState::Closed => Admission::Rejected,
            DispatcherState::Draining => {
                inner.events.push_back(event);
                Admission::Queued
            }
            DispatcherState::Idle => {
                inner.events.push_back(event);
                inner.state = DispatcherState::Draining;
                Admission::StartDrain
            }
        }
    }

    /**
     * Removes and returns up to `limit` events from the head, oldest first.
     *
     * An empty result means the loop must exit: the state has already been
     * moved to `Idle` (or was `Closed`) under the same lock.
     */
    pub fn take_batch(&self, limit: usize) -> Vec<Event> {
        let mut inner = self.lock();
        if inner.state == DispatcherState::Closed {
            return Vec::new();
        }

        let count = limit.min(inner.events.len());
        let batch: Vec<Event> = inner.events.drain(..count).collect();

        if batch.is_empty() && inner.state == DispatcherState::Draining {
            inner.state = DispatcherState::Idle;
            self.idle.notify_all();
        }

        batch
    }

    /**
     * Drops every event not yet taken. Batches already handed to the
     * worker are unaffected.
     */
    pub fn clear(&self) {
        self.lock().events.clear();
    }

    /**
     * Clears the queue and enters the terminal `Closed` state.
     *
     * Returns the number of events discarded.
     */
    pub fn close(&self) -> usize {
        let mut inner = self.lock();
        let discarded = inner.events.len();
        inner.events.clear();
        inner.state = DispatcherState::Closed;
        self.idle.notify_all();
        discarded
    }

    /**
     * Returns a `Draining` queue to `Idle` without touching its events.
     *
     * Used when the loop could not be spawned, so the next `enqueue` gets
     * another chance to start one.
     */
    pub fn abandon_drain(&self) {
        let mut inner = self.lock();
        if inner.state == DispatcherState::Draining {
            inner.state = DispatcherState::Idle;
            self.idle.notify_all();
        }
    }

    /**
     * Blocks until no loop is draining, or `timeout` elapses.
     *
     * # Returns
     * `true` if the queue went idle (or closed) in time.
     */
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let result = self
            .idle
            .wait_timeout_while(guard, timeout, |inner| {
                inner.state == DispatcherState::Draining
            });

        match result {
            Ok((_, timeout_result)) => !timeout_result.timed_out(),
            Err(poisoned) => !poisoned.into_inner().1.timed_out(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.lock().state
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }
}
