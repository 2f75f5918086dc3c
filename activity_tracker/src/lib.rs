/**
 * Activity Tracker: gameplay and custom event tracking for Rust apps.
 *
 * This is the crate applications depend on. It owns the SDK lifecycle
 * (initialize → track → shutdown), the per-install user id, and the typed
 * event helpers, and delegates batching and delivery to `tracker_core`.
 *
 * # Quick start
 *
 * ```ignore
 * use activity_tracker::{FileUserIdStore, InitOptions};
 *
 * fn main() -> activity_tracker::Result<()> {
 *     activity_tracker::initialize(InitOptions::new(
 *         "https://collector.example.com/events",
 *         7,
 *         FileUserIdStore::in_dir("./data"),
 *     ))?;
 *
 *     activity_tracker::send_start_level_event(1, "beginner")?;
 *     activity_tracker::send_end_level_event(1, "beginner", true)?;
 *     activity_tracker::send_custom_event("DummyEvent", r#"{"key":"Hello world"}"#)?;
 *
 *     activity_tracker::shutdown();
 *     Ok(())
 * }
 * ```
 *
 * Applications that prefer to own the tracker can use `ActivityTracker`
 * directly instead of the process-wide functions below.
 */

mod events;
mod options;
mod tracker;
mod user_id;

use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Re-exports: the public surface area
// ---------------------------------------------------------------------------

pub use events::{COMPLETE_LEVEL, FAIL_LEVEL, FIRST_OPEN, OPEN, START_LEVEL};
pub use options::InitOptions;
pub use tracker::ActivityTracker;
pub use user_id::{FileUserIdStore, MemoryUserIdStore, UserIdStore, USER_ID_FILE};
pub use tracker_core::{
    json, DropCallback, Event, Map, RequestData, Result, TrackerError, Transport,
    TransportError, Value, SDK_VERSION,
};

// ---------------------------------------------------------------------------
// Process-wide tracker
// ---------------------------------------------------------------------------

/**
 * The tracker behind the free functions. `None` before `initialize` and
 * after `shutdown`; a shut-down SDK can be initialized again.
 *
 * Callers clone the `Arc` out and release the lock before doing any work,
 * so a `flush` waiting on the network never holds the lock that
 * `shutdown` and the `send_*` functions need.
 */
static GLOBAL_TRACKER: RwLock<Option<Arc<ActivityTracker>>> = RwLock::new(None);

fn write_slot() -> RwLockWriteGuard<'static, Option<Arc<ActivityTracker>>> {
    GLOBAL_TRACKER
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn current() -> Option<Arc<ActivityTracker>> {
    GLOBAL_TRACKER
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

fn with_tracker<T>(f: impl FnOnce(&ActivityTracker) -> Result<T>) -> Result<T> {
    match current() {
        Some(tracker) => f(&tracker),
        None => Err(TrackerError::NotInitialized),
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/**
 * Initializes the process-wide tracker.
 *
 * Calling it again while initialized is a no-op; the first options stay
 * in effect.
 */
pub fn initialize(options: InitOptions) -> Result<()> {
    let mut slot = write_slot();
    if slot.is_some() {
        tracing::debug!("initialize called on an initialized tracker; ignoring");
        return Ok(());
    }
    *slot = Some(Arc::new(ActivityTracker::initialize(options)?));
    Ok(())
}

/**
 * Shuts the process-wide tracker down, discarding unsent events.
 * Subsequent calls return `NotInitialized` until `initialize` runs again.
 */
pub fn shutdown() {
    let taken = write_slot().take();
    if let Some(tracker) = taken {
        tracker.shutdown();
    }
}

pub fn is_initialized() -> bool {
    current().is_some()
}

pub fn send_start_level_event(level_id: i64, level_name: &str) -> Result<()> {
    with_tracker(|t| t.send_start_level_event(level_id, level_name))
}

pub fn send_end_level_event(level_id: i64, level_name: &str, passed: bool) -> Result<()> {
    with_tracker(|t| t.send_end_level_event(level_id, level_name, passed))
}

pub fn send_custom_event(event_name: &str, event_data_json: &str) -> Result<()> {
    with_tracker(|t| t.send_custom_event(event_name, event_data_json))
}

pub fn track(event: Event) -> Result<()> {
    with_tracker(|t| t.track(event))
}

/**
 * Blocks until queued events are sent or dropped, up to `timeout`.
 * Returns `true` when there is nothing left to send.
 */
pub fn flush(timeout: Duration) -> bool {
    match current() {
        Some(tracker) => tracker.flush(timeout),
        None => true,
    }
}

/// The current user id, if initialized.
pub fn user_id() -> Option<String> {
    current().map(|t| t.user_id().to_string())
}
