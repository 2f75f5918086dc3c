/**
 * The SDK entry point: validates options, resolves the user id, owns the
 * dispatcher, and turns gameplay calls into events.
 *
 * Every public method checks the initialized state first and returns
 * `TrackerError::NotInitialized` once `shutdown` has been called.
 */
use std::time::Duration;

use tracing::info;
use tracker_core::{Dispatcher, Event, Options, Result, TrackerError, SDK_VERSION};
use uuid::Uuid;

use crate::events;
use crate::options::InitOptions;
use crate::user_id::UserIdStore;

pub struct ActivityTracker {
    dispatcher: Dispatcher,
    user_id: String,
}

impl ActivityTracker {
    /**
     * Initializes a tracker and sends the `first_open` / `open` event.
     *
     * # Steps
     * 1. Validate the endpoint and batch limit.
     * 2. Load the user id, or create and persist a new UUID.
     * 3. Build the dispatcher (HTTP unless `options.transport` is set).
     * 4. Submit the open event.
     *
     * # Returns
     * `Err(TrackerError::ConfigError)` for invalid options, or
     * `Err(TrackerError::UserId)` if the store cannot be read or written.
     */
    pub fn initialize(options: InitOptions) -> Result<Self> {
        if options.server_endpoint.trim().is_empty() {
            return Err(TrackerError::ConfigError(
                "server_endpoint must not be empty".into(),
            ));
        }
        if options.batch_limit == 0 {
            return Err(TrackerError::ConfigError(
                "batch_limit must be a positive integer".into(),
            ));
        }

        let (user_id, is_new_user) = resolve_user_id(options.user_id_store.as_ref())?;

        let core_options = Options {
            server_endpoint: options.server_endpoint,
            app_id: Some(options.app_id),
            user_id: Some(user_id.clone()),
            batch_limit: options.batch_limit,
            send_delay_ms: options.send_delay_ms,
            on_batch_dropped: options.on_batch_dropped,
            ..Default::default()
        };

        let dispatcher = match options.transport {
            Some(transport) => Dispatcher::with_transport(core_options, transport)?,
            None => Dispatcher::new(core_options)?,
        };

        let tracker = Self {
            dispatcher,
            user_id,
        };
        tracker.dispatcher.submit(events::open(is_new_user))?;

        info!(
            app_id = options.app_id,
            new_user = is_new_user,
            version = SDK_VERSION,
            "activity tracker initialized"
        );
        Ok(tracker)
    }

    pub fn send_start_level_event(&self, level_id: i64, level_name: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.dispatcher.submit(events::start_level(level_id, level_name))
    }

    /// Sends `complete_level` if `passed`, otherwise `fail_level`.
    pub fn send_end_level_event(
        &self,
        level_id: i64,
        level_name: &str,
        passed: bool,
    ) -> Result<()> {
        self.ensure_initialized()?;
        self.dispatcher
            .submit(events::end_level(level_id, level_name, passed))
    }

    /**
     * Sends an event whose data is given as a JSON object string.
     *
     * Malformed JSON does not fail the call; the event is sent with empty
     * data and a warning is logged.
     */
    pub fn send_custom_event(&self, event_name: &str, event_data_json: &str) -> Result<()> {
        self.ensure_initialized()?;
        self.dispatcher
            .submit(events::custom(event_name, event_data_json))
    }

    /// Sends a pre-built event.
    pub fn track(&self, event: Event) -> Result<()> {
        self.ensure_initialized()?;
        self.dispatcher.submit(event)
    }

    /**
     * Waits for queued events to be sent (or dropped), up to `timeout`.
     *
     * # Returns
     * `true` if the queue drained in time.
     */
    pub fn flush(&self, timeout: Duration) -> bool {
        self.dispatcher.flush(timeout)
    }

    /**
     * Stops the tracker. Events not yet sent are discarded; later calls
     * fail with `NotInitialized`.
     */
    pub fn shutdown(&self) {
        if self.is_initialized() {
            info!("activity tracker shutting down");
        }
        self.dispatcher.shutdown();
    }

    pub fn is_initialized(&self) -> bool {
        !self.dispatcher.is_closed()
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Number of events queued but not yet taken into a batch.
    pub fn pending_events(&self) -> usize {
        self.dispatcher.pending()
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(TrackerError::NotInitialized)
        }
    }
}

/**
 * Returns the stored user id, or creates, persists and returns a new one.
 * The flag is `true` when the id was created now.
 */
fn resolve_user_id(store: &dyn UserIdStore) -> Result<(String, bool)> {
    if let Some(existing) = store.load().map_err(TrackerError::UserId)? {
        return Ok((existing, false));
    }

    let user_id = Uuid::new_v4().to_string();
    store.store(&user_id).map_err(TrackerError::UserId)?;
    Ok((user_id, true))
}
