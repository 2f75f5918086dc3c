/**
 * Initialization options for the activity tracker.
 */
use std::fmt;
use std::sync::Arc;

use tracker_core::{DropCallback, Transport, DEFAULT_BATCH_LIMIT, DEFAULT_SEND_DELAY_MS};

use crate::user_id::UserIdStore;

/**
 * Everything `ActivityTracker::initialize` needs.
 *
 * ```ignore
 * let options = activity_tracker::InitOptions {
 *     batch_limit: 50,
 *     ..InitOptions::new(
 *         "https://collector.example.com/events",
 *         7,
 *         FileUserIdStore::in_dir(data_dir),
 *     )
 * };
 * ```
 */
pub struct InitOptions {
    /// Collector URL batches are PUT to. Must not be blank.
    pub server_endpoint: String,

    pub app_id: i64,

    /// Where the per-install user id is kept.
    pub user_id_store: Arc<dyn UserIdStore>,

    /// Maximum events per request. Default: `20`.
    pub batch_limit: usize,

    /// Pause between batches and between failed attempts. Default: `500`.
    pub send_delay_ms: u64,

    /// Told about every batch the SDK gives up on.
    pub on_batch_dropped: Option<DropCallback>,

    /// Replaces the HTTP transport, e.g. to route through an existing client.
    pub transport: Option<Arc<dyn Transport>>,
}

impl InitOptions {
    pub fn new(
        server_endpoint: impl Into<String>,
        app_id: i64,
        user_id_store: impl UserIdStore + 'static,
    ) -> Self {
        Self {
            server_endpoint: server_endpoint.into(),
            app_id,
            user_id_store: Arc::new(user_id_store),
            batch_limit: DEFAULT_BATCH_LIMIT,
            send_delay_ms: DEFAULT_SEND_DELAY_MS,
            on_batch_dropped: None,
            transport: None,
        }
    }
}

impl fmt::Debug for InitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InitOptions")
            .field("server_endpoint", &self.server_endpoint)
            .field("app_id", &self.app_id)
            .field("batch_limit", &self.batch_limit)
            .field("send_delay_ms", &self.send_delay_ms)
            .field("custom_transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}
