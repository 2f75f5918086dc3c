/*!
 * HTTP transport layer for delivering batches to the collector.
 *
 * Uses `ureq`, a blocking HTTP client with no async runtime. The drain
 * worker is already a dedicated background thread, so blocking I/O there
 * never stalls application code.
 *
 * The `Transport` trait is the seam the dispatcher depends on; tests and
 * embedders can supply their own implementation.
 */

use std::time::Duration;

use tracing::debug;
use ureq::Agent;

use crate::error::TransportError;
use crate::protocol::constants::CONNECT_TIMEOUT;
use crate::protocol::types::RequestData;

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/**
 * Performs exactly one delivery attempt of one batch.
 *
 * Implementations report every kind of failure as an `Err`; the caller
 * decides whether to retry. They must not panic on network errors.
 */
pub trait Transport: Send + Sync {
    fn send(&self, endpoint: &str, payload: &RequestData<'_>) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/**
 * Thin wrapper around `ureq::Agent` that PUTs the JSON payload to the
 * collector endpoint.
 *
 * Only `200 OK` counts as delivered. Any other status is returned as
 * `TransportError::Status` with the response body for the log.
 */
pub struct HttpTransport {
    agent: Agent,
}

impl HttpTransport {
    /**
     * Creates a transport with a 10 s connect timeout and `request_timeout`
     * as the ceiling for a whole request.
     *
     * Connection pooling and keep-alive are handled by the agent internally.
     */
    pub fn new(request_timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_global(Some(request_timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn send(&self, endpoint: &str, payload: &RequestData<'_>) -> Result<(), TransportError> {
        let response = self.agent.put(endpoint).send_json(payload)?;

        let status = response.status().as_u16();
        if status == 200 {
            debug!(status, events = payload.events.len(), "collector accepted batch");
            return Ok(());
        }

        let body = response
            .into_body()
            .read_to_string()
            .unwrap_or_else(|_| "<unreadable body>".into());
        Err(TransportError::Status { status, body })
    }
}
