/**
 * Core type definitions for the tracker wire protocol.
 *
 * The collector receives one `RequestData` envelope per batch:
 * { app_Id, user_id, events: [Event] }.
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Event: a single named record of telemetry data
// ---------------------------------------------------------------------------

/**
 * A named record of arbitrary key/value data.
 *
 * Serialized as:
 * ```json
 * { "name": "start_level", "data": { "level_id": 1, "level_name": "beginner" } }
 * ```
 *
 * Events are immutable once built: fields are private and there are no
 * setters, only the consuming `with` builder used during construction.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    name: String,

    #[serde(default)]
    data: Map<String, Value>,
}

impl Event {
    /**
     * Creates an event from a name and an already assembled data map.
     */
    pub fn new(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /**
     * Creates an event with no data. Chain `with` to add fields.
     *
     * ```ignore
     * let event = Event::named("start_level")
     *     .with("level_id", 1)
     *     .with("level_name", "beginner");
     * ```
     */
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }

    /**
     * Adds (or replaces) one data field, consuming and returning the event.
     */
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// RequestData: the envelope PUT to the collector
// ---------------------------------------------------------------------------

/**
 * The body of one delivery request.
 *
 * Borrows the batch instead of cloning it, since the same batch is
 * serialized again on every retry attempt.
 *
 * The `app_Id` spelling is what the collector expects and must not be
 * "fixed" to snake case.
 */
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestData<'a> {
    #[serde(rename = "app_Id")]
    pub app_id: i64,

    pub user_id: &'a str,

    pub events: &'a [Event],
}
