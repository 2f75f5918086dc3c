/**
 * Constructors for the events the SDK sends on the caller's behalf.
 */
use serde_json::{Map, Value};
use tracing::warn;
use tracker_core::{Event, SDK_VERSION};

pub const FIRST_OPEN: &str = "first_open";
pub const OPEN: &str = "open";
pub const START_LEVEL: &str = "start_level";
pub const COMPLETE_LEVEL: &str = "complete_level";
pub const FAIL_LEVEL: &str = "fail_level";

/// Sent once per `initialize`; `first_open` when the user id was just created.
pub fn open(is_new_user: bool) -> Event {
    let name = if is_new_user { FIRST_OPEN } else { OPEN };
    Event::named(name).with("version", SDK_VERSION)
}

pub fn start_level(level_id: i64, level_name: &str) -> Event {
    Event::named(START_LEVEL)
        .with("level_id", level_id)
        .with("level_name", level_name)
}

pub fn end_level(level_id: i64, level_name: &str, passed: bool) -> Event {
    let name = if passed { COMPLETE_LEVEL } else { FAIL_LEVEL };
    Event::named(name)
        .with("level_id", level_id)
        .with("level_name", level_name)
}

pub fn custom(name: &str, data_json: &str) -> Event {
    Event::new(name, json_to_map(data_json))
}

/**
 * Parses a JSON object into event data.
 *
 * Lenient on purpose: malformed input or a non-object value yields an
 * empty map, so a bad payload still records that the event happened.
 */
pub fn json_to_map(data_json: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(data_json) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "event data is not a JSON object; sending empty data");
            Map::new()
        }
        Err(err) => {
            warn!(error = %err, "event data is not valid JSON; sending empty data");
            Map::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
