//! Frame parsing and creation-event detection
//!
//! The feed has accumulated several payload shapes over time. A frame is
//! first parsed into JSON (or rejected as unparseable), then classified. For
//! creation events the object that actually carries the token fields is
//! selected:
//!
//! | shape                                      | token fields taken from |
//! |--------------------------------------------|-------------------------|
//! | `type`/`method`/`txType` == `"create"`     | root                    |
//! | `data.type` == `"create"`                  | `data`                  |
//! | `tokenData` object wrapper                 | `tokenData`             |
//! | `method` == `"subscribeNewToken"` + `data` | root                    |
//! | bare `mint`+`creator` or `token`+`user`    | root                    |

use serde_json::{Map, Value};

use tokenfeed_core::{FeedError, FeedResult, SUBSCRIBE_NEW_TOKEN};

pub const CREATE_MARKER: &str = "create";

const MARKER_KEYS: [&str; 3] = ["type", "method", "txType"];

/// What a parsed frame turned out to be
#[derive(Debug, PartialEq)]
pub enum FrameKind<'a> {
    /// A token creation event; the map holds the token fields
    Creation(&'a Map<String, Value>),
    /// Server acknowledgement of the subscribe command
    Acknowledgement(&'a str),
    /// Anything else (trades, pings, unknown shapes)
    Other,
}

/// Parse raw frame text into JSON
pub fn parse_frame(text: &str) -> FeedResult<Value> {
    serde_json::from_str(text).map_err(|e| FeedError::InvalidMessage(e.to_string()))
}

/// Classify a parsed frame and select the object carrying token fields
pub fn classify_frame(frame: &Value) -> FrameKind<'_> {
    let Some(root) = frame.as_object() else {
        return FrameKind::Other;
    };

    if has_create_marker(root) {
        return FrameKind::Creation(root);
    }

    if let Some(data) = root.get("data").and_then(Value::as_object) {
        if is_create(data.get("type")) {
            return FrameKind::Creation(data);
        }
    }

    if let Some(wrapper) = root.get("tokenData") {
        if let Some(token_data) = wrapper.as_object() {
            return FrameKind::Creation(token_data);
        }
        // a scalar wrapper carries no token fields
        if is_truthy(wrapper) {
            return FrameKind::Other;
        }
    }

    let subscribe_echo = root.get("method").and_then(Value::as_str) == Some(SUBSCRIBE_NEW_TOKEN)
        && root.get("data").map(is_truthy).unwrap_or(false);
    let mint_pair = has_truthy(root, "mint") && has_truthy(root, "creator");
    let token_pair = has_truthy(root, "token") && has_truthy(root, "user");

    if subscribe_echo || mint_pair || token_pair {
        return FrameKind::Creation(root);
    }

    if let Some(message) = root.get("message").and_then(Value::as_str) {
        return FrameKind::Acknowledgement(message);
    }

    FrameKind::Other
}

fn has_create_marker(obj: &Map<String, Value>) -> bool {
    MARKER_KEYS.iter().any(|key| is_create(obj.get(*key)))
}

fn is_create(value: Option<&Value>) -> bool {
    value.and_then(Value::as_str) == Some(CREATE_MARKER)
}

fn has_truthy(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map(is_truthy).unwrap_or(false)
}

/// Loose truthiness used across the upstream shapes: null, false, zero and
/// empty strings count as absent.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0 && !v.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
