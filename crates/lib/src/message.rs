//! Flow message: the unit passed between nodes of a flow.
//!
//! The dispatch fields (`topic`, `action`, `topic_id`, `sub_topic_id`) steer the
//! M2X node and are stripped before the message moves on. Every other field is
//! carried through untouched in `extra`.
//!
//! Any JSON object parses. A dispatch field of the wrong shape reads as absent,
//! so the message still reaches validation and gets its diagnostic.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fields used only to steer dispatch; removed before a message is forwarded.
pub const CONTROL_FIELDS: [&str; 4] = ["topic", "topic_id", "sub_topic_id", "action"];

const STATUS_CODE: &str = "statusCode";

/// A message flowing into or out of the node.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlowMessage {
    /// Resource namespace (e.g. "devices").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,

    /// Operation within the namespace (e.g. "view").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Primary resource identifier (device id, key, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<String>,

    /// Secondary identifier: stream name, trigger, format, serial.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_topic_id: Option<String>,

    /// Request body or query on the way in; response body on the way out.
    /// JSON null reads as absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,

    /// Anything else upstream nodes put on the message.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FlowMessage {
    pub fn new(topic: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            topic: Some(topic.into()),
            action: Some(action.into()),
            ..Self::default()
        }
    }

    pub fn with_topic_id(mut self, id: impl Into<String>) -> Self {
        self.topic_id = Some(id.into());
        self
    }

    pub fn with_sub_topic_id(mut self, id: impl Into<String>) -> Self {
        self.sub_topic_id = Some(id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Parse one message from JSON text. The text must be a JSON object.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Set the outbound status, replacing any unusable inbound `statusCode`
    /// that was carried in `extra`.
    pub fn set_status(&mut self, code: u16) {
        self.extra.remove(STATUS_CODE);
        self.status_code = Some(code);
    }

    /// Remove the dispatch fields so the next node only sees data. Idempotent.
    pub fn strip_control_fields(&mut self) {
        self.topic = None;
        self.topic_id = None;
        self.sub_topic_id = None;
        self.action = None;
    }

    pub fn has_control_fields(&self) -> bool {
        self.topic.is_some()
            || self.topic_id.is_some()
            || self.sub_topic_id.is_some()
            || self.action.is_some()
    }
}

impl<'de> Deserialize<'de> for FlowMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut extra = Map::<String, Value>::deserialize(deserializer)?;
        let [topic, topic_id, sub_topic_id, action] =
            CONTROL_FIELDS.map(|name| take_identifier(&mut extra, name));
        let payload = extra.remove("payload").filter(|v| !v.is_null());
        let status_code = take_status(&mut extra);
        Ok(Self {
            topic,
            action,
            topic_id,
            sub_topic_id,
            payload,
            status_code,
            extra,
        })
    }
}

/// Strings pass through; numbers and booleans are stringified (flows often carry
/// numeric ids). Arrays and objects cannot name anything and read as absent.
fn take_identifier(fields: &mut Map<String, Value>, name: &str) -> Option<String> {
    match fields.remove(name)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => {
            log::warn!("ignoring msg.{}: expected an identifier, got {}", name, other);
            None
        }
    }
}

/// A `statusCode` that is not a valid status number stays in `extra` as is.
fn take_status(fields: &mut Map<String, Value>) -> Option<u16> {
    let code = fields
        .get(STATUS_CODE)?
        .as_u64()
        .and_then(|n| u16::try_from(n).ok())?;
    fields.remove(STATUS_CODE);
    Some(code)
}
