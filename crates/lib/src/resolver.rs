//! Parameter resolver: turns an operation's formal parameter names into call
//! arguments taken from a flow message.
//!
//! The mapping is a fixed convention shared by every operation:
//!
//! | formal name | message field |
//! |---|---|
//! | `id`, `key` | `topic_id` (required) |
//! | `params` | `payload` (optional; omitted when absent) |
//! | `values` | `payload` (required) |
//! | `name`, `triggerId`, `triggerName`, `format`, `names`, `serial` | `sub_topic_id` (required) |
//! | `callback` | completion callback |

use serde_json::Value;

use crate::callback::Callback;
use crate::dispatch::DispatchError;
use crate::message::FlowMessage;

/// One resolved call argument.
#[derive(Debug)]
pub enum Argument {
    Value { name: &'static str, value: Value },
    Callback(Callback),
}

impl Argument {
    pub fn name(&self) -> &'static str {
        match self {
            Argument::Value { name, .. } => *name,
            Argument::Callback(_) => "callback",
        }
    }
}

/// Where a formal parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    TopicId,
    SubTopicId,
    Payload { required: bool },
    Callback,
    Unmapped,
}

fn source_for(param: &str) -> Source {
    match param {
        "id" | "key" => Source::TopicId,
        "params" => Source::Payload { required: false },
        "values" => Source::Payload { required: true },
        "name" | "triggerId" | "triggerName" | "format" | "names" | "serial" => Source::SubTopicId,
        "callback" => Source::Callback,
        _ => Source::Unmapped,
    }
}

/// True if the convention has a source for this parameter name.
pub fn is_mapped(param: &str) -> bool {
    source_for(param) != Source::Unmapped
}

/// Resolve every formal parameter of `operation` against `msg`.
///
/// Parameters are resolved one at a time in formal order, so the result is in
/// formal order. Absent optional parameters are left out of the result
/// entirely. The first missing required field aborts with `MissingField`.
/// Callbacks are created only once every value has resolved, so a failed
/// resolution never leaves a callback behind to fire.
pub fn resolve_parameters(
    operation: &str,
    params: &[&'static str],
    msg: &FlowMessage,
    mut make_callback: impl FnMut() -> Callback,
) -> Result<Vec<Argument>, DispatchError> {
    let slots = params
        .iter()
        .map(|param| resolve_one(operation, *param, msg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(slots
        .into_iter()
        .filter_map(|slot| match slot {
            Slot::Value(name, value) => Some(Argument::Value { name, value }),
            Slot::Callback => Some(Argument::Callback(make_callback())),
            Slot::Omitted => None,
        })
        .collect())
}

enum Slot {
    Value(&'static str, Value),
    Callback,
    Omitted,
}

fn resolve_one(
    operation: &str,
    param: &'static str,
    msg: &FlowMessage,
) -> Result<Slot, DispatchError> {
    let missing = |field: &'static str| DispatchError::MissingField {
        operation: operation.to_string(),
        field,
    };
    let value = match source_for(param) {
        Source::TopicId => text_field(&msg.topic_id).ok_or_else(|| missing("topic_id"))?,
        Source::SubTopicId => {
            text_field(&msg.sub_topic_id).ok_or_else(|| missing("sub_topic_id"))?
        }
        Source::Payload { required } => match payload_field(&msg.payload) {
            Some(v) => v,
            None if required => return Err(missing("payload")),
            None => {
                log::debug!("parameter [{}] omitted for {}", param, operation);
                return Ok(Slot::Omitted);
            }
        },
        Source::Callback => return Ok(Slot::Callback),
        Source::Unmapped => {
            log::debug!("parameter [{}] of {} has no message mapping", param, operation);
            return Ok(Slot::Omitted);
        }
    };
    log::debug!("parameter [{}] value [{}]", param, value);
    Ok(Slot::Value(param, value))
}

/// An identifier field counts as empty when unset or blank.
fn text_field(field: &Option<String>) -> Option<Value> {
    field
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| Value::String(s.to_string()))
}

/// The payload counts as empty when unset, null or an empty string.
fn payload_field(payload: &Option<Value>) -> Option<Value> {
    match payload {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(v) => Some(v.clone()),
    }
}
