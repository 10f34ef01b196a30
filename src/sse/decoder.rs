//! Event decoder: frame payloads to typed [`StreamEvent`]s.
//!
//! Decoding is defensive throughout. A malformed payload yields a
//! [`DecodeError`] that the read loop logs and skips; an event the client
//! has no use for yields `Ok(None)`. Neither terminates the stream.

use serde_json::Value;

use crate::error::DecodeError;
use crate::sse::events::{
    CustomEvent, MessageChunkEvent, MetadataEvent, NodeUpdate, StreamEvent, ToolCallPayload,
};
use crate::sse::frames::{EventKind, Frame};

/// Sentinel node id marking the end of the pipeline graph.
pub(crate) const END_NODE: &str = "__end__";

/// Decode one frame into a stream event.
///
/// Returns `Ok(None)` for frames that carry nothing actionable (e.g. debug
/// events other than the end-of-graph task result).
pub fn decode_frame(frame: &Frame) -> Result<Option<StreamEvent>, DecodeError> {
    let value: Value =
        serde_json::from_str(&frame.data).map_err(|e| DecodeError::InvalidJson {
            kind: frame.kind.label().to_string(),
            detail: e.to_string(),
        })?;

    match frame.kind {
        EventKind::Metadata => {
            let event: MetadataEvent =
                serde_json::from_value(value).map_err(|e| DecodeError::UnexpectedShape {
                    kind: "metadata".to_string(),
                    detail: e.to_string(),
                })?;
            Ok(Some(StreamEvent::Metadata(event)))
        }
        EventKind::Updates => decode_updates(&value),
        EventKind::Messages | EventKind::MessagesTuple => decode_message_tuple(&value),
        EventKind::Custom => {
            let event: CustomEvent =
                serde_json::from_value(value).map_err(|e| DecodeError::UnexpectedShape {
                    kind: "custom".to_string(),
                    detail: e.to_string(),
                })?;
            Ok(Some(StreamEvent::Custom(event)))
        }
        EventKind::Values => Ok(Some(StreamEvent::Values(value))),
        EventKind::Debug => Ok(decode_debug(&value)),
        EventKind::Error => Ok(Some(StreamEvent::Error {
            message: error_message(&value),
        })),
        EventKind::End => Ok(Some(StreamEvent::End)),
        EventKind::Unknown => Ok(decode_unknown(&value)),
    }
}

/// `updates` payloads are `{node_id: state_delta, ...}`.
fn decode_updates(value: &Value) -> Result<Option<StreamEvent>, DecodeError> {
    let map = value.as_object().ok_or_else(|| DecodeError::UnexpectedShape {
        kind: "updates".to_string(),
        detail: "payload is not an object".to_string(),
    })?;

    let updates: Vec<NodeUpdate> = map
        .iter()
        .map(|(node, delta)| NodeUpdate::new(node.clone(), delta.clone()))
        .collect();

    if updates.is_empty() {
        return Ok(None);
    }
    Ok(Some(StreamEvent::Updates(updates)))
}

/// `messages` payloads are a 2-element `[chunk, meta]` array.
fn decode_message_tuple(value: &Value) -> Result<Option<StreamEvent>, DecodeError> {
    let chunk = match value {
        Value::Array(items) if !items.is_empty() => &items[0],
        // Some servers send the bare chunk without the metadata element
        Value::Object(_) => value,
        _ => {
            return Err(DecodeError::UnexpectedShape {
                kind: "messages".to_string(),
                detail: "expected [chunk, meta] array".to_string(),
            })
        }
    };

    let content = chunk
        .get("content")
        .or_else(|| chunk.get("text"))
        .map(flatten_content)
        .unwrap_or_default();

    let tool_calls: Vec<ToolCallPayload> = chunk
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| {
            calls
                .iter()
                .filter_map(|call| serde_json::from_value(call.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    let thinking = chunk
        .pointer("/additional_kwargs/thinking")
        .or_else(|| chunk.get("thinking"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    if content.is_empty() && tool_calls.is_empty() && thinking.is_none() {
        return Ok(None);
    }

    Ok(Some(StreamEvent::MessageChunk(MessageChunkEvent {
        content,
        tool_calls,
        thinking,
    })))
}

/// Chunk content arrives as a bare string or a list of strings / text blocks.
fn flatten_content(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.clone()),
                Value::Object(block) => block
                    .get("text")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

/// Debug events matter only as an alternate termination signal: a
/// task-result payload named after the end-of-graph node.
fn decode_debug(value: &Value) -> Option<StreamEvent> {
    let is_task_result = value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t == "task_result");
    let name = value
        .pointer("/payload/name")
        .and_then(Value::as_str)
        .unwrap_or_default();

    if is_task_result && name == END_NODE {
        Some(StreamEvent::End)
    } else {
        None
    }
}

/// Unknown kinds degrade gracefully: forward any recognizable content field
/// as display text instead of dropping the frame.
fn decode_unknown(value: &Value) -> Option<StreamEvent> {
    let content = value
        .get("content")
        .or_else(|| value.get("text"))
        .and_then(Value::as_str)?;
    if content.is_empty() {
        return None;
    }
    Some(StreamEvent::MessageChunk(MessageChunkEvent {
        content: content.to_string(),
        ..Default::default()
    }))
}

fn error_message(value: &Value) -> String {
    value
        .get("error")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .unwrap_or("unknown stream error")
        .to_string()
}
