//! Typed events decoded from the agent stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One node-keyed delta from an `updates` event.
///
/// Appended to an ordered audit log; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// Pipeline node that produced the delta (e.g. `source_agent`)
    pub node: String,
    /// Raw state delta as sent by the server
    pub payload: Value,
    /// When the client observed the update
    pub timestamp: DateTime<Utc>,
}

impl NodeUpdate {
    pub fn new(node: impl Into<String>, payload: Value) -> Self {
        Self {
            node: node.into(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Run metadata emitted at stream start.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetadataEvent {
    /// Run identifier, needed later for cancellation
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A tool invocation observed inside a message chunk.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

/// Content extracted from a `messages` / `messages-tuple` chunk.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageChunkEvent {
    /// Appended display content
    pub content: String,
    /// Tool invocations announced in this chunk
    pub tool_calls: Vec<ToolCallPayload>,
    /// Reasoning text, if the payload exposes it
    pub thinking: Option<String>,
}

/// Free-form `custom` event, interpreted by best-effort field presence.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CustomEvent {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Progress line - servers use either `message` or `status`
    #[serde(alias = "status", default)]
    pub message: Option<String>,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

/// A decoded stream event. Ephemeral - consumed by the session read loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Run metadata, captured for later cancellation
    Metadata(MetadataEvent),
    /// One or more node-keyed state deltas
    Updates(Vec<NodeUpdate>),
    /// Streaming LLM content / tool calls / thinking
    MessageChunk(MessageChunkEvent),
    /// Free-form progress event
    Custom(CustomEvent),
    /// Full state snapshot (logged, not folded)
    Values(Value),
    /// Backend raised an error; terminal failure
    Error { message: String },
    /// Stream completed (explicit `end` event or the debug end-of-graph
    /// task result)
    End,
}
