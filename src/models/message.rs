//! Chat messages and their metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sse::NodeUpdate;
use crate::stage::MigrationData;

use super::tools::ToolCall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
    Tool,
}

/// Sidecar data attached to an assistant message once its stream has
/// terminated cleanly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Final migration snapshot for the run this message narrated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationData>,
    #[serde(default)]
    pub is_migration: bool,
    /// Ordered audit log of every node update observed on the stream
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_log: Vec<NodeUpdate>,
    /// Raw `kind: payload` line for every event the stream produced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<String>,
}

impl MessageMetadata {
    pub fn is_empty(&self) -> bool {
        self.tool_calls.is_empty()
            && self.migration.is_none()
            && !self.is_migration
            && self.raw_log.is_empty()
            && self.transcript.is_empty()
    }
}

/// One message in a conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
    /// True while the assistant reply is still being streamed
    #[serde(default)]
    pub is_streaming: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn human(thread_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role: Role::Human,
            content: content.into(),
            metadata: None,
            is_streaming: false,
            created_at: Utc::now(),
        }
    }

    /// Empty assistant placeholder, shown immediately while the stream
    /// fills it in.
    pub fn assistant_placeholder(thread_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            thread_id: thread_id.into(),
            role: Role::Assistant,
            content: String::new(),
            metadata: None,
            is_streaming: true,
            created_at: Utc::now(),
        }
    }
}
