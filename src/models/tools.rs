//! Tool call tracking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a tool call observed on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallState {
    /// Announced in a message chunk, no result yet
    #[default]
    Pending,
    Completed,
    Error,
}

/// A tool invocation made by the agent, correlated with its eventual
/// result by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub state: ToolCallState,
}

impl ToolCall {
    pub fn pending(id: impl Into<String>, name: impl Into<String>, arguments: Option<Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            result: None,
            state: ToolCallState::Pending,
        }
    }

    /// Record the result delivered by a later custom event.
    pub fn complete(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.state = ToolCallState::Completed;
    }

    pub fn fail(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.state = ToolCallState::Error;
    }

    pub fn is_pending(&self) -> bool {
        self.state == ToolCallState::Pending
    }
}
