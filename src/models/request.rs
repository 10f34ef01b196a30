//! Request and response bodies for the token and cancellation endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What the caller wants to run: the user's input plus the repos to
/// migrate between.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubmitRequest {
    pub user_input: String,
    pub source_repo: Option<String>,
    pub target_repo: Option<String>,
    pub branch: Option<String>,
}

impl SubmitRequest {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            ..Self::default()
        }
    }

    pub fn with_repos(
        mut self,
        source_repo: impl Into<String>,
        target_repo: impl Into<String>,
    ) -> Self {
        self.source_repo = Some(source_repo.into());
        self.target_repo = Some(target_repo.into());
        self
    }
}

/// Graph input section of the token request.
#[derive(Debug, Clone, Serialize)]
pub struct StreamInput {
    pub messages: Vec<Value>,
    pub user_input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// Body posted to the stream-token endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StreamTokenRequest {
    pub assistant_id: String,
    pub input: StreamInput,
    pub config: Value,
    pub stream_mode: Vec<String>,
}

impl StreamTokenRequest {
    pub fn new(assistant_id: impl Into<String>, thread_id: &str, request: &SubmitRequest) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            input: StreamInput {
                messages: vec![json!({"role": "human", "content": request.user_input})],
                user_input: request.user_input.clone(),
                source_repo: request.source_repo.clone(),
                target_repo: request.target_repo.clone(),
                branch: request.branch.clone(),
            },
            config: json!({"configurable": {"thread_id": thread_id}}),
            stream_mode: vec!["messages".to_string(), "updates".to_string()],
        }
    }
}

/// Token endpoint response: where to connect and with what bearer.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamTokenResponse {
    pub stream_url: String,
    pub token: String,
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStatus {
    /// The run was interrupted
    Cancelled,
    /// The run had already finished or never existed
    NotFound,
}
