//! Domain models shared across the client and session layers.

pub mod message;
pub mod request;
pub mod tools;

pub use message::{Message, MessageMetadata, Role};
pub use request::{
    CancelStatus, StreamInput, StreamTokenRequest, StreamTokenResponse, SubmitRequest,
};
pub use tools::{ToolCall, ToolCallState};
