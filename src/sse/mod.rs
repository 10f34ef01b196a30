//! SSE (Server-Sent Events) stream parsing for the agent protocol.
//!
//! The agent server streams `event: <kind>` / `data: <json>` lines over a
//! long-lived connection. Parsing happens in two layers:
//! - `frames` - splits raw text chunks into [`Frame`]s, buffering partial
//!   lines across chunk boundaries and tracking the sticky event kind
//! - `events` - the typed [`StreamEvent`] enum and its payload types
//! - `decoder` - turns a frame's JSON payload into a [`StreamEvent`]
//!   (failures are logged and skipped, never fatal)

mod decoder;
mod events;
mod frames;

pub use decoder::decode_frame;
pub(crate) use decoder::END_NODE;
pub use events::{
    CustomEvent, MessageChunkEvent, MetadataEvent, NodeUpdate, StreamEvent, ToolCallPayload,
};
pub use frames::{EventKind, Frame, FrameParser, END_OF_STREAM_SENTINEL};
