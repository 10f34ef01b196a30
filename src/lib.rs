//! Splicer stream client - consumes the migration agent's SSE stream
//!
//! This library exposes the streaming event client and the pipeline-stage
//! state machine for the Splicer code-migration agent, plus the session
//! controller that ties them together.

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod logging;
pub mod models;
pub mod session;
pub mod sse;
pub mod stage;
pub mod store;
pub mod typing;
