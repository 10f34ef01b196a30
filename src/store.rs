//! Message persistence.
//!
//! The session controller only persists through this trait, so the backing
//! store (remote API, local database, memory) is a deployment choice. The
//! in-memory store backs tests and offline use.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::models::Message;

/// Errors surfaced by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Durable home for finished messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;
    async fn messages_for_thread(&self, thread_id: &str) -> Result<Vec<Message>, StoreError>;
}

/// Vec-backed store.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .push(message.clone());
        Ok(())
    }

    async fn messages_for_thread(&self, thread_id: &str) -> Result<Vec<Message>, StoreError> {
        let messages = self
            .messages
            .lock()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }
}
