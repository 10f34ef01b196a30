//! Session controller: drives one streaming run at a time.
//!
//! Owns the submit/cancel lifecycle. Submitting aborts any run already in
//! flight (one active stream per session, always), publishes the user's
//! message and an empty assistant placeholder immediately, then feeds the
//! stream into the placeholder from a background task. The assistant
//! message is persisted only when its stream terminates cleanly; error
//! events and transport failures leave nothing behind but the update log
//! the UI already saw.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{SplicerClient, StreamEnvelope};
use crate::error::{ClientError, SessionError};
use crate::models::{Message, MessageMetadata, SubmitRequest, ToolCall};
use crate::sse::{CustomEvent, MessageChunkEvent, StreamEvent};
use crate::stage::{MigrationData, MigrationStage, StageOutcome};
use crate::store::MessageStore;

/// State pushes from the controller to its consumer (a UI, a logger).
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// A new message exists and should be displayed
    MessageAdded(Message),
    /// Streamed content to append to a message
    ContentDelta { message_id: String, delta: String },
    /// Reasoning text associated with the streaming message
    Thinking { message_id: String, text: String },
    /// A progress line from the agent (custom events)
    Status { message: String },
    /// A tool call was announced or resolved
    ToolCallUpdated {
        message_id: String,
        tool_call: ToolCall,
    },
    /// The migration stage or its data changed
    Stage {
        stage: MigrationStage,
        data: MigrationData,
    },
    /// The stream terminated cleanly; the final message was persisted
    Completed { message: Message },
    /// The run failed; `user_input` is returned so the caller can offer
    /// a retry without re-typing
    Failed {
        error: SessionError,
        user_input: String,
    },
}

struct ActiveStream {
    handle: JoinHandle<()>,
    /// Shared with the read loop, which fills it in once metadata arrives
    run_id: Arc<Mutex<Option<String>>>,
}

/// One conversation thread's streaming controller.
pub struct SessionController {
    client: Arc<SplicerClient>,
    store: Arc<dyn MessageStore>,
    thread_id: String,
    updates_tx: UnboundedSender<SessionUpdate>,
    active: Option<ActiveStream>,
}

impl SessionController {
    /// Create a controller and the update channel its consumer reads from.
    pub fn new(
        client: SplicerClient,
        store: Arc<dyn MessageStore>,
        thread_id: impl Into<String>,
    ) -> (Self, UnboundedReceiver<SessionUpdate>) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        (
            Self {
                client: Arc::new(client),
                store,
                thread_id: thread_id.into(),
                updates_tx,
                active: None,
            },
            updates_rx,
        )
    }

    /// True while a stream is being consumed.
    pub fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.handle.is_finished())
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Start a new run.
    ///
    /// Any stream already in flight is aborted first. The user message and
    /// an empty assistant placeholder are published before the first byte
    /// arrives so the conversation renders instantly.
    pub async fn submit(&mut self, request: SubmitRequest) {
        self.abort_active();

        let human = Message::human(&self.thread_id, &request.user_input);
        if let Err(e) = self.store.insert_message(&human).await {
            warn!(error = %e, "failed to persist user message");
        }
        let _ = self.updates_tx.send(SessionUpdate::MessageAdded(human));

        let placeholder = Message::assistant_placeholder(&self.thread_id);
        let _ = self
            .updates_tx
            .send(SessionUpdate::MessageAdded(placeholder.clone()));

        let run_id = Arc::new(Mutex::new(None));
        let worker = StreamWorker {
            client: Arc::clone(&self.client),
            store: Arc::clone(&self.store),
            updates_tx: self.updates_tx.clone(),
            thread_id: self.thread_id.clone(),
            run_id: Arc::clone(&run_id),
        };
        let handle = tokio::spawn(worker.run(request, placeholder));

        self.active = Some(ActiveStream { handle, run_id });
    }

    /// Abort the current run, if any.
    ///
    /// Deliberately silent: no update is published and no error surfaces.
    /// The remote cancellation is fire-and-forget; a failure there only
    /// shows up in debug logs.
    pub fn cancel(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        active.handle.abort();

        let run_id = active.run_id.lock().ok().and_then(|slot| slot.clone());
        if let Some(run_id) = run_id {
            let client = Arc::clone(&self.client);
            let thread_id = self.thread_id.clone();
            tokio::spawn(async move {
                match client.cancel_run(&thread_id, &run_id).await {
                    Ok(status) => debug!(?status, %run_id, "cancel request resolved"),
                    Err(e) => debug!(error = %e, %run_id, "cancel request failed"),
                }
            });
        }
    }

    fn abort_active(&mut self) {
        self.cancel();
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
        }
    }
}

/// Everything the background read loop needs, detached from the
/// controller so cancellation can just abort the task.
struct StreamWorker {
    client: Arc<SplicerClient>,
    store: Arc<dyn MessageStore>,
    updates_tx: UnboundedSender<SessionUpdate>,
    thread_id: String,
    run_id: Arc<Mutex<Option<String>>>,
}

/// Mutable per-run state folded up by the read loop.
struct RunState {
    message: Message,
    migration: MigrationData,
    raw_log: Vec<crate::sse::NodeUpdate>,
    /// Verbatim `kind: payload` line for every event, error events included
    transcript: Vec<String>,
    tool_calls: Vec<ToolCall>,
    saw_updates: bool,
}

impl StreamWorker {
    async fn run(self, request: SubmitRequest, placeholder: Message) {
        let user_input = request.user_input.clone();

        let token = match self
            .client
            .issue_stream_token(&self.thread_id, &request)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                self.fail(e, &user_input);
                return;
            }
        };

        let stream = match self.client.open_stream(&token.stream_url, &token.token).await {
            Ok(stream) => stream,
            Err(e) => {
                self.fail(e, &user_input);
                return;
            }
        };
        tokio::pin!(stream);

        let mut state = RunState {
            message: placeholder,
            migration: MigrationData::default(),
            raw_log: Vec::new(),
            transcript: Vec::new(),
            tool_calls: Vec::new(),
            saw_updates: false,
        };

        while let Some(item) = stream.next().await {
            let envelope = match item {
                Ok(envelope) => envelope,
                Err(e) => {
                    self.fail(e, &user_input);
                    return;
                }
            };
            match self.apply(&mut state, envelope) {
                LoopControl::Continue => {}
                LoopControl::Finished => break,
                LoopControl::Failed(message) => {
                    let _ = self.updates_tx.send(SessionUpdate::Failed {
                        error: SessionError::StreamFailed { message },
                        user_input,
                    });
                    return;
                }
            }
        }

        self.finalize(state, user_input).await;
    }

    /// Fold one envelope into the run state.
    fn apply(&self, state: &mut RunState, envelope: StreamEnvelope) -> LoopControl {
        state
            .transcript
            .push(format!("{}: {}", envelope.raw.kind.label(), envelope.raw.data));

        match envelope.event {
            StreamEvent::Metadata(meta) => {
                if let Some(run_id) = meta.run_id {
                    if let Ok(mut slot) = self.run_id.lock() {
                        *slot = Some(run_id);
                    }
                }
                LoopControl::Continue
            }
            StreamEvent::Updates(updates) => {
                let mut finished = false;
                for update in updates {
                    let outcome = state.migration.apply_update(&update.node, &update.payload);
                    state.raw_log.push(update);
                    state.saw_updates = true;
                    match outcome {
                        StageOutcome::Changed => {
                            let _ = self.updates_tx.send(SessionUpdate::Stage {
                                stage: state.migration.stage,
                                data: state.migration.clone(),
                            });
                        }
                        StageOutcome::Finished => {
                            let _ = self.updates_tx.send(SessionUpdate::Stage {
                                stage: state.migration.stage,
                                data: state.migration.clone(),
                            });
                            finished = true;
                        }
                        StageOutcome::Unchanged => {}
                    }
                }
                if finished {
                    LoopControl::Finished
                } else {
                    LoopControl::Continue
                }
            }
            StreamEvent::MessageChunk(chunk) => {
                self.apply_chunk(state, chunk);
                LoopControl::Continue
            }
            StreamEvent::Custom(custom) => {
                self.apply_custom(state, custom);
                LoopControl::Continue
            }
            StreamEvent::Values(snapshot) => {
                debug!(keys = ?snapshot.as_object().map(|m| m.len()), "state snapshot");
                LoopControl::Continue
            }
            StreamEvent::Error { message } => {
                // The transcript already holds the raw error frame; the
                // message itself is never persisted.
                warn!(%message, "stream raised an error event");
                LoopControl::Failed(message)
            }
            StreamEvent::End => LoopControl::Finished,
        }
    }

    fn apply_chunk(&self, state: &mut RunState, chunk: MessageChunkEvent) {
        if !chunk.content.is_empty() {
            state.message.content.push_str(&chunk.content);
            let _ = self.updates_tx.send(SessionUpdate::ContentDelta {
                message_id: state.message.id.clone(),
                delta: chunk.content,
            });
        }

        if let Some(thinking) = chunk.thinking {
            let _ = self.updates_tx.send(SessionUpdate::Thinking {
                message_id: state.message.id.clone(),
                text: thinking,
            });
        }

        for payload in chunk.tool_calls {
            let Some(id) = payload.id else { continue };
            let call = match state.tool_calls.iter_mut().find(|c| c.id == id) {
                Some(existing) => {
                    if let Some(name) = payload.name {
                        existing.name = name;
                    }
                    if payload.args.is_some() {
                        existing.arguments = payload.args;
                    }
                    existing.clone()
                }
                None => {
                    let call =
                        ToolCall::pending(id, payload.name.unwrap_or_default(), payload.args);
                    state.tool_calls.push(call.clone());
                    call
                }
            };
            let _ = self.updates_tx.send(SessionUpdate::ToolCallUpdated {
                message_id: state.message.id.clone(),
                tool_call: call,
            });
        }
    }

    fn apply_custom(&self, state: &mut RunState, custom: CustomEvent) {
        if let Some(id) = custom.tool_call_id {
            let result = custom.content.clone().unwrap_or_default();
            let is_error = custom.kind.as_deref() == Some("tool_error");
            if let Some(call) = state.tool_calls.iter_mut().find(|c| c.id == id) {
                if is_error {
                    call.fail(result);
                } else {
                    call.complete(result);
                }
                let _ = self.updates_tx.send(SessionUpdate::ToolCallUpdated {
                    message_id: state.message.id.clone(),
                    tool_call: call.clone(),
                });
            }
            return;
        }

        if let Some(thinking) = custom.thinking {
            let _ = self.updates_tx.send(SessionUpdate::Thinking {
                message_id: state.message.id.clone(),
                text: thinking,
            });
            return;
        }

        if let Some(message) = custom.message {
            let _ = self.updates_tx.send(SessionUpdate::Status { message });
        }
    }

    /// Clean termination: freeze the message, attach metadata, persist.
    async fn finalize(&self, mut state: RunState, user_input: String) {
        state.message.is_streaming = false;

        let metadata = MessageMetadata {
            tool_calls: state.tool_calls,
            migration: state.saw_updates.then(|| state.migration.clone()),
            is_migration: state.saw_updates,
            raw_log: state.raw_log,
            transcript: state.transcript,
        };
        if !metadata.is_empty() {
            state.message.metadata = Some(metadata);
        }

        if let Err(e) = self.store.insert_message(&state.message).await {
            warn!(error = %e, "failed to persist assistant message");
            let _ = self.updates_tx.send(SessionUpdate::Failed {
                error: SessionError::from(e),
                user_input,
            });
            return;
        }

        let _ = self.updates_tx.send(SessionUpdate::Completed {
            message: state.message,
        });
    }

    fn fail(&self, error: ClientError, user_input: &str) {
        warn!(error = %error, "run failed");
        let _ = self.updates_tx.send(SessionUpdate::Failed {
            error: error.into(),
            user_input: user_input.to_string(),
        });
    }
}

enum LoopControl {
    Continue,
    Finished,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplicerConfig;
    use crate::store::{InMemoryMessageStore, StoreError};
    use async_trait::async_trait;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn drain_until_terminal(
        rx: &mut UnboundedReceiver<SessionUpdate>,
    ) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        loop {
            let update = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for session updates")
                .expect("update channel closed unexpectedly");
            let terminal = matches!(
                update,
                SessionUpdate::Completed { .. } | SessionUpdate::Failed { .. }
            );
            updates.push(update);
            if terminal {
                return updates;
            }
        }
    }

    fn mock_token_response(server: &MockServer) -> serde_json::Value {
        serde_json::json!({
            "stream_url": format!("{}/stream/run", server.uri()),
            "token": "tok"
        })
    }

    #[tokio::test]
    async fn test_rate_limited_submit_fails_without_persisting_assistant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream-token"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(serde_json::json!({"error": "Too many migrations"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryMessageStore::new());
        let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
        let (mut session, mut rx) = SessionController::new(client, store.clone(), "t-1");

        session.submit(SubmitRequest::new("migrate the nav")).await;
        let updates = drain_until_terminal(&mut rx).await;

        match updates.last().unwrap() {
            SessionUpdate::Failed { error, user_input } => {
                match error {
                    SessionError::RateLimited { message } => {
                        assert!(message.contains("Too many migrations"));
                    }
                    other => panic!("Expected RateLimited, got {:?}", other),
                }
                assert_eq!(user_input, "migrate the nav");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        // only the user message was persisted
        let persisted = store.messages_for_thread("t-1").await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].role, crate::models::Role::Human);
    }

    #[tokio::test]
    async fn test_error_event_fails_run_and_persists_nothing_new() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_token_response(&server)))
            .mount(&server)
            .await;
        let body = concat!(
            "event: metadata\n",
            "data: {\"run_id\":\"r-1\"}\n",
            "event: messages\n",
            "data: [{\"content\":\"working\"},{}]\n",
            "event: error\n",
            "data: {\"error\":\"agent crashed\"}\n",
        );
        Mock::given(method("GET"))
            .and(path("/stream/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryMessageStore::new());
        let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
        let (mut session, mut rx) = SessionController::new(client, store.clone(), "t-1");

        session.submit(SubmitRequest::new("go")).await;
        let updates = drain_until_terminal(&mut rx).await;

        assert!(updates
            .iter()
            .any(|u| matches!(u, SessionUpdate::ContentDelta { delta, .. } if delta == "working")));
        match updates.last().unwrap() {
            SessionUpdate::Failed {
                error: SessionError::StreamFailed { message },
                ..
            } => assert_eq!(message, "agent crashed"),
            other => panic!("Expected StreamFailed, got {:?}", other),
        }
        // assistant message must not be persisted after an error event
        let persisted = store.messages_for_thread("t-1").await.unwrap();
        assert_eq!(persisted.len(), 1);
    }

    /// Store that rejects every insert, for exercising persist failures.
    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn insert_message(&self, _message: &Message) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }

        async fn messages_for_thread(
            &self,
            _thread_id: &str,
        ) -> Result<Vec<Message>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces_store_error_with_user_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_token_response(&server)))
            .mount(&server)
            .await;
        let body = concat!(
            "event: metadata\n",
            "data: {\"run_id\":\"r-1\"}\n",
            "event: messages\n",
            "data: [{\"content\":\"done\"},{}]\n",
            "event: end\n",
            "data: {}\n",
        );
        Mock::given(method("GET"))
            .and(path("/stream/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
        let (mut session, mut rx) =
            SessionController::new(client, Arc::new(FailingStore), "t-1");

        session.submit(SubmitRequest::new("migrate the sidebar")).await;
        let updates = drain_until_terminal(&mut rx).await;

        match updates.last().unwrap() {
            SessionUpdate::Failed { error, user_input } => {
                match error {
                    SessionError::StoreFailed { message } => {
                        assert!(message.contains("disk full"));
                    }
                    other => panic!("Expected StoreFailed, got {:?}", other),
                }
                assert_eq!(user_input, "migrate the sidebar");
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_is_silent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/stream-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_token_response(&server))
                    .set_delay(std::time::Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryMessageStore::new());
        let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
        let (mut session, mut rx) = SessionController::new(client, store, "t-1");

        session.submit(SubmitRequest::new("start something")).await;
        // the two optimistic messages
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionUpdate::MessageAdded(_)
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionUpdate::MessageAdded(_)
        ));

        session.cancel();
        assert!(!session.is_streaming());

        // no Failed, no Completed, nothing at all after cancelling
        let quiet =
            tokio::time::timeout(std::time::Duration::from_millis(200), rx.recv()).await;
        assert!(quiet.is_err(), "cancel must not publish updates");
    }
}
