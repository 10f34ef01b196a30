//! End-to-end test: token issuance, SSE stream consumption, stage
//! tracking, and persistence through the session controller.

use std::sync::Arc;
use std::time::Duration;

use splicer::client::SplicerClient;
use splicer::config::SplicerConfig;
use splicer::models::{Role, SubmitRequest, ToolCallState};
use splicer::session::{SessionController, SessionUpdate};
use splicer::stage::MigrationStage;
use splicer::store::{InMemoryMessageStore, MessageStore};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn drain_until_terminal(rx: &mut UnboundedReceiver<SessionUpdate>) -> Vec<SessionUpdate> {
    let mut updates = Vec::new();
    loop {
        let update = tokio::time::timeout(Duration::from_secs(5), rx.recv())
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

/// A full migration run: metadata, streamed content with a tool call and
/// its result, one update per pipeline node, and the end sentinel.
fn full_run_body() -> String {
    concat!(
        "event: metadata\n",
        "data: {\"run_id\":\"run-42\",\"thread_id\":\"t-1\"}\n",
        "event: updates\n",
        "data: {\"splicer_setup\":{}}\n",
        "event: messages\n",
        "data: [{\"content\":\"Planning the migration. \"},{\"langgraph_node\":\"planner_api\"}]\n",
        "event: updates\n",
        "data: {\"planner_api\":{\"end_goal\":\"move the carousel\",\"source_exploration\":[\"find Carousel.tsx\"]}}\n",
        "event: messages\n",
        "data: [{\"content\":\"\",\"tool_calls\":[{\"id\":\"call-1\",\"name\":\"copy_file\",\"args\":{\"path\":\"src/Carousel.tsx\"}}]},{}]\n",
        "event: custom\n",
        "data: {\"type\":\"tool_result\",\"tool_call_id\":\"call-1\",\"content\":\"copied 1 file\"}\n",
        "event: updates\n",
        "data: {\"source_agent\":{\"source_summary\":[\"found the carousel\"],\"source_metadata\":{\"framework\":\"react\"}}}\n",
        "event: updates\n",
        "data: {\"target_agent\":{\"target_summary\":[\"next.js app router\"]}}\n",
        "event: updates\n",
        "data: {\"paster_agent\":{\"pasted_files\":[{\"path\":\"components/Carousel.tsx\",\"status\":\"created\"}]}}\n",
        "event: updates\n",
        "data: {\"integrator_agent\":{\"integration_summary\":\"wired into the home page\",\"changeset\":[\"app/page.tsx\"]}}\n",
        "event: updates\n",
        "data: {\"check_node\":{\"check_output\":{\"passed\":true,\"errors\":[],\"checks_performed\":[\"files_exist\"]}}}\n",
        "event: messages\n",
        "data: [{\"content\":\"Migration finished.\"},{}]\n",
        "event: updates\n",
        "data: {\"clean_up\":{}}\n",
        "event: updates\n",
        "data: {\"__end__\":{}}\n",
    )
    .to_string()
}

async fn mount_run(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/stream-token"))
        .and(body_partial_json(serde_json::json!({
            "assistant_id": "splicer",
            "stream_mode": ["messages", "updates"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "stream_url": format!("{}/stream/run-42", server.uri()),
            "token": "stream-token-1"
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/stream/run-42"))
        .and(header("authorization", "Bearer stream-token-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_migration_run() {
    splicer::logging::init();
    let server = MockServer::start().await;
    mount_run(&server, full_run_body()).await;

    let store = Arc::new(InMemoryMessageStore::new());
    let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
    let (mut session, mut rx) = SessionController::new(client, store.clone(), "t-1");

    session
        .submit(
            SubmitRequest::new("move the carousel to the new site")
                .with_repos("git@host:old.git", "git@host:new.git"),
        )
        .await;
    let updates = drain_until_terminal(&mut rx).await;

    // optimistic messages come first: the user's, then the placeholder
    match (&updates[0], &updates[1]) {
        (SessionUpdate::MessageAdded(human), SessionUpdate::MessageAdded(assistant)) => {
            assert_eq!(human.role, Role::Human);
            assert_eq!(human.content, "move the carousel to the new site");
            assert_eq!(assistant.role, Role::Assistant);
            assert!(assistant.is_streaming);
        }
        other => panic!("Expected two MessageAdded updates, got {:?}", other),
    }

    // stage progression in stream order
    let stages: Vec<MigrationStage> = updates
        .iter()
        .filter_map(|u| match u {
            SessionUpdate::Stage { stage, .. } => Some(*stage),
            _ => None,
        })
        .collect();
    // source_agent publishes a second Analyzing (its data changed while
    // the stage held), and the end sentinel repeats Complete
    assert_eq!(
        stages,
        vec![
            MigrationStage::Planning,
            MigrationStage::Analyzing,
            MigrationStage::Analyzing,
            MigrationStage::Pasting,
            MigrationStage::Integrating,
            MigrationStage::Checking,
            MigrationStage::Cleanup,
            MigrationStage::Complete,
            MigrationStage::Complete,
        ]
    );

    // the tool call went pending then completed
    let tool_states: Vec<ToolCallState> = updates
        .iter()
        .filter_map(|u| match u {
            SessionUpdate::ToolCallUpdated { tool_call, .. } => Some(tool_call.state),
            _ => None,
        })
        .collect();
    assert_eq!(tool_states, vec![ToolCallState::Pending, ToolCallState::Completed]);

    // clean termination persisted the finished assistant message
    let completed = match updates.last().unwrap() {
        SessionUpdate::Completed { message } => message,
        other => panic!("Expected Completed, got {:?}", other),
    };
    assert_eq!(completed.content, "Planning the migration. Migration finished.");
    assert!(!completed.is_streaming);

    let metadata = completed.metadata.as_ref().expect("metadata attached");
    assert!(metadata.is_migration);
    let migration = metadata.migration.as_ref().expect("migration snapshot");
    assert_eq!(migration.stage, MigrationStage::Complete);
    assert!(migration.finished);
    assert_eq!(
        migration.planner.as_ref().unwrap().end_goal,
        "move the carousel"
    );
    assert_eq!(
        migration.paster.as_ref().unwrap().pasted_files[0].path,
        "components/Carousel.tsx"
    );
    assert!(migration.checker.as_ref().unwrap().passed);

    // every node update is in the audit log, in order, end sentinel included
    let logged: Vec<&str> = metadata.raw_log.iter().map(|u| u.node.as_str()).collect();
    assert_eq!(
        logged,
        vec![
            "splicer_setup",
            "planner_api",
            "source_agent",
            "target_agent",
            "paster_agent",
            "integrator_agent",
            "check_node",
            "clean_up",
            "__end__",
        ]
    );

    // the transcript holds a verbatim line for every event on the stream
    assert_eq!(metadata.transcript.len(), 14);
    assert!(metadata.transcript[0].starts_with("metadata: "));
    assert!(metadata
        .transcript
        .iter()
        .any(|line| line.starts_with("custom: ")));
    assert!(metadata
        .transcript
        .iter()
        .any(|line| line.starts_with("updates: ") && line.contains("planner_api")));

    // store holds the human message and the persisted assistant message
    let persisted = store.messages_for_thread("t-1").await.unwrap();
    assert_eq!(persisted.len(), 2);
    assert_eq!(persisted[1].role, Role::Assistant);
    assert_eq!(persisted[1].content, completed.content);
}

#[tokio::test]
async fn test_plain_chat_run_without_pipeline() {
    let server = MockServer::start().await;
    let body = concat!(
        "event: metadata\n",
        "data: {\"run_id\":\"run-42\"}\n",
        "event: messages\n",
        "data: [{\"content\":\"Hello! \"},{}]\n",
        "event: messages\n",
        "data: [{\"content\":\"Which repos should I look at?\"},{}]\n",
        "event: end\n",
        "data: {}\n",
    )
    .to_string();
    mount_run(&server, body).await;

    let store = Arc::new(InMemoryMessageStore::new());
    let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
    let (mut session, mut rx) = SessionController::new(client, store.clone(), "t-1");

    session.submit(SubmitRequest::new("hi")).await;
    let updates = drain_until_terminal(&mut rx).await;

    assert!(updates
        .iter()
        .all(|u| !matches!(u, SessionUpdate::Stage { .. })));

    let completed = match updates.last().unwrap() {
        SessionUpdate::Completed { message } => message,
        other => panic!("Expected Completed, got {:?}", other),
    };
    assert_eq!(completed.content, "Hello! Which repos should I look at?");
    // no pipeline ran, so no migration metadata
    assert!(completed
        .metadata
        .as_ref()
        .map_or(true, |m| !m.is_migration));
}

#[tokio::test]
async fn test_resubmit_aborts_previous_stream() {
    let server = MockServer::start().await;
    // first run hangs on the token request; second completes normally
    Mock::given(method("POST"))
        .and(path("/stream-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({
                    "stream_url": format!("{}/stream/run-42", server.uri()),
                    "token": "stream-token-1"
                }))
                .set_delay(Duration::from_secs(30)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryMessageStore::new());
    let client = SplicerClient::new(SplicerConfig::with_base_url(&server.uri()));
    let (mut session, mut rx) = SessionController::new(client, store, "t-1");

    session.submit(SubmitRequest::new("first attempt")).await;
    assert!(session.is_streaming());

    // drop the hanging run and replace the mock with a fast one
    server.reset().await;
    mount_run(
        &server,
        concat!(
            "event: metadata\n",
            "data: {\"run_id\":\"run-42\"}\n",
            "event: messages\n",
            "data: [{\"content\":\"second\"},{}]\n",
            "event: end\n",
            "data: {}\n",
        )
        .to_string(),
    )
    .await;

    session.submit(SubmitRequest::new("second attempt")).await;
    let updates = drain_until_terminal(&mut rx).await;

    // the first run never produced a terminal update of its own
    let terminals = updates
        .iter()
        .filter(|u| matches!(u, SessionUpdate::Completed { .. } | SessionUpdate::Failed { .. }))
        .count();
    assert_eq!(terminals, 1);
    match updates.last().unwrap() {
        SessionUpdate::Completed { message } => assert_eq!(message.content, "second"),
        other => panic!("Expected Completed, got {:?}", other),
    }
}
