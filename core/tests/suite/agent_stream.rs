use std::sync::Mutex;

use core_test_support::load_default_config_for_test;
use core_test_support::ndjson_body;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wangr_core::AgentClient;
use wangr_core::LocalToolExecutor;
use wangr_core::PendingResolver;
use wangr_core::StreamingContinuation;
use wangr_core::error::WangrErr;
use wangr_core::protocol::AgentEvent;
use wangr_core::protocol::ChatRequest;
use wangr_core::protocol::ContinueRequest;
use wangr_core::protocol::ToolOutput;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::body_json;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;

fn ndjson_response(events: &[serde_json::Value]) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/x-ndjson")
        .set_body_raw(ndjson_body(events), "application/x-ndjson")
}

fn chat_request(message: &str) -> ChatRequest {
    ChatRequest {
        message: message.to_string(),
        history: Vec::new(),
    }
}

#[tokio::test]
async fn chat_streams_text_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({"message": "hello", "history": []})))
        .respond_with(ndjson_response(&[
            json!({"type": "status", "message": "Thinking"}),
            json!({"type": "status", "message": "Upstream returned 502 Server Error"}),
            json!({"type": "text_start"}),
            json!({"type": "text_delta", "content": "Hi "}),
            json!({"type": "text_delta", "content": "there"}),
            json!({"type": "text_end"}),
            json!({"type": "done", "duration": 0.4, "tool_calls": []}),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config =
        load_default_config_for_test(&home, &workspace, Some(format!("{}/chat", server.uri())));
    let client = AgentClient::new(&config).unwrap();

    let mut events = Vec::new();
    let outcome = client
        .chat(&chat_request("hello"), |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(outcome.text, "Hi there");
    assert_eq!(outcome.pending, None);
    assert!(events.contains(&AgentEvent::Status {
        message: "Thinking".to_string()
    }));
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, AgentEvent::Status { message } if message.contains("502")))
    );
}

#[tokio::test]
async fn pending_batch_ends_the_stream_and_malformed_lines_are_skipped() {
    let server = MockServer::start().await;
    let body = format!(
        "{}not json at all\n\n{}{}",
        ndjson_body(&[json!({"type": "tool_start", "name": "apply_patch"})]),
        ndjson_body(&[json!({
            "type": "pending_file_ops",
            "id": "p1",
            "operations": [{"type": "apply_patch", "call_id": "c1",
                            "operation": {"type": "create_file", "path": "a.txt", "diff": "+a"}}]
        })]),
        ndjson_body(&[json!({"type": "text", "content": "never seen"})]),
    );
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config =
        load_default_config_for_test(&home, &workspace, Some(format!("{}/chat", server.uri())));
    let client = AgentClient::new(&config).unwrap();

    let mut events = Vec::new();
    let outcome = client
        .chat(&chat_request("make a file"), |event| events.push(event))
        .await
        .unwrap();

    assert_eq!(
        events,
        vec![AgentEvent::ToolStart {
            name: "apply_patch".to_string()
        }]
    );
    assert_eq!(outcome.text, "");
    let pending = outcome.pending.unwrap();
    assert_eq!(pending.id.as_deref(), Some("p1"));
    assert_eq!(pending.entries.len(), 1);
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config =
        load_default_config_for_test(&home, &workspace, Some(format!("{}/chat", server.uri())));
    let client = AgentClient::new(&config).unwrap();

    let err = client
        .chat(&chat_request("hello"), |_| {})
        .await
        .unwrap_err();

    match err {
        WangrErr::UnexpectedStatus(status, body) => {
            assert_eq!(status.as_u16(), 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn approved_batch_is_continued_through_the_agent() {
    let server = MockServer::start().await;
    let expected = ContinueRequest {
        pending_id: "p1".to_string(),
        tool_outputs: vec![ToolOutput::completed(
            Some("c1".to_string()),
            "Created notes.txt",
        )],
    };
    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ndjson_response(&[json!({
            "type": "pending_file_ops",
            "id": "p1",
            "operations": [{"type": "apply_patch", "call_id": "c1",
                            "operation": {"type": "create_file", "path": "notes.txt", "diff": "+hi"}}]
        })]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/continue"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(serde_json::to_value(&expected).unwrap()))
        .respond_with(ndjson_response(&[
            json!({"type": "text", "content": "Created your notes."}),
            json!({"type": "done", "duration": 1.0, "tool_calls": []}),
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let home = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let config =
        load_default_config_for_test(&home, &workspace, Some(format!("{}/chat", server.uri())));
    let client = AgentClient::new(&config).unwrap();

    let outcome = client
        .chat(&chat_request("save hi to notes.txt"), |_| {})
        .await
        .unwrap();
    let pending = outcome.pending.unwrap();

    let forwarded = Mutex::new(Vec::new());
    let continuation = StreamingContinuation::new(&client, |event| {
        forwarded.lock().unwrap().push(event);
    });
    let resolver = PendingResolver::new(LocalToolExecutor::new(workspace.path()));
    let resolution = resolver
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap();

    assert_eq!(resolution.response_text, "Created your notes.");
    assert_eq!(resolution.next_pending, None);
    assert!(resolution.auto_approve_chain);
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("notes.txt")).unwrap(),
        "hi"
    );
    assert_eq!(forwarded.lock().unwrap().len(), 2);
}
