use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use toolgate_bridge::ForwardOutcome;
use toolgate_bridge::HookDispatch;
use toolgate_bridge::HookServer;
use toolgate_bridge::forward_hook;
use toolgate_bridge::socket_path_for;
use toolgate_protocol::ReplyPayload;
use toolgate_protocol::RuntimeEvent;

struct BlockBash;

impl HookDispatch for BlockBash {
    async fn dispatch(&self, event: RuntimeEvent) -> ReplyPayload {
        match event.payload.tool_name() {
            Some("Bash") => ReplyPayload::block("Blocked by rule deny-bash (policy)"),
            Some(_) => ReplyPayload::json_output(serde_json::json!({"decision": "approve"})),
            None => ReplyPayload::passthrough(),
        }
    }
}

struct Stall;

impl HookDispatch for Stall {
    async fn dispatch(&self, _event: RuntimeEvent) -> ReplyPayload {
        tokio::time::sleep(Duration::from_secs(5)).await;
        ReplyPayload::passthrough()
    }
}

fn start_server<D: HookDispatch>(project_dir: &Path, dispatch: D) {
    let server = HookServer::bind(&socket_path_for(project_dir)).expect("bind socket");
    tokio::spawn(async move {
        let _ = server.run(Arc::new(dispatch)).await;
    });
}

#[tokio::test]
async fn deny_rule_round_trip_blocks_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    start_server(dir.path(), BlockBash);

    let doc = r#"{
        "session_id": "sess-1",
        "hook_event_name": "PreToolUse",
        "tool_name": "Bash",
        "tool_input": {"command": "rm -rf /"}
    }"#;
    let outcome = forward_hook(doc, dir.path()).await;
    match &outcome {
        ForwardOutcome::Block { stderr } => {
            assert!(stderr.contains("Blocked by rule"), "stderr: {stderr}");
            assert!(stderr.contains("policy"), "stderr: {stderr}");
        }
        other => panic!("expected block, got {other:?}"),
    }
    assert_eq!(outcome.exit_code(), 2);
}

#[tokio::test]
async fn allow_round_trip_returns_json_output() {
    let dir = tempfile::tempdir().unwrap();
    start_server(dir.path(), BlockBash);

    let doc = r#"{
        "session_id": "sess-1",
        "hook_event_name": "PreToolUse",
        "tool_name": "Read",
        "tool_input": {"file_path": "/tmp/x"}
    }"#;
    let outcome = forward_hook(doc, dir.path()).await;
    match outcome {
        ForwardOutcome::JsonOutput { stdout_json } => {
            assert_eq!(stdout_json["decision"], serde_json::json!("approve"));
        }
        other => panic!("expected json output, got {other:?}"),
    }
}

#[tokio::test]
async fn stalled_server_degrades_to_passthrough() {
    let dir = tempfile::tempdir().unwrap();
    start_server(dir.path(), Stall);

    let doc = r#"{"session_id": "sess-1", "hook_event_name": "Stop"}"#;
    let started = std::time::Instant::now();
    let outcome = forward_hook(doc, dir.path()).await;
    assert_eq!(outcome, ForwardOutcome::Passthrough);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn malformed_envelope_is_dropped_without_a_reply() {
    let dir = tempfile::tempdir().unwrap();
    start_server(dir.path(), BlockBash);

    let mut stream = UnixStream::connect(socket_path_for(dir.path()))
        .await
        .expect("connect");
    stream
        .write_all(b"this is not an envelope\n")
        .await
        .expect("write");

    let mut buf = Vec::new();
    let n = stream.read_to_end(&mut buf).await.expect("read");
    assert_eq!(n, 0, "server must close without replying");
}

#[tokio::test]
async fn unknown_hook_names_still_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    start_server(dir.path(), BlockBash);

    let doc = r#"{"session_id": "sess-1", "hook_event_name": "BrandNewHook"}"#;
    let outcome = forward_hook(doc, dir.path()).await;
    assert_eq!(outcome, ForwardOutcome::Passthrough);
}
