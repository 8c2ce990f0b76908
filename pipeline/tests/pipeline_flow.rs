use std::io::Write;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use toolgate_bridge::HookDispatch;
use toolgate_pipeline::PipelineHandle;
use toolgate_pipeline::RunStatus;
use toolgate_policy::HookRule;
use toolgate_policy::RuleAction;
use toolgate_policy::RuleSet;
use toolgate_protocol::Decision;
use toolgate_protocol::DecisionSource;
use toolgate_protocol::FeedEvent;
use toolgate_protocol::FeedEventKind;
use toolgate_protocol::ReplyAction;
use toolgate_protocol::RequestEnvelope;
use toolgate_protocol::RuntimeEvent;

fn event(session: &str, name: &str, payload: Value) -> RuntimeEvent {
    let envelope = RequestEnvelope::new(session.to_string(), name.to_string(), payload);
    RuntimeEvent::from_envelope(envelope).expect("valid envelope")
}

fn approve_all() -> RuleSet {
    RuleSet::new(vec![HookRule {
        id: "allow-all".to_string(),
        tool_pattern: "*".to_string(),
        action: RuleAction::Approve,
        added_by: "test".to_string(),
    }])
}

fn deny_bash() -> RuleSet {
    RuleSet::new(vec![HookRule {
        id: "deny-bash".to_string(),
        tool_pattern: "Bash".to_string(),
        action: RuleAction::Deny,
        added_by: "policy".to_string(),
    }])
}

fn kinds(feed: &[FeedEvent]) -> Vec<FeedEventKind> {
    feed.iter().map(|e| e.kind).collect()
}

#[tokio::test]
async fn startup_scenario_emits_session_run_and_tool_events_in_order() {
    let handle = PipelineHandle::default();

    let reply = handle
        .dispatch(event("sess-1", "SessionStart", json!({"source": "startup"})))
        .await;
    assert_eq!(reply.action, ReplyAction::Passthrough);

    // Bash is dangerous by name, so with no rules this queues; answer it
    // from the side so the dispatch completes.
    let pre = event(
        "sess-1",
        "PreToolUse",
        json!({"tool_name": "Bash", "tool_input": {"command": "ls"}}),
    );
    let request_id = pre.request_id.clone();
    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.dispatch(pre).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (head, trailing) = handle.permission_head().await.expect("queued item");
    assert_eq!(head.request_id, request_id);
    assert_eq!(head.tool_name, "Bash");
    assert_eq!(trailing, 0);

    let feed = handle.feed_snapshot().await;
    assert_eq!(
        kinds(&feed),
        vec![
            FeedEventKind::SessionStarted,
            FeedEventKind::RunStarted,
            FeedEventKind::ToolRequested,
            FeedEventKind::PermissionRequested,
        ]
    );
    // Session-scoped event first, then the run picks up its own counter.
    assert_eq!(feed[0].run_id, None);
    assert_eq!(feed[0].seq, 1);
    assert_eq!(feed[1].seq, 1);
    assert_eq!(feed[2].seq, 2);
    assert_eq!(feed[3].seq, 3);

    assert!(
        handle
            .respond(&request_id, Decision::allow(DecisionSource::User))
            .await
    );
    let reply = waiter.await.expect("dispatch task");
    assert_eq!(reply.action, ReplyAction::JsonOutput);
}

#[tokio::test]
async fn seq_increases_by_exactly_one_within_a_run() {
    let handle = PipelineHandle::new(approve_all());

    handle
        .dispatch(event("sess-1", "SessionStart", json!({"source": "startup"})))
        .await;
    handle
        .dispatch(event("sess-1", "UserPromptSubmit", json!({"prompt": "build it"})))
        .await;
    for i in 0..3 {
        handle
            .dispatch(event(
                "sess-1",
                "PreToolUse",
                json!({
                    "tool_name": "Read",
                    "tool_input": {"file_path": format!("/tmp/{i}")},
                    "tool_use_id": format!("toolu_{i}"),
                }),
            ))
            .await;
        handle
            .dispatch(event(
                "sess-1",
                "PostToolUse",
                json!({
                    "tool_name": "Read",
                    "tool_input": {},
                    "tool_use_id": format!("toolu_{i}"),
                }),
            ))
            .await;
    }

    let feed = handle.feed_snapshot().await;
    let run_id = feed
        .iter()
        .find_map(|e| e.run_id.clone())
        .expect("a run exists");
    let run_seqs: Vec<u64> = feed
        .iter()
        .filter(|e| e.run_id.as_ref() == Some(&run_id))
        .map(|e| e.seq)
        .collect();
    let expected: Vec<u64> = (1..=run_seqs.len() as u64).collect();
    assert_eq!(run_seqs, expected);
}

#[tokio::test]
async fn post_event_carries_parent_event_id_of_its_pre_event() {
    let handle = PipelineHandle::new(approve_all());

    handle
        .dispatch(event(
            "sess-1",
            "PreToolUse",
            json!({
                "tool_name": "Write",
                "tool_input": {"file_path": "/tmp/out"},
                "tool_use_id": "toolu_9",
            }),
        ))
        .await;
    handle
        .dispatch(event(
            "sess-1",
            "PostToolUseFailure",
            json!({
                "tool_name": "Write",
                "tool_input": {},
                "tool_use_id": "toolu_9",
                "error": "disk full",
            }),
        ))
        .await;

    let feed = handle.feed_snapshot().await;
    let pre = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::ToolRequested)
        .expect("pre event");
    let failed = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::ToolFailed)
        .expect("failure event");
    assert_eq!(failed.cause.parent_event_id.as_ref(), Some(&pre.event_id));
    assert_eq!(failed.cause.tool_use_id.as_deref(), Some("toolu_9"));

    let counters = handle
        .with(|p| p.mapper().open_run("sess-1").map(|r| r.counters))
        .await
        .expect("open run");
    assert_eq!(counters.tool_uses, 1);
    assert_eq!(counters.tool_failures, 1);
}

#[tokio::test]
async fn deny_rule_answers_permission_prompt_with_block() {
    let handle = PipelineHandle::new(deny_bash());

    let reply = handle
        .dispatch(event(
            "sess-1",
            "PermissionRequest",
            json!({"tool_name": "Bash", "tool_input": {"command": "rm -rf /"}}),
        ))
        .await;
    assert_eq!(reply.action, ReplyAction::BlockWithStderr);
    let stderr = reply.stderr.expect("stderr message");
    assert!(stderr.contains("Blocked by rule"), "stderr: {stderr}");
    assert!(stderr.contains("policy"), "stderr: {stderr}");

    let feed = handle.feed_snapshot().await;
    assert!(feed.iter().any(|e| e.kind == FeedEventKind::ToolBlocked));
}

#[tokio::test]
async fn permission_prompt_without_rule_allows_without_feed_entry() {
    let handle = PipelineHandle::default();

    let reply = handle
        .dispatch(event(
            "sess-1",
            "PermissionRequest",
            json!({"tool_name": "Bash", "tool_input": {"command": "ls"}}),
        ))
        .await;
    assert_eq!(reply.action, ReplyAction::JsonOutput);
    assert_eq!(handle.feed_snapshot().await, vec![]);
}

#[tokio::test]
async fn user_decision_resolves_queued_permission() {
    let handle = PipelineHandle::default();

    let pre = event(
        "sess-1",
        "PreToolUse",
        json!({"tool_name": "Bash", "tool_input": {"command": "cargo test"}}),
    );
    let request_id = pre.request_id.clone();
    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.dispatch(pre).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let delivered = handle
        .respond(
            &request_id,
            Decision::block(DecisionSource::User, "not on my machine").with_reason("too risky"),
        )
        .await;
    assert!(delivered);

    let reply = waiter.await.expect("dispatch task");
    assert_eq!(reply.action, ReplyAction::BlockWithStderr);

    assert_eq!(handle.permission_head().await, None);
    let feed = handle.feed_snapshot().await;
    let decision = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::PermissionDecision)
        .expect("decision event");
    assert_eq!(decision.data["verdict"], json!("deny"));
    let prompt = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::PermissionRequested)
        .expect("prompt event");
    assert_eq!(
        decision.cause.parent_event_id.as_ref(),
        Some(&prompt.event_id)
    );
}

#[tokio::test]
async fn timed_out_request_falls_back_and_ignores_late_decisions() {
    let handle = PipelineHandle::default();

    let mut pre = event(
        "sess-1",
        "PreToolUse",
        json!({"tool_name": "Bash", "tool_input": {"command": "make deploy"}}),
    );
    pre.decision_timeout = Duration::from_millis(50);
    let request_id = pre.request_id.clone();

    let reply = handle.dispatch(pre).await;
    assert_eq!(reply.action, ReplyAction::Passthrough);

    let feed = handle.feed_snapshot().await;
    let decision = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::PermissionDecision)
        .expect("timeout decision event");
    assert_eq!(decision.data["verdict"], json!("no_opinion"));
    assert_eq!(decision.data["source"], json!("timeout"));

    // The host has already received the fallback; a late decision must be
    // silently ignored.
    let events_before = feed.len();
    let delivered = handle
        .respond(&request_id, Decision::allow(DecisionSource::User))
        .await;
    assert!(!delivered);
    assert_eq!(handle.feed_snapshot().await.len(), events_before);
}

#[tokio::test]
async fn unknown_request_id_produces_no_feed_event() {
    let handle = PipelineHandle::default();
    let delivered = handle
        .respond("req-never-seen", Decision::allow(DecisionSource::User))
        .await;
    assert!(!delivered);
    assert_eq!(handle.feed_snapshot().await, vec![]);
}

#[tokio::test]
async fn actor_registration_is_idempotent() {
    let handle = PipelineHandle::default();

    for _ in 0..2 {
        handle
            .dispatch(event(
                "sess-1",
                "SubagentStart",
                json!({"agent_id": "agent-7", "agent_type": "researcher"}),
            ))
            .await;
    }

    let (actor_count, subagents) = handle
        .with(|p| {
            let run = p.mapper().open_run("sess-1").expect("open run");
            (p.mapper().actor_count(), run.actors.subagent_ids.clone())
        })
        .await;
    // agent-7 plus the session root registered on first sight.
    assert_eq!(actor_count, 2);
    assert_eq!(subagents, vec!["agent-7".to_string()]);
}

#[tokio::test]
async fn subagent_stop_enrichment_patches_the_emitted_event() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let transcript = dir.path().join("transcript.jsonl");
    let mut file = std::fs::File::create(&transcript).expect("create transcript");
    writeln!(file, r#"{{"role":"user","content":"summarize"}}"#).expect("write");
    writeln!(file, r#"{{"role":"assistant","content":"all done"}}"#).expect("write");
    drop(file);

    let handle = PipelineHandle::default();
    handle
        .dispatch(event(
            "sess-1",
            "SubagentStop",
            json!({
                "agent_id": "agent-7",
                "transcript_path": transcript.to_string_lossy(),
            }),
        ))
        .await;

    // Enrichment is fire-and-forget; give the worker a beat.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let feed = handle.feed_snapshot().await;
    let stopped = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::SubagentStopped)
        .expect("subagent stop event");
    assert_eq!(stopped.data["last_assistant_message"], json!("all done"));
    assert_eq!(stopped.data["transcript_messages"], json!(2));
}

#[tokio::test]
async fn unreadable_transcript_attaches_an_error_marker() {
    let handle = PipelineHandle::default();
    handle
        .dispatch(event(
            "sess-1",
            "SubagentStop",
            json!({
                "agent_id": "agent-7",
                "transcript_path": "/definitely/missing.jsonl",
            }),
        ))
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let feed = handle.feed_snapshot().await;
    let stopped = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::SubagentStopped)
        .expect("subagent stop event");
    assert!(stopped.data.get("enrichment_error").is_some());
}

#[tokio::test]
async fn session_end_closes_the_run_before_its_own_event() {
    let handle = PipelineHandle::new(approve_all());

    handle
        .dispatch(event("sess-1", "SessionStart", json!({"source": "startup"})))
        .await;
    handle
        .dispatch(event(
            "sess-1",
            "PreToolUse",
            json!({"tool_name": "Read", "tool_input": {"file_path": "/tmp/x"}}),
        ))
        .await;
    handle
        .dispatch(event("sess-1", "SessionEnd", json!({"reason": "exit"})))
        .await;

    let feed = handle.feed_snapshot().await;
    let all = kinds(&feed);
    assert_eq!(
        all,
        vec![
            FeedEventKind::SessionStarted,
            FeedEventKind::RunStarted,
            FeedEventKind::ToolRequested,
            FeedEventKind::RunClosed,
            FeedEventKind::SessionEnded,
        ]
    );

    let (ended_at, runs) = handle
        .with(|p| {
            (
                p.mapper().session("sess-1").and_then(|s| s.ended_at),
                p.mapper().closed_runs("sess-1").to_vec(),
            )
        })
        .await;
    assert!(ended_at.is_some());
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn new_prompt_force_closes_the_previous_run() {
    let handle = PipelineHandle::new(approve_all());

    handle
        .dispatch(event("sess-1", "UserPromptSubmit", json!({"prompt": "first"})))
        .await;
    handle
        .dispatch(event("sess-1", "UserPromptSubmit", json!({"prompt": "second"})))
        .await;

    let feed = handle.feed_snapshot().await;
    assert_eq!(
        kinds(&feed),
        vec![
            FeedEventKind::RunStarted,
            FeedEventKind::PromptSubmitted,
            FeedEventKind::RunClosed,
            FeedEventKind::RunStarted,
            FeedEventKind::PromptSubmitted,
        ]
    );

    let run_ids: Vec<&String> = feed.iter().filter_map(|e| e.run_id.as_ref()).collect();
    assert_ne!(run_ids.first(), run_ids.last());

    let closed = handle
        .with(|p| p.mapper().closed_runs("sess-1").to_vec())
        .await;
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].status, RunStatus::Completed);
}

#[tokio::test]
async fn question_notification_queues_and_records_the_answer() {
    let handle = PipelineHandle::default();

    let mut notification = event(
        "sess-1",
        "Notification",
        json!({"message": "[question] apply the migration?"}),
    );
    notification.decision_timeout = Duration::from_secs(5);
    let request_id = notification.request_id.clone();
    let waiter = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.dispatch(notification).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (head, _) = handle.question_head().await.expect("queued question");
    assert_eq!(head.request_id, request_id);

    handle
        .respond(
            &request_id,
            Decision {
                verdict: toolgate_protocol::Verdict::Json {
                    body: json!({"answer": "yes"}),
                },
                source: DecisionSource::User,
                intent: None,
            },
        )
        .await;
    let reply = waiter.await.expect("dispatch task");
    assert_eq!(reply.action, ReplyAction::JsonOutput);

    let feed = handle.feed_snapshot().await;
    assert!(feed.iter().any(|e| e.kind == FeedEventKind::QuestionAsked));
    let answered = feed
        .iter()
        .find(|e| e.kind == FeedEventKind::QuestionAnswered)
        .expect("answer event");
    assert_eq!(answered.data["verdict"], json!("allow"));
}

#[tokio::test]
async fn rules_are_consulted_fresh_on_every_dispatch() {
    let handle = PipelineHandle::default();

    let first = handle
        .dispatch(event(
            "sess-1",
            "PermissionRequest",
            json!({"tool_name": "Bash", "tool_input": {"command": "ls"}}),
        ))
        .await;
    assert_eq!(first.action, ReplyAction::JsonOutput);

    handle
        .add_rule(HookRule {
            id: "deny-bash".to_string(),
            tool_pattern: "Bash".to_string(),
            action: RuleAction::Deny,
            added_by: "policy".to_string(),
        })
        .await;

    let second = handle
        .dispatch(event(
            "sess-1",
            "PermissionRequest",
            json!({"tool_name": "Bash", "tool_input": {"command": "ls"}}),
        ))
        .await;
    assert_eq!(second.action, ReplyAction::BlockWithStderr);
}

#[tokio::test]
async fn unknown_hooks_map_to_the_catch_all_kind() {
    let handle = PipelineHandle::default();
    let reply = handle
        .dispatch(event("sess-1", "BrandNewHook", json!({"payload": 42})))
        .await;
    assert_eq!(reply.action, ReplyAction::Passthrough);

    let feed = handle.feed_snapshot().await;
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, FeedEventKind::UnknownHook);
    assert_eq!(feed[0].raw, Some(json!({"payload": 42})));
}
