use std::collections::HashMap;
use std::path::PathBuf;

use serde_json::Value;
use serde_json::json;
use toolgate_protocol::Cause;
use toolgate_protocol::Decision;
use toolgate_protocol::DecisionSource;
use toolgate_protocol::EventLevel;
use toolgate_protocol::FeedEvent;
use toolgate_protocol::FeedEventKind;
use toolgate_protocol::HookPayload;
use toolgate_protocol::RuntimeEvent;
use toolgate_protocol::Verdict;
use toolgate_protocol::new_id;
use tracing::debug;

use crate::dispatch::Disposition;
use crate::enrichment::Followup;
use crate::enrichment::TranscriptSummary;
use crate::model::Actor;
use crate::model::ActorKind;
use crate::model::Run;
use crate::model::RunActors;
use crate::model::RunCounters;
use crate::model::RunStatus;
use crate::model::Session;
use crate::model::Trigger;
use crate::model::TriggerKind;

const PROMPT_PREVIEW_LEN: usize = 80;

/// Actor id for decisions made by a human.
const USER_ACTOR: &str = "user";
/// Actor id for rule- and timeout-sourced decisions.
const SYSTEM_ACTOR: &str = "system";

fn root_actor_id(session_id: &str) -> String {
    format!("{session_id}:root")
}

#[derive(Debug)]
struct RunState {
    run: Run,
    seq: u64,
    /// tool_use_id → pre-event id; at most one unresolved entry per id,
    /// cleared whenever a run (re)opens.
    tool_corr: HashMap<String, String>,
}

#[derive(Debug)]
struct SessionState {
    session: Session,
    /// Counter for events emitted outside any run.
    seq: u64,
    run_counter: u64,
    open_run: Option<RunState>,
    closed_runs: Vec<Run>,
    transcript_path: Option<PathBuf>,
}

/// Consumes the validated event stream plus decisions and emits the
/// canonical, replayable feed.
///
/// All session/run/sequence/correlation state lives here, owned by the one
/// pipeline instance constructed per process; nothing is module-level.
#[derive(Debug, Default)]
pub struct FeedMapper {
    feed: Vec<FeedEvent>,
    index: HashMap<String, usize>,
    sessions: HashMap<String, SessionState>,
    active_session: Option<String>,
    actors: HashMap<String, Actor>,
    /// request id → (prompt feed event id, prompt kind); consumed when the
    /// matching decision arrives.
    decision_map: HashMap<String, (String, FeedEventKind)>,
}

impl FeedMapper {
    /// Map one dispatched hook into zero or more feed events. Returns the
    /// fire-and-forget work discovered along the way.
    pub fn apply(&mut self, event: &RuntimeEvent, disposition: &Disposition) -> Vec<Followup> {
        let mut followups = Vec::new();
        match &event.payload {
            HookPayload::SessionStart {
                source,
                model,
                agent_type,
                cwd: _,
                transcript_path,
            } => {
                self.start_session(
                    event,
                    source,
                    model.clone(),
                    agent_type.clone(),
                    transcript_path.clone(),
                );
                if source == "resume" {
                    self.open_new_run(
                        event,
                        Trigger {
                            kind: TriggerKind::Resume,
                            prompt_preview: None,
                        },
                    );
                }
            }
            HookPayload::UserPromptSubmit { prompt } => {
                self.ensure_session(event);
                self.close_open_run(&event.session_id, RunStatus::Completed, event);
                self.open_new_run(
                    event,
                    Trigger {
                        kind: TriggerKind::Prompt,
                        prompt_preview: Some(preview(prompt)),
                    },
                );
                self.emit_in_run(
                    event,
                    FeedEventKind::PromptSubmitted,
                    EventLevel::Info,
                    USER_ACTOR.to_string(),
                    "prompt submitted".to_string(),
                    json!({"prompt": prompt}),
                );
            }
            HookPayload::PreToolUse {
                tool_name,
                tool_input,
                tool_use_id,
            } => {
                if *disposition == Disposition::QuestionQueued {
                    self.surface_question(event, tool_input.get("question"));
                } else {
                    self.surface_pre_tool(event, disposition, tool_name, tool_input, tool_use_id);
                }
            }
            HookPayload::PermissionRequest { tool_name, .. } => match disposition {
                Disposition::PromptDenied { rule_id, added_by } => {
                    self.ensure_session(event);
                    self.ensure_run(event);
                    let id = self.emit_in_run(
                        event,
                        FeedEventKind::ToolBlocked,
                        EventLevel::Warn,
                        SYSTEM_ACTOR.to_string(),
                        format!("blocked: {tool_name}"),
                        json!({"rule": rule_id, "added_by": added_by}),
                    );
                    debug!("permission prompt denied by rule {rule_id}: {id}");
                    self.bump_counters(&event.session_id, |c| c.blocks += 1);
                }
                // Auto-allowed prompts deliberately leave no feed entry; the
                // pre-tool stage will surface the same tool use.
                _ => self.note_session(event),
            },
            HookPayload::PostToolUse {
                tool_name,
                tool_use_id,
                tool_response,
                ..
            } => {
                self.surface_post_tool(
                    event,
                    FeedEventKind::ToolCompleted,
                    EventLevel::Info,
                    tool_name,
                    tool_use_id,
                    json!({"tool_name": tool_name, "tool_response": tool_response}),
                );
            }
            HookPayload::PostToolUseFailure {
                tool_name,
                tool_use_id,
                error,
                ..
            } => {
                self.surface_post_tool(
                    event,
                    FeedEventKind::ToolFailed,
                    EventLevel::Error,
                    tool_name,
                    tool_use_id,
                    json!({"tool_name": tool_name, "error": error}),
                );
                self.bump_counters(&event.session_id, |c| c.tool_failures += 1);
            }
            HookPayload::SubagentStart {
                agent_id,
                agent_type,
            } => {
                self.ensure_session(event);
                self.ensure_run(event);
                self.register_actor(Actor {
                    actor_id: agent_id.clone(),
                    kind: ActorKind::Subagent,
                    agent_type: agent_type.clone(),
                });
                self.track_subagent(&event.session_id, agent_id);
                self.emit_in_run(
                    event,
                    FeedEventKind::SubagentStarted,
                    EventLevel::Info,
                    agent_id.clone(),
                    format!("subagent started: {agent_id}"),
                    json!({"agent_type": agent_type}),
                );
            }
            HookPayload::SubagentStop {
                agent_id,
                agent_type,
                transcript_path,
            } => {
                self.ensure_session(event);
                self.ensure_run(event);
                self.register_actor(Actor {
                    actor_id: agent_id.clone(),
                    kind: ActorKind::Subagent,
                    agent_type: agent_type.clone(),
                });
                let id = self.emit_in_run(
                    event,
                    FeedEventKind::SubagentStopped,
                    EventLevel::Info,
                    agent_id.clone(),
                    format!("subagent stopped: {agent_id}"),
                    json!({"agent_type": agent_type}),
                );
                if let Some(path) = transcript_path {
                    followups.push(Followup::EnrichFromTranscript {
                        event_id: id,
                        path: PathBuf::from(path),
                    });
                }
            }
            HookPayload::Stop { stop_hook_active } => {
                self.ensure_session(event);
                self.emit_scoped(
                    event,
                    FeedEventKind::AgentStopped,
                    EventLevel::Info,
                    root_actor_id(&event.session_id),
                    "agent stopped".to_string(),
                    json!({"stop_hook_active": stop_hook_active}),
                );
            }
            HookPayload::PreCompact { trigger } => {
                self.ensure_session(event);
                self.emit_scoped(
                    event,
                    FeedEventKind::Compaction,
                    EventLevel::Info,
                    root_actor_id(&event.session_id),
                    "context compaction".to_string(),
                    json!({"trigger": trigger}),
                );
            }
            HookPayload::SessionEnd { reason } => {
                self.ensure_session(event);
                let status = match reason.as_deref() {
                    Some(r) if r.contains("abort") => RunStatus::Aborted,
                    _ => RunStatus::Completed,
                };
                // Run-close first, then the hook's own event.
                self.close_open_run(&event.session_id, status, event);
                let id = self.emit_scoped(
                    event,
                    FeedEventKind::SessionEnded,
                    EventLevel::Info,
                    root_actor_id(&event.session_id),
                    "session ended".to_string(),
                    json!({"reason": reason}),
                );
                if let Some(state) = self.sessions.get_mut(&event.session_id) {
                    state.session.ended_at = Some(event.ts);
                    if let Some(path) = state.transcript_path.clone() {
                        followups.push(Followup::EnrichFromTranscript {
                            event_id: id,
                            path,
                        });
                    }
                }
                if self.active_session.as_deref() == Some(&event.session_id) {
                    self.active_session = None;
                }
            }
            HookPayload::Notification { message } => {
                if *disposition == Disposition::QuestionQueued {
                    self.surface_question(event, message.as_deref().map(Value::from).as_ref());
                } else {
                    self.ensure_session(event);
                    self.emit_scoped(
                        event,
                        FeedEventKind::Notification,
                        EventLevel::Info,
                        root_actor_id(&event.session_id),
                        "notification".to_string(),
                        json!({"message": message}),
                    );
                }
            }
            HookPayload::Setup {} => {
                self.ensure_session(event);
                self.emit_scoped(
                    event,
                    FeedEventKind::Setup,
                    EventLevel::Info,
                    root_actor_id(&event.session_id),
                    "setup".to_string(),
                    json!({}),
                );
            }
            HookPayload::Other { raw } => {
                self.ensure_session(event);
                self.emit_raw(
                    event,
                    FeedEventKind::UnknownHook,
                    EventLevel::Info,
                    root_actor_id(&event.session_id),
                    format!("unknown hook: {}", event.name.as_str()),
                    json!({}),
                    Some(raw.clone()),
                );
            }
        }
        followups
    }

    fn surface_pre_tool(
        &mut self,
        event: &RuntimeEvent,
        disposition: &Disposition,
        tool_name: &str,
        tool_input: &Value,
        tool_use_id: &Option<String>,
    ) {
        self.ensure_session(event);
        self.ensure_run(event);

        let risk = toolgate_policy::risk_tier_for(tool_name, tool_input);
        let mut data = json!({
            "tool_name": tool_name,
            "tool_input": tool_input,
            "risk": risk.as_str(),
        });
        match disposition {
            Disposition::RuleApproved { rule_id } => {
                data["decision"] = json!("allow");
                data["rule"] = json!(rule_id);
            }
            Disposition::SafeAllowed => {
                data["decision"] = json!("allow");
                data["auto_allowed"] = json!(true);
            }
            _ => {}
        }

        let pre_id = self.emit_in_run(
            event,
            FeedEventKind::ToolRequested,
            EventLevel::Info,
            root_actor_id(&event.session_id),
            tool_name.to_string(),
            data,
        );
        if let Some(tool_use_id) = tool_use_id {
            if let Some(run) = self.open_run_mut(&event.session_id) {
                run.tool_corr.insert(tool_use_id.clone(), pre_id.clone());
            }
        }
        self.bump_counters(&event.session_id, |c| c.tool_uses += 1);

        match disposition {
            Disposition::RuleDenied { rule_id, added_by } => {
                self.emit_in_run(
                    event,
                    FeedEventKind::ToolBlocked,
                    EventLevel::Warn,
                    SYSTEM_ACTOR.to_string(),
                    format!("blocked: {tool_name}"),
                    json!({"rule": rule_id, "added_by": added_by}),
                );
                self.bump_counters(&event.session_id, |c| c.blocks += 1);
            }
            Disposition::PermissionQueued => {
                let prompt_id = self.emit_in_run(
                    event,
                    FeedEventKind::PermissionRequested,
                    EventLevel::Warn,
                    root_actor_id(&event.session_id),
                    format!("permission required: {tool_name}"),
                    json!({"tool_name": tool_name, "risk": risk.as_str()}),
                );
                self.decision_map.insert(
                    event.request_id.clone(),
                    (prompt_id, FeedEventKind::PermissionRequested),
                );
                self.bump_counters(&event.session_id, |c| c.permission_requests += 1);
            }
            _ => {}
        }
    }

    fn surface_post_tool(
        &mut self,
        event: &RuntimeEvent,
        kind: FeedEventKind,
        level: EventLevel,
        tool_name: &str,
        tool_use_id: &Option<String>,
        data: Value,
    ) {
        self.ensure_session(event);
        self.ensure_run(event);
        let parent_event_id = tool_use_id.as_ref().and_then(|id| {
            self.open_run_mut(&event.session_id)
                .and_then(|run| run.tool_corr.remove(id))
        });
        let cause = Cause {
            hook_request_id: event.request_id.clone(),
            tool_use_id: tool_use_id.clone(),
            parent_event_id,
        };
        self.emit_with_cause(
            event,
            Scope::Run,
            kind,
            level,
            root_actor_id(&event.session_id),
            cause,
            tool_name.to_string(),
            data,
            None,
        );
    }

    fn surface_question(&mut self, event: &RuntimeEvent, question: Option<&Value>) {
        self.ensure_session(event);
        let id = self.emit_scoped(
            event,
            FeedEventKind::QuestionAsked,
            EventLevel::Warn,
            root_actor_id(&event.session_id),
            "question for the user".to_string(),
            json!({"question": question}),
        );
        self.decision_map
            .insert(event.request_id.clone(), (id, FeedEventKind::QuestionAsked));
    }

    /// Turn a later decision into a decision-kind feed event correlated to
    /// its prompt. Unknown request ids produce nothing.
    pub fn record_decision(&mut self, request_id: &str, decision: &Decision) -> Option<String> {
        let (prompt_id, prompt_kind) = self.decision_map.remove(request_id)?;
        let (session_id, run_id) = {
            let prompt = self.index.get(&prompt_id).map(|idx| &self.feed[*idx])?;
            (prompt.session_id.clone(), prompt.run_id.clone())
        };

        let kind = if prompt_kind == FeedEventKind::QuestionAsked {
            FeedEventKind::QuestionAnswered
        } else {
            FeedEventKind::PermissionDecision
        };
        let verdict = if decision.is_no_opinion() {
            "no_opinion"
        } else if matches!(decision.verdict, Verdict::Block { .. }) {
            "deny"
        } else {
            "allow"
        };
        let actor = match decision.source {
            DecisionSource::User => USER_ACTOR,
            DecisionSource::Rule | DecisionSource::Timeout => SYSTEM_ACTOR,
        };
        let mut data = json!({"verdict": verdict, "source": decision.source});
        if let Some(intent) = &decision.intent {
            data["reason"] = json!(intent.reason);
        }
        if let Verdict::Block { reason } = &decision.verdict {
            data["reason"] = json!(reason);
        }

        // Emit into the prompt's run while it is still the open one,
        // otherwise fall back to the session scope.
        let in_prompt_run = run_id.is_some()
            && self
                .sessions
                .get(&session_id)
                .and_then(|s| s.open_run.as_ref())
                .map(|r| Some(&r.run.run_id) == run_id.as_ref())
                .unwrap_or(false);

        let cause = Cause {
            hook_request_id: request_id.to_string(),
            tool_use_id: None,
            parent_event_id: Some(prompt_id),
        };
        let id = self.emit_to(
            &session_id,
            if in_prompt_run { Scope::Run } else { Scope::Session },
            kind,
            EventLevel::Info,
            actor.to_string(),
            cause,
            format!("decision: {verdict}"),
            data,
            None,
        );
        if verdict == "deny" {
            self.bump_counters(&session_id, |c| c.blocks += 1);
        }
        id
    }

    /// Patch an already-emitted event with enrichment output. Only `data`
    /// may change; identity fields stay immutable.
    pub fn apply_enrichment(
        &mut self,
        event_id: &str,
        result: Result<TranscriptSummary, String>,
    ) {
        let Some(idx) = self.index.get(event_id).copied() else {
            debug!("enrichment target {event_id} no longer known");
            return;
        };
        let Some(data) = self.feed[idx].data.as_object_mut() else {
            return;
        };
        match result {
            Ok(summary) => {
                data.insert("transcript_messages".to_string(), json!(summary.message_count));
                if let Some(text) = summary.last_assistant_message {
                    data.insert("last_assistant_message".to_string(), json!(text));
                }
            }
            Err(message) => {
                data.insert("enrichment_error".to_string(), json!(message));
            }
        }
    }

    // ---- session / run state ------------------------------------------------

    fn start_session(
        &mut self,
        event: &RuntimeEvent,
        source: &str,
        model: Option<String>,
        agent_type: Option<String>,
        transcript_path: Option<String>,
    ) {
        let state = self
            .sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionState {
                session: Session {
                    session_id: event.session_id.clone(),
                    started_at: event.ts,
                    ended_at: None,
                    source: source.to_string(),
                    model: None,
                    agent_type: None,
                },
                seq: 0,
                run_counter: 0,
                open_run: None,
                closed_runs: Vec::new(),
                transcript_path: None,
            });
        state.session.ended_at = None;
        state.session.source = source.to_string();
        if model.is_some() {
            state.session.model = model;
        }
        if agent_type.is_some() {
            state.session.agent_type = agent_type;
        }
        if let Some(path) = transcript_path {
            state.transcript_path = Some(PathBuf::from(path));
        }
        self.active_session = Some(event.session_id.clone());
        let root_agent_type = state.session.agent_type.clone();
        self.register_actor(Actor {
            actor_id: root_actor_id(&event.session_id),
            kind: ActorKind::Root,
            agent_type: root_agent_type,
        });
        self.emit_scoped(
            event,
            FeedEventKind::SessionStarted,
            EventLevel::Info,
            root_actor_id(&event.session_id),
            format!("session started ({source})"),
            json!({"source": source}),
        );
    }

    /// Capture the active session id without emitting anything; used for
    /// events that arrive before any SessionStart was seen.
    fn note_session(&mut self, event: &RuntimeEvent) {
        self.sessions
            .entry(event.session_id.clone())
            .or_insert_with(|| SessionState {
                session: Session {
                    session_id: event.session_id.clone(),
                    started_at: event.ts,
                    ended_at: None,
                    source: "unknown".to_string(),
                    model: None,
                    agent_type: None,
                },
                seq: 0,
                run_counter: 0,
                open_run: None,
                closed_runs: Vec::new(),
                transcript_path: None,
            });
        self.active_session = Some(event.session_id.clone());
        self.register_actor(Actor {
            actor_id: root_actor_id(&event.session_id),
            kind: ActorKind::Root,
            agent_type: None,
        });
    }

    fn ensure_session(&mut self, event: &RuntimeEvent) {
        self.note_session(event);
    }

    fn ensure_run(&mut self, event: &RuntimeEvent) {
        let has_open = self
            .sessions
            .get(&event.session_id)
            .is_some_and(|s| s.open_run.is_some());
        if !has_open {
            self.open_new_run(
                event,
                Trigger {
                    kind: TriggerKind::Implicit,
                    prompt_preview: None,
                },
            );
        }
    }

    fn open_new_run(&mut self, event: &RuntimeEvent, trigger: Trigger) {
        // An explicit trigger while a run is open force-closes it first.
        self.close_open_run(&event.session_id, RunStatus::Completed, event);

        let session_id = event.session_id.clone();
        let run_id = {
            let Some(state) = self.sessions.get_mut(&session_id) else {
                return;
            };
            state.run_counter += 1;
            let run_id = format!("{session_id}#{n}", n = state.run_counter);
            state.open_run = Some(RunState {
                run: Run {
                    run_id: run_id.clone(),
                    session_id: session_id.clone(),
                    started_at: event.ts,
                    ended_at: None,
                    trigger: trigger.clone(),
                    status: RunStatus::Running,
                    actors: RunActors {
                        root_agent_id: root_actor_id(&session_id),
                        subagent_ids: Vec::new(),
                    },
                    counters: RunCounters::default(),
                },
                seq: 0,
                tool_corr: HashMap::new(),
            });
            run_id
        };
        self.emit_to(
            &session_id,
            Scope::Run,
            FeedEventKind::RunStarted,
            EventLevel::Info,
            root_actor_id(&session_id),
            Cause {
                hook_request_id: event.request_id.clone(),
                ..Default::default()
            },
            "run started".to_string(),
            json!({"run_id": run_id, "trigger": trigger}),
            None,
        );
    }

    fn close_open_run(&mut self, session_id: &str, status: RunStatus, event: &RuntimeEvent) {
        let is_open = self
            .sessions
            .get(session_id)
            .is_some_and(|s| s.open_run.is_some());
        if !is_open {
            return;
        }
        // The close event is the run's last, so emit it before retiring the
        // run state.
        self.emit_to(
            session_id,
            Scope::Run,
            FeedEventKind::RunClosed,
            EventLevel::Info,
            root_actor_id(session_id),
            Cause {
                hook_request_id: event.request_id.clone(),
                ..Default::default()
            },
            "run closed".to_string(),
            json!({"status": status}),
            None,
        );
        if let Some(state) = self.sessions.get_mut(session_id) {
            if let Some(mut run_state) = state.open_run.take() {
                run_state.run.status = status;
                run_state.run.ended_at = Some(event.ts);
                state.closed_runs.push(run_state.run);
            }
        }
    }

    fn open_run_mut(&mut self, session_id: &str) -> Option<&mut RunState> {
        self.sessions.get_mut(session_id)?.open_run.as_mut()
    }

    fn bump_counters(&mut self, session_id: &str, f: impl FnOnce(&mut RunCounters)) {
        if let Some(run) = self.open_run_mut(session_id) {
            f(&mut run.run.counters);
        }
    }

    fn track_subagent(&mut self, session_id: &str, agent_id: &str) {
        if let Some(run) = self.open_run_mut(session_id) {
            if !run.run.actors.subagent_ids.iter().any(|id| id == agent_id) {
                run.run.actors.subagent_ids.push(agent_id.to_string());
            }
        }
    }

    /// Idempotent: registering the same actor id twice leaves one entry.
    pub fn register_actor(&mut self, actor: Actor) {
        self.actors.entry(actor.actor_id.clone()).or_insert(actor);
    }

    // ---- emission -----------------------------------------------------------

    fn emit_in_run(
        &mut self,
        event: &RuntimeEvent,
        kind: FeedEventKind,
        level: EventLevel,
        actor_id: String,
        title: String,
        data: Value,
    ) -> String {
        let cause = Cause {
            hook_request_id: event.request_id.clone(),
            tool_use_id: event.payload.tool_use_id().map(str::to_string),
            parent_event_id: None,
        };
        self.emit_with_cause(event, Scope::Run, kind, level, actor_id, cause, title, data, None)
            .unwrap_or_default()
    }

    /// Run scope when a run is open, session scope otherwise.
    fn emit_scoped(
        &mut self,
        event: &RuntimeEvent,
        kind: FeedEventKind,
        level: EventLevel,
        actor_id: String,
        title: String,
        data: Value,
    ) -> String {
        self.emit_raw(event, kind, level, actor_id, title, data, None)
    }

    fn emit_raw(
        &mut self,
        event: &RuntimeEvent,
        kind: FeedEventKind,
        level: EventLevel,
        actor_id: String,
        title: String,
        data: Value,
        raw: Option<Value>,
    ) -> String {
        let has_open = self
            .sessions
            .get(&event.session_id)
            .is_some_and(|s| s.open_run.is_some());
        let scope = if has_open { Scope::Run } else { Scope::Session };
        let cause = Cause {
            hook_request_id: event.request_id.clone(),
            tool_use_id: event.payload.tool_use_id().map(str::to_string),
            parent_event_id: None,
        };
        self.emit_with_cause(event, scope, kind, level, actor_id, cause, title, data, raw)
            .unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_with_cause(
        &mut self,
        event: &RuntimeEvent,
        scope: Scope,
        kind: FeedEventKind,
        level: EventLevel,
        actor_id: String,
        cause: Cause,
        title: String,
        data: Value,
        raw: Option<Value>,
    ) -> Option<String> {
        let id = self.emit_to(
            &event.session_id,
            scope,
            kind,
            level,
            actor_id,
            cause,
            title,
            data,
            raw,
        )?;
        // Timestamps come from the hook that caused the event.
        if let Some(idx) = self.index.get(&id) {
            self.feed[*idx].ts = event.ts;
        }
        Some(id)
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_to(
        &mut self,
        session_id: &str,
        scope: Scope,
        kind: FeedEventKind,
        level: EventLevel,
        actor_id: String,
        cause: Cause,
        title: String,
        data: Value,
        raw: Option<Value>,
    ) -> Option<String> {
        let state = self.sessions.get_mut(session_id)?;
        let (seq, run_id) = match scope {
            Scope::Run => match state.open_run.as_mut() {
                Some(run) => {
                    run.seq += 1;
                    (run.seq, Some(run.run.run_id.clone()))
                }
                None => {
                    state.seq += 1;
                    (state.seq, None)
                }
            },
            Scope::Session => {
                state.seq += 1;
                (state.seq, None)
            }
        };
        let event_id = new_id();
        let feed_event = FeedEvent {
            event_id: event_id.clone(),
            seq,
            ts: toolgate_protocol::now_ms(),
            session_id: session_id.to_string(),
            run_id,
            kind,
            level,
            actor_id,
            cause,
            title,
            data,
            raw,
        };
        self.index.insert(event_id.clone(), self.feed.len());
        self.feed.push(feed_event);
        Some(event_id)
    }

    // ---- snapshots ----------------------------------------------------------

    pub fn feed(&self) -> &[FeedEvent] {
        &self.feed
    }

    pub fn active_session(&self) -> Option<&str> {
        self.active_session.as_deref()
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id).map(|s| &s.session)
    }

    pub fn open_run(&self, session_id: &str) -> Option<&Run> {
        self.sessions
            .get(session_id)?
            .open_run
            .as_ref()
            .map(|r| &r.run)
    }

    pub fn closed_runs(&self, session_id: &str) -> &[Run] {
        self.sessions
            .get(session_id)
            .map(|s| s.closed_runs.as_slice())
            .unwrap_or(&[])
    }

    pub fn actor(&self, actor_id: &str) -> Option<&Actor> {
        self.actors.get(actor_id)
    }

    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Run,
    Session,
}

fn preview(prompt: &str) -> String {
    let mut preview: String = prompt.chars().take(PROMPT_PREVIEW_LEN).collect();
    if prompt.chars().count() > PROMPT_PREVIEW_LEN {
        preview.push('…');
    }
    preview
}
