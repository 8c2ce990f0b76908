use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Display severity attached to each feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

/// Back-references tying a feed event to what caused it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cause {
    pub hook_request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
}

/// Canonical feed event kinds. Closed on purpose: the mapper handles every
/// hook exhaustively and anything it does not recognize lands in
/// `UnknownHook` rather than widening this enum at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEventKind {
    SessionStarted,
    SessionEnded,
    RunStarted,
    RunClosed,
    PromptSubmitted,
    ToolRequested,
    ToolCompleted,
    ToolFailed,
    ToolBlocked,
    PermissionRequested,
    PermissionDecision,
    QuestionAsked,
    QuestionAnswered,
    SubagentStarted,
    SubagentStopped,
    AgentStopped,
    Compaction,
    Notification,
    Setup,
    UnknownHook,
}

/// One canonical, replayable record of an occurrence. Identity fields are
/// immutable once created; enrichment may only add keys under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub event_id: String,
    /// Strictly increasing by 1 within the owning scope: the run when
    /// `run_id` is set, the session otherwise.
    pub seq: u64,
    pub ts: i64,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub kind: FeedEventKind,
    pub level: EventLevel,
    pub actor_id: String,
    pub cause: Cause,
    pub title: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Lightweight snapshot of an event awaiting a human decision. Deliberately
/// decoupled from the full envelope so queue memory stays bounded no matter
/// how large the tool input was.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub request_id: String,
    pub ts: i64,
    pub tool_name: String,
    pub tool_input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Value>,
}
