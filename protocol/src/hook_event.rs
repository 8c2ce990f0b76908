use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Hook names reported by the host. Unknown names are accepted and carried
/// verbatim so a newer host never gets its hooks rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventName {
    SessionStart,
    UserPromptSubmit,
    PreToolUse,
    PermissionRequest,
    PostToolUse,
    PostToolUseFailure,
    SubagentStart,
    SubagentStop,
    Stop,
    PreCompact,
    SessionEnd,
    Notification,
    Setup,
    Other(String),
}

impl HookEventName {
    pub fn parse(name: &str) -> Self {
        match name {
            "SessionStart" => Self::SessionStart,
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "PreToolUse" => Self::PreToolUse,
            "PermissionRequest" => Self::PermissionRequest,
            "PostToolUse" => Self::PostToolUse,
            "PostToolUseFailure" => Self::PostToolUseFailure,
            "SubagentStart" => Self::SubagentStart,
            "SubagentStop" => Self::SubagentStop,
            "Stop" => Self::Stop,
            "PreCompact" => Self::PreCompact,
            "SessionEnd" => Self::SessionEnd,
            "Notification" => Self::Notification,
            "Setup" => Self::Setup,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionStart => "SessionStart",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PermissionRequest => "PermissionRequest",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::SubagentStart => "SubagentStart",
            Self::SubagentStop => "SubagentStop",
            Self::Stop => "Stop",
            Self::PreCompact => "PreCompact",
            Self::SessionEnd => "SessionEnd",
            Self::Notification => "Notification",
            Self::Setup => "Setup",
            Self::Other(name) => name,
        }
    }

    /// All recognized names, in the order the host documents them. Used by
    /// the settings installer to register the forwarder for every hook.
    pub fn recognized() -> [&'static str; 13] {
        [
            "SessionStart",
            "UserPromptSubmit",
            "PreToolUse",
            "PermissionRequest",
            "PostToolUse",
            "PostToolUseFailure",
            "SubagentStart",
            "SubagentStop",
            "Stop",
            "PreCompact",
            "SessionEnd",
            "Notification",
            "Setup",
        ]
    }
}

/// Per-hook payload, one variant per recognized name. Parsing is lenient:
/// missing optional fields default, and unknown hook names land in `Other`
/// with the raw object preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookPayload {
    SessionStart {
        source: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript_path: Option<String>,
    },
    UserPromptSubmit {
        prompt: String,
    },
    PreToolUse {
        tool_name: String,
        tool_input: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
    },
    PermissionRequest {
        tool_name: String,
        tool_input: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        suggestions: Option<Value>,
    },
    PostToolUse {
        tool_name: String,
        tool_input: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_response: Option<Value>,
    },
    PostToolUseFailure {
        tool_name: String,
        tool_input: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_use_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    SubagentStart {
        agent_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
    },
    SubagentStop {
        agent_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        agent_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        transcript_path: Option<String>,
    },
    Stop {
        #[serde(skip_serializing_if = "Option::is_none")]
        stop_hook_active: Option<bool>,
    },
    PreCompact {
        #[serde(skip_serializing_if = "Option::is_none")]
        trigger: Option<String>,
    },
    SessionEnd {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Notification {
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Setup {},
    Other {
        raw: Value,
    },
}

fn str_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn value_field(payload: &Value, key: &str) -> Option<Value> {
    payload.get(key).filter(|v| !v.is_null()).cloned()
}

impl HookPayload {
    /// Interpret a raw envelope payload for the given hook name. Total: every
    /// object parses into some variant.
    pub fn from_wire(name: &HookEventName, payload: &Value) -> Self {
        match name {
            HookEventName::SessionStart => Self::SessionStart {
                source: str_field(payload, "source").unwrap_or_else(|| "startup".to_string()),
                model: str_field(payload, "model"),
                agent_type: str_field(payload, "agent_type"),
                cwd: str_field(payload, "cwd"),
                transcript_path: str_field(payload, "transcript_path"),
            },
            HookEventName::UserPromptSubmit => Self::UserPromptSubmit {
                prompt: str_field(payload, "prompt").unwrap_or_default(),
            },
            HookEventName::PreToolUse => Self::PreToolUse {
                tool_name: str_field(payload, "tool_name").unwrap_or_default(),
                tool_input: value_field(payload, "tool_input").unwrap_or_else(|| Value::Object(Default::default())),
                tool_use_id: str_field(payload, "tool_use_id"),
            },
            HookEventName::PermissionRequest => Self::PermissionRequest {
                tool_name: str_field(payload, "tool_name").unwrap_or_default(),
                tool_input: value_field(payload, "tool_input").unwrap_or_else(|| Value::Object(Default::default())),
                tool_use_id: str_field(payload, "tool_use_id"),
                suggestions: value_field(payload, "suggestions"),
            },
            HookEventName::PostToolUse => Self::PostToolUse {
                tool_name: str_field(payload, "tool_name").unwrap_or_default(),
                tool_input: value_field(payload, "tool_input").unwrap_or_else(|| Value::Object(Default::default())),
                tool_use_id: str_field(payload, "tool_use_id"),
                tool_response: value_field(payload, "tool_response"),
            },
            HookEventName::PostToolUseFailure => Self::PostToolUseFailure {
                tool_name: str_field(payload, "tool_name").unwrap_or_default(),
                tool_input: value_field(payload, "tool_input").unwrap_or_else(|| Value::Object(Default::default())),
                tool_use_id: str_field(payload, "tool_use_id"),
                error: str_field(payload, "error"),
            },
            HookEventName::SubagentStart => Self::SubagentStart {
                agent_id: str_field(payload, "agent_id").unwrap_or_default(),
                agent_type: str_field(payload, "agent_type"),
            },
            HookEventName::SubagentStop => Self::SubagentStop {
                agent_id: str_field(payload, "agent_id").unwrap_or_default(),
                agent_type: str_field(payload, "agent_type"),
                transcript_path: str_field(payload, "transcript_path"),
            },
            HookEventName::Stop => Self::Stop {
                stop_hook_active: payload.get("stop_hook_active").and_then(Value::as_bool),
            },
            HookEventName::PreCompact => Self::PreCompact {
                trigger: str_field(payload, "trigger"),
            },
            HookEventName::SessionEnd => Self::SessionEnd {
                reason: str_field(payload, "reason"),
            },
            HookEventName::Notification => Self::Notification {
                message: str_field(payload, "message"),
            },
            HookEventName::Setup => Self::Setup {},
            HookEventName::Other(_) => Self::Other {
                raw: payload.clone(),
            },
        }
    }

    /// Tool name for tool-bearing payloads.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            Self::PreToolUse { tool_name, .. }
            | Self::PermissionRequest { tool_name, .. }
            | Self::PostToolUse { tool_name, .. }
            | Self::PostToolUseFailure { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            Self::PreToolUse { tool_use_id, .. }
            | Self::PermissionRequest { tool_use_id, .. }
            | Self::PostToolUse { tool_use_id, .. }
            | Self::PostToolUseFailure { tool_use_id, .. } => tool_use_id.as_deref(),
            _ => None,
        }
    }
}
