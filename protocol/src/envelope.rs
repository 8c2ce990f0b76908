use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Wire protocol version carried in every envelope. Bumped only for
/// incompatible changes; the server accepts any envelope that carries *some*
/// version so older forwarders keep working.
pub const PROTOCOL_VERSION: u32 = 1;

/// One hook invocation, as written by the forwarder onto the socket.
///
/// Exactly one envelope per connection, newline-terminated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub v: u32,
    pub kind: String,
    pub request_id: String,
    pub ts: i64,
    pub session_id: String,
    pub hook_event_name: String,
    pub payload: Value,
}

impl RequestEnvelope {
    pub fn new(session_id: String, hook_event_name: String, payload: Value) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            kind: "hook_event".to_string(),
            request_id: crate::new_id(),
            ts: crate::now_ms(),
            session_id,
            hook_event_name,
            payload,
        }
    }

    /// Boundary validation applied by the server before dispatch. Malformed
    /// envelopes are rejected here (connection closed, no reply) rather than
    /// propagated into the pipeline.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.kind != "hook_event" {
            return Err(EnvelopeError::UnexpectedKind(self.kind.clone()));
        }
        if self.request_id.trim().is_empty() {
            return Err(EnvelopeError::EmptyRequestId);
        }
        if self.hook_event_name.is_empty()
            || !self
                .hook_event_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(EnvelopeError::MalformedHookName(
                self.hook_event_name.clone(),
            ));
        }
        if !self.payload.is_object() {
            return Err(EnvelopeError::PayloadNotAnObject);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unexpected envelope kind `{0}`")]
    UnexpectedKind(String),
    #[error("request id is empty")]
    EmptyRequestId,
    #[error("malformed hook event name `{0}`")]
    MalformedHookName(String),
    #[error("payload is not a JSON object")]
    PayloadNotAnObject,
}

/// What the forwarder should do with the host's hook invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyAction {
    Passthrough,
    BlockWithStderr,
    JsonOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyPayload {
    pub action: ReplyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_json: Option<Value>,
}

impl ReplyPayload {
    pub fn passthrough() -> Self {
        Self {
            action: ReplyAction::Passthrough,
            stderr: None,
            stdout_json: None,
        }
    }

    pub fn block(stderr: impl Into<String>) -> Self {
        Self {
            action: ReplyAction::BlockWithStderr,
            stderr: Some(stderr.into()),
            stdout_json: None,
        }
    }

    pub fn json_output(stdout_json: Value) -> Self {
        Self {
            action: ReplyAction::JsonOutput,
            stderr: None,
            stdout_json: Some(stdout_json),
        }
    }
}

/// The single reply line written back to the forwarder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub v: u32,
    pub kind: String,
    pub request_id: String,
    pub ts: i64,
    pub payload: ReplyPayload,
}

impl ReplyEnvelope {
    pub fn new(request_id: String, payload: ReplyPayload) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            kind: "hook_result".to_string(),
            request_id,
            ts: crate::now_ms(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn round_trips_request_envelope() {
        let envelope = RequestEnvelope::new(
            "sess-1".to_string(),
            "PreToolUse".to_string(),
            json!({"tool_name": "Bash"}),
        );
        let line = serde_json::to_string(&envelope).unwrap();
        let parsed: RequestEnvelope = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn validate_rejects_empty_request_id() {
        let mut envelope =
            RequestEnvelope::new("sess-1".to_string(), "Stop".to_string(), json!({}));
        envelope.request_id = "  ".to_string();
        assert_eq!(envelope.validate(), Err(EnvelopeError::EmptyRequestId));
    }

    #[test]
    fn validate_rejects_malformed_hook_name() {
        let envelope = RequestEnvelope::new(
            "sess-1".to_string(),
            "Pre Tool Use".to_string(),
            json!({}),
        );
        assert_eq!(
            envelope.validate(),
            Err(EnvelopeError::MalformedHookName("Pre Tool Use".to_string()))
        );
    }

    #[test]
    fn validate_rejects_non_object_payload() {
        let mut envelope =
            RequestEnvelope::new("sess-1".to_string(), "Stop".to_string(), json!({}));
        envelope.payload = json!("not an object");
        assert_eq!(envelope.validate(), Err(EnvelopeError::PayloadNotAnObject));
    }

    #[test]
    fn reply_serializes_action_snake_case() {
        let reply = ReplyEnvelope::new(
            "req-1".to_string(),
            ReplyPayload::block("Blocked by rule deny-bash (policy)"),
        );
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["payload"]["action"], json!("block_with_stderr"));
        assert_eq!(value["kind"], json!("hook_result"));
    }
}
