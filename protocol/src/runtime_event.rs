use std::time::Duration;

use serde_json::Value;

use crate::EnvelopeError;
use crate::HookEventName;
use crate::HookPayload;
use crate::RequestEnvelope;

/// The validated, internal form of a request envelope.
///
/// Interaction metadata is derived from the hook name once, here, so the
/// dispatcher and the transport agree on whether an event may wait for a
/// decision and for how long.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeEvent {
    pub request_id: String,
    pub ts: i64,
    pub session_id: String,
    pub name: HookEventName,
    pub payload: HookPayload,
    /// Raw payload object as it arrived, kept for the feed's `raw` field.
    pub raw_payload: Value,
    pub expects_decision: bool,
    pub can_block: bool,
    /// How long the server may hold the connection waiting for a decision
    /// before the automatic passthrough fires. Zero means answer immediately.
    pub decision_timeout: Duration,
}

/// Decision window for hooks the host will block on.
const BLOCKING_DECISION_TIMEOUT: Duration = Duration::from_secs(30);

impl RuntimeEvent {
    pub fn from_envelope(envelope: RequestEnvelope) -> Result<Self, EnvelopeError> {
        envelope.validate()?;
        let name = HookEventName::parse(&envelope.hook_event_name);
        let payload = HookPayload::from_wire(&name, &envelope.payload);
        let (expects_decision, can_block, decision_timeout) = interaction_metadata(&name);
        Ok(Self {
            request_id: envelope.request_id,
            ts: envelope.ts,
            session_id: envelope.session_id,
            name,
            payload,
            raw_payload: envelope.payload,
            expects_decision,
            can_block,
            decision_timeout,
        })
    }
}

fn interaction_metadata(name: &HookEventName) -> (bool, bool, Duration) {
    match name {
        HookEventName::PreToolUse | HookEventName::PermissionRequest => {
            (true, true, BLOCKING_DECISION_TIMEOUT)
        }
        // Stop hooks may block the host, but this pipeline never gates them.
        HookEventName::Stop | HookEventName::SubagentStop => (false, true, Duration::ZERO),
        _ => (false, false, Duration::ZERO),
    }
}
