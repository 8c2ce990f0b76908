use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::ReplyPayload;

/// Where a decision came from. Timeout-sourced decisions map to `no_opinion`
/// in the feed; the host has already received the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    User,
    Rule,
    Timeout,
}

/// Optional statement of intent attached by the decider, surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionIntent {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Verdict {
    /// Structured output handed to the host on stdout.
    Json { body: Value },
    /// No opinion; the host applies its own judgment.
    Passthrough,
    /// Deny, with the message the host prints to the user.
    Block { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    pub source: DecisionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<DecisionIntent>,
}

impl Decision {
    pub fn allow(source: DecisionSource) -> Self {
        Self {
            verdict: Verdict::Json {
                body: serde_json::json!({"decision": "approve"}),
            },
            source,
            intent: None,
        }
    }

    pub fn block(source: DecisionSource, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Block {
                reason: reason.into(),
            },
            source,
            intent: None,
        }
    }

    pub fn passthrough(source: DecisionSource) -> Self {
        Self {
            verdict: Verdict::Passthrough,
            source,
            intent: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.intent = Some(DecisionIntent {
            reason: reason.into(),
        });
        self
    }

    /// True when the feed should record this as `no_opinion`.
    pub fn is_no_opinion(&self) -> bool {
        matches!(self.verdict, Verdict::Passthrough) || self.source == DecisionSource::Timeout
    }

    pub fn to_reply(&self) -> ReplyPayload {
        match &self.verdict {
            Verdict::Json { body } => ReplyPayload::json_output(body.clone()),
            Verdict::Passthrough => ReplyPayload::passthrough(),
            Verdict::Block { reason } => ReplyPayload::block(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn timeout_decision_is_no_opinion() {
        assert_eq!(
            Decision::passthrough(DecisionSource::Timeout).is_no_opinion(),
            true
        );
        assert_eq!(Decision::allow(DecisionSource::Rule).is_no_opinion(), false);
    }

    #[test]
    fn block_reply_carries_reason() {
        let reply = Decision::block(DecisionSource::Rule, "Blocked by rule").to_reply();
        assert_eq!(reply.stderr.as_deref(), Some("Blocked by rule"));
    }
}
