//! Wire and internal data model for the toolgate hook pipeline.
//!
//! The host agent process emits lifecycle hooks; each hook invocation is
//! wrapped in a [`RequestEnvelope`], answered with a [`ReplyEnvelope`], and
//! validated into a [`RuntimeEvent`] before dispatch. Everything downstream
//! (queues, decisions, the canonical feed) is defined here so that the
//! policy, bridge and pipeline crates share one closed vocabulary.

mod decision;
mod envelope;
mod feed;
mod hook_event;
mod runtime_event;

pub use decision::Decision;
pub use decision::DecisionIntent;
pub use decision::DecisionSource;
pub use decision::Verdict;
pub use envelope::EnvelopeError;
pub use envelope::PROTOCOL_VERSION;
pub use envelope::ReplyAction;
pub use envelope::ReplyEnvelope;
pub use envelope::ReplyPayload;
pub use envelope::RequestEnvelope;
pub use feed::Cause;
pub use feed::EventLevel;
pub use feed::FeedEvent;
pub use feed::FeedEventKind;
pub use feed::QueueItem;
pub use hook_event::HookEventName;
pub use hook_event::HookPayload;
pub use runtime_event::RuntimeEvent;

/// Current epoch milliseconds, the timestamp unit used on every envelope and
/// feed event.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Freshly generated request/event id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
