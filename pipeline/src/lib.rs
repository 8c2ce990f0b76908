//! Dispatch & policy pipeline: the single logical writer behind the bridge.
//!
//! One [`Pipeline`] is constructed per process and owns all session, run,
//! sequence and correlation state; concurrent connections are serialized
//! through the [`PipelineHandle`] mutex into one decision stream. Rule-based
//! answers resolve synchronously; queued events wait out their decision
//! window on the connection task; enrichment runs fire-and-forget and posts
//! its result back through the same single writer.

mod correlator;
mod dispatch;
mod enrichment;
mod feed_mapper;
mod model;
mod queue;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use toolgate_bridge::HookDispatch;
use toolgate_policy::HookRule;
use toolgate_policy::RuleSet;
use toolgate_protocol::Decision;
use toolgate_protocol::DecisionSource;
use toolgate_protocol::FeedEvent;
use toolgate_protocol::HookPayload;
use toolgate_protocol::QueueItem;
use toolgate_protocol::ReplyPayload;
use toolgate_protocol::RuntimeEvent;
use tracing::debug;
use tracing::warn;

pub use correlator::DecisionCorrelator;
pub use dispatch::Disposition;
pub use dispatch::dispatch_event;
pub use enrichment::Followup;
pub use enrichment::TranscriptSummary;
pub use enrichment::read_transcript_summary;
pub use feed_mapper::FeedMapper;
pub use model::Actor;
pub use model::ActorKind;
pub use model::Run;
pub use model::RunActors;
pub use model::RunCounters;
pub use model::RunStatus;
pub use model::Session;
pub use model::Trigger;
pub use model::TriggerKind;
pub use queue::HoldQueue;

/// Which holding area a queued event went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Permission,
    Question,
}

/// What `handle_event` tells the transport to do.
enum DispatchOutcome {
    Immediate(ReplyPayload),
    Pending {
        rx: oneshot::Receiver<Decision>,
        window: std::time::Duration,
    },
}

/// Window for queued events whose hook kind carries no decision timeout of
/// its own (question-bearing notifications).
const FALLBACK_DECISION_WINDOW: std::time::Duration = std::time::Duration::from_secs(30);

/// All mutable pipeline state. Constructed once per process and exposed
/// through explicit methods; tests build as many independent instances as
/// they like.
#[derive(Default)]
pub struct Pipeline {
    rules: RuleSet,
    mapper: FeedMapper,
    permission_queue: HoldQueue,
    question_queue: HoldQueue,
    correlator: DecisionCorrelator,
}

impl Pipeline {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    /// Run the handler chain, apply queue/correlator effects, and feed the
    /// mapper. The mapper runs regardless of which handler fired.
    fn handle_event(&mut self, event: &RuntimeEvent) -> (DispatchOutcome, Vec<Followup>) {
        let disposition = dispatch_event(event, &self.rules);

        let outcome = match &disposition {
            Disposition::PromptDenied { rule_id, added_by }
            | Disposition::RuleDenied { rule_id, added_by } => DispatchOutcome::Immediate(
                Decision::block(
                    DecisionSource::Rule,
                    format!("Blocked by rule {rule_id} ({added_by})"),
                )
                .to_reply(),
            ),
            Disposition::PromptAutoAllowed
            | Disposition::SafeAllowed
            | Disposition::RuleApproved { .. } => {
                DispatchOutcome::Immediate(Decision::allow(DecisionSource::Rule).to_reply())
            }
            Disposition::PermissionQueued => {
                self.enqueue_snapshot(event, QueueKind::Permission);
                DispatchOutcome::Pending {
                    rx: self.correlator.register(&event.request_id),
                    window: decision_window(event),
                }
            }
            Disposition::QuestionQueued => {
                self.enqueue_snapshot(event, QueueKind::Question);
                DispatchOutcome::Pending {
                    rx: self.correlator.register(&event.request_id),
                    window: decision_window(event),
                }
            }
            Disposition::SubagentCompleted | Disposition::Informational => {
                DispatchOutcome::Immediate(ReplyPayload::passthrough())
            }
        };

        let followups = self.mapper.apply(event, &disposition);
        (outcome, followups)
    }

    fn enqueue_snapshot(&mut self, event: &RuntimeEvent, kind: QueueKind) {
        let (tool_name, tool_input, tool_use_id, suggestions) = match &event.payload {
            HookPayload::PreToolUse {
                tool_name,
                tool_input,
                tool_use_id,
            } => (
                tool_name.clone(),
                tool_input.clone(),
                tool_use_id.clone(),
                None,
            ),
            HookPayload::PermissionRequest {
                tool_name,
                tool_input,
                tool_use_id,
                suggestions,
            } => (
                tool_name.clone(),
                tool_input.clone(),
                tool_use_id.clone(),
                suggestions.clone(),
            ),
            HookPayload::Notification { message } => (
                "Notification".to_string(),
                serde_json::json!({"message": message}),
                None,
                None,
            ),
            _ => (
                event.name.as_str().to_string(),
                serde_json::Value::Object(Default::default()),
                None,
                None,
            ),
        };
        let item = QueueItem {
            request_id: event.request_id.clone(),
            ts: event.ts,
            tool_name,
            tool_input,
            tool_use_id,
            suggestions,
        };
        match kind {
            QueueKind::Permission => self.permission_queue.enqueue(item),
            QueueKind::Question => self.question_queue.enqueue(item),
        }
    }

    /// Resolve a pending request after its window elapsed. Records a
    /// timeout-sourced decision (surfaced as `no_opinion`) and returns the
    /// fallback reply for the host.
    fn resolve_timeout(&mut self, request_id: &str) -> ReplyPayload {
        self.correlator.abandon(request_id);
        let decision = Decision::passthrough(DecisionSource::Timeout);
        self.mapper.record_decision(request_id, &decision);
        decision.to_reply()
    }

    /// Deliver an out-of-band decision. Returns false when the request id is
    /// unknown or already resolved — no feed event is fabricated.
    pub fn respond(&mut self, request_id: &str, decision: Decision) -> bool {
        let delivered = self.correlator.resolve(request_id, decision.clone());
        // Clear the snapshot either way so a stale card cannot linger.
        let dequeued = self.permission_queue.dequeue(request_id).is_some()
            || self.question_queue.dequeue(request_id).is_some();
        if !delivered {
            if dequeued {
                debug!("cleared stale queue item for {request_id}");
            }
            return false;
        }
        self.mapper.record_decision(request_id, &decision);
        true
    }

    pub fn apply_enrichment(&mut self, event_id: &str, result: Result<TranscriptSummary, String>) {
        self.mapper.apply_enrichment(event_id, result);
    }

    // ---- rules --------------------------------------------------------------

    pub fn add_rule(&mut self, rule: HookRule) {
        self.rules.push(rule);
    }

    pub fn remove_rule(&mut self, rule_id: &str) -> bool {
        self.rules.remove(rule_id)
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    // ---- snapshots ----------------------------------------------------------

    pub fn feed(&self) -> &[FeedEvent] {
        self.mapper.feed()
    }

    pub fn mapper(&self) -> &FeedMapper {
        &self.mapper
    }

    pub fn permission_head(&self) -> Option<(QueueItem, usize)> {
        self.permission_queue.head()
    }

    pub fn question_head(&self) -> Option<(QueueItem, usize)> {
        self.question_queue.head()
    }

    pub fn permission_queue(&mut self) -> &mut HoldQueue {
        &mut self.permission_queue
    }

    pub fn question_queue(&mut self) -> &mut HoldQueue {
        &mut self.question_queue
    }
}

/// Cloneable handle serializing all access to the pipeline. This is what the
/// bridge server and the rendering collaborator both hold.
#[derive(Clone, Default)]
pub struct PipelineHandle {
    inner: Arc<Mutex<Pipeline>>,
}

impl PipelineHandle {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Pipeline::new(rules))),
        }
    }

    /// Deliver a decision from the renderer or another out-of-band actor.
    pub async fn respond(&self, request_id: &str, decision: Decision) -> bool {
        self.inner.lock().await.respond(request_id, decision)
    }

    pub async fn feed_snapshot(&self) -> Vec<FeedEvent> {
        self.inner.lock().await.feed().to_vec()
    }

    pub async fn permission_head(&self) -> Option<(QueueItem, usize)> {
        self.inner.lock().await.permission_head()
    }

    pub async fn question_head(&self) -> Option<(QueueItem, usize)> {
        self.inner.lock().await.question_head()
    }

    pub async fn add_rule(&self, rule: HookRule) {
        self.inner.lock().await.add_rule(rule);
    }

    pub async fn remove_rule(&self, rule_id: &str) -> bool {
        self.inner.lock().await.remove_rule(rule_id)
    }

    /// Run a closure under the pipeline lock; escape hatch for tests and for
    /// collaborators that need a consistent multi-field snapshot.
    pub async fn with<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        let mut guard = self.inner.lock().await;
        f(&mut guard)
    }

    fn spawn_followups(&self, followups: Vec<Followup>) {
        for followup in followups {
            match followup {
                Followup::EnrichFromTranscript { event_id, path } => {
                    let handle = self.clone();
                    tokio::spawn(async move {
                        let result = tokio::task::spawn_blocking(move || {
                            read_transcript_summary(&path).map_err(|err| err.to_string())
                        })
                        .await
                        .unwrap_or_else(|err| Err(err.to_string()));
                        if let Err(message) = &result {
                            warn!("transcript enrichment failed: {message}");
                        }
                        handle
                            .inner
                            .lock()
                            .await
                            .apply_enrichment(&event_id, result);
                    });
                }
            }
        }
    }
}

fn decision_window(event: &RuntimeEvent) -> std::time::Duration {
    if event.decision_timeout.is_zero() {
        FALLBACK_DECISION_WINDOW
    } else {
        event.decision_timeout
    }
}

impl HookDispatch for PipelineHandle {
    async fn dispatch(&self, event: RuntimeEvent) -> ReplyPayload {
        let (outcome, followups) = {
            let mut guard = self.inner.lock().await;
            guard.handle_event(&event)
        };
        self.spawn_followups(followups);

        match outcome {
            DispatchOutcome::Immediate(reply) => reply,
            DispatchOutcome::Pending { rx, window } => match timeout(window, rx).await {
                Ok(Ok(decision)) => decision.to_reply(),
                // Window elapsed, or the sender vanished; either way the
                // host gets the fail-open fallback.
                _ => self.inner.lock().await.resolve_timeout(&event.request_id),
            },
        }
    }
}
