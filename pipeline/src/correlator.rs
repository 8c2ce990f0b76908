use std::collections::HashMap;

use tokio::sync::oneshot;
use toolgate_protocol::Decision;
use tracing::debug;

/// Matches a later out-of-band decision back to the connection that is
/// waiting to answer the host.
///
/// The bridge timeout is the only cancellation primitive: once an entry is
/// abandoned, any later decision for that request id is silently ignored —
/// the host has already received the fallback and cannot be un-answered.
#[derive(Debug, Default)]
pub struct DecisionCorrelator {
    pending: HashMap<String, oneshot::Sender<Decision>>,
}

impl DecisionCorrelator {
    /// Register a pending request; the returned receiver resolves when a
    /// decision arrives. Re-registration replaces the old entry.
    pub fn register(&mut self, request_id: &str) -> oneshot::Receiver<Decision> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id.to_string(), tx);
        rx
    }

    /// Deliver a decision. Returns false when the request id is unknown or
    /// already resolved.
    pub fn resolve(&mut self, request_id: &str, decision: Decision) -> bool {
        match self.pending.remove(request_id) {
            Some(tx) => {
                if tx.send(decision).is_err() {
                    debug!("decision receiver for {request_id} already gone");
                }
                true
            }
            None => false,
        }
    }

    /// Drop a pending entry after its window elapsed, without delivering
    /// anything.
    pub fn abandon(&mut self, request_id: &str) -> bool {
        self.pending.remove(request_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use toolgate_protocol::DecisionSource;

    #[tokio::test]
    async fn resolve_delivers_to_the_registered_receiver() {
        let mut correlator = DecisionCorrelator::default();
        let rx = correlator.register("req-1");
        assert_eq!(
            correlator.resolve("req-1", Decision::allow(DecisionSource::User)),
            true
        );
        let decision = rx.await.unwrap();
        assert_eq!(decision.source, DecisionSource::User);
        assert_eq!(correlator.is_empty(), true);
    }

    #[test]
    fn unknown_request_id_is_ignored() {
        let mut correlator = DecisionCorrelator::default();
        assert_eq!(
            correlator.resolve("nope", Decision::allow(DecisionSource::User)),
            false
        );
    }

    #[test]
    fn abandoned_entry_ignores_late_decisions() {
        let mut correlator = DecisionCorrelator::default();
        let _rx = correlator.register("req-1");
        assert_eq!(correlator.abandon("req-1"), true);
        assert_eq!(
            correlator.resolve("req-1", Decision::allow(DecisionSource::User)),
            false
        );
    }
}
