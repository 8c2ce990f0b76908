use std::collections::VecDeque;

use toolgate_protocol::QueueItem;

/// Ordered holding area for events awaiting a human decision.
///
/// Items are lightweight snapshots, so memory stays bounded regardless of
/// how large the originating envelopes were.
#[derive(Debug, Default)]
pub struct HoldQueue {
    items: VecDeque<QueueItem>,
}

impl HoldQueue {
    pub fn enqueue(&mut self, item: QueueItem) {
        // Re-delivery of the same request replaces the stale snapshot.
        self.items.retain(|existing| existing.request_id != item.request_id);
        self.items.push_back(item);
    }

    pub fn dequeue(&mut self, request_id: &str) -> Option<QueueItem> {
        let idx = self
            .items
            .iter()
            .position(|item| item.request_id == request_id)?;
        self.items.remove(idx)
    }

    pub fn bulk_remove(&mut self, request_ids: &[String]) -> usize {
        let before = self.items.len();
        self.items
            .retain(|item| !request_ids.contains(&item.request_id));
        before - self.items.len()
    }

    pub fn peek_front(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    /// Head item plus how many are waiting behind it, the shape the renderer
    /// asks for.
    pub fn head(&self) -> Option<(QueueItem, usize)> {
        self.items
            .front()
            .map(|item| (item.clone(), self.items.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(request_id: &str) -> QueueItem {
        QueueItem {
            request_id: request_id.to_string(),
            ts: 0,
            tool_name: "Bash".to_string(),
            tool_input: json!({"command": "ls"}),
            tool_use_id: None,
            suggestions: None,
        }
    }

    #[test]
    fn head_reports_trailing_count() {
        let mut queue = HoldQueue::default();
        queue.enqueue(item("a"));
        queue.enqueue(item("b"));
        queue.enqueue(item("c"));
        let (head, trailing) = queue.head().unwrap();
        assert_eq!(head.request_id, "a");
        assert_eq!(trailing, 2);
    }

    #[test]
    fn dequeue_by_id_preserves_order() {
        let mut queue = HoldQueue::default();
        queue.enqueue(item("a"));
        queue.enqueue(item("b"));
        queue.enqueue(item("c"));
        assert_eq!(queue.dequeue("b").unwrap().request_id, "b");
        assert_eq!(queue.peek_front().unwrap().request_id, "a");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dequeue("b"), None);
    }

    #[test]
    fn bulk_remove_returns_removed_count() {
        let mut queue = HoldQueue::default();
        queue.enqueue(item("a"));
        queue.enqueue(item("b"));
        let removed = queue.bulk_remove(&["a".to_string(), "zzz".to_string()]);
        assert_eq!(removed, 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn re_enqueue_replaces_stale_snapshot() {
        let mut queue = HoldQueue::default();
        queue.enqueue(item("a"));
        queue.enqueue(item("a"));
        assert_eq!(queue.len(), 1);
    }
}
