//! The priority workflow queue (§4.6): an ordered multiset of
//! `(workflow, event, enqueue_seq)` keyed by `(priority, enqueue_seq)`.
//! Lower priority value runs first; ties break by enqueue order (FIFO).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use loom_core::{Event, WorkflowDefinition};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// One pending invocation: a workflow paired with the event that triggered
/// it and the sequence number it was enqueued under.
#[derive(Clone)]
pub struct QueueItem {
    pub workflow: WorkflowDefinition,
    pub event: Event,
    pub seq: u64,
}

#[derive(Default)]
struct Inner {
    // Keyed by (priority, seq) so that BTreeMap iteration order already is
    // "lowest priority first, then FIFO" — `pop_first` gives exactly the
    // next item to run.
    items: BTreeMap<(i32, u64), QueueItem>,
}

/// A priority-ordered, FIFO-within-priority queue of pending workflow
/// invocations (§4.6). Bounded concurrency is a property of the loop's
/// worker count (§4.7), not of this queue's shape — it never applies
/// backpressure to producers.
pub struct PriorityWorkflowQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    seq: AtomicU64,
    closed: AtomicBool,
}

impl Default for PriorityWorkflowQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PriorityWorkflowQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueues a (workflow, event) pair and returns the sequence number it
    /// was assigned. Enqueueing the same pair twice is not deduplicated
    /// (§8 idempotence law): it produces two distinct queue entries and
    /// eventually two executions.
    pub fn enqueue(&self, workflow: WorkflowDefinition, event: Event) -> u64 {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        let priority = workflow.trigger.priority;
        self.inner
            .lock()
            .items
            .insert((priority, seq), QueueItem { workflow, event, seq });
        self.notify.notify_one();
        seq
    }

    /// Suspends until an item is available or the queue is closed and
    /// drained, in which case it returns `None`.
    pub async fn dequeue(&self) -> Option<QueueItem> {
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            if self.closed.load(Ordering::SeqCst) {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking pop of the next item, if any.
    pub fn try_dequeue(&self) -> Option<QueueItem> {
        let mut inner = self.inner.lock();
        let key = *inner.items.keys().next()?;
        inner.items.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth per priority class, for diagnostic reporting (`loomctl queue`).
    pub fn depth_by_priority(&self) -> BTreeMap<i32, usize> {
        let inner = self.inner.lock();
        let mut counts = BTreeMap::new();
        for (priority, _) in inner.items.keys() {
            *counts.entry(*priority).or_insert(0usize) += 1;
        }
        counts
    }

    /// Closes the queue: any workers blocked in `dequeue` are woken and
    /// will observe `None` once remaining items are drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cancels every pending item belonging to `workflow_name`. O(n) in the
    /// current queue depth; used during unregistration so the queue never
    /// holds a reference to a workflow that was concurrently removed (§3
    /// invariant).
    pub fn cancel_by_workflow(&self, workflow_name: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.items.len();
        inner.items.retain(|_, item| item.workflow.name != workflow_name);
        before - inner.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use loom_core::{Executor, Trigger, WorkflowResult};
    use std::sync::Arc as StdArc;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        async fn execute(
            &self,
            _event: &Event,
            context: loom_core::WorkflowContext,
        ) -> WorkflowResult {
            WorkflowResult::ok(context, None)
        }
    }

    fn workflow(name: &str, priority: i32) -> WorkflowDefinition {
        WorkflowDefinition::new(
            name,
            "test",
            Trigger::new(vec!["T1".to_string()], priority),
            StdArc::new(Noop),
        )
    }

    #[tokio::test]
    async fn fifo_within_equal_priority() {
        let queue = PriorityWorkflowQueue::new();
        queue.enqueue(workflow("A", 5), Event::new("T1", Default::default()));
        queue.enqueue(workflow("B", 5), Event::new("T1", Default::default()));

        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "A");
        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "B");
    }

    #[tokio::test]
    async fn lower_priority_value_runs_first() {
        let queue = PriorityWorkflowQueue::new();
        queue.enqueue(workflow("A", 5), Event::new("T1", Default::default()));
        queue.enqueue(workflow("B", 5), Event::new("T1", Default::default()));
        queue.enqueue(workflow("C", 1), Event::new("T1", Default::default()));

        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "C");
        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "A");
        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "B");
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_not_deduplicated() {
        let queue = PriorityWorkflowQueue::new();
        queue.enqueue(workflow("A", 1), Event::new("T1", Default::default()));
        queue.enqueue(workflow("A", 1), Event::new("T1", Default::default()));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn cancel_by_workflow_removes_pending_entries() {
        let queue = PriorityWorkflowQueue::new();
        queue.enqueue(workflow("A", 1), Event::new("T1", Default::default()));
        queue.enqueue(workflow("B", 1), Event::new("T1", Default::default()));
        queue.enqueue(workflow("A", 1), Event::new("T1", Default::default()));

        let removed = queue.cancel_by_workflow("A");
        assert_eq!(removed, 2);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue().await.unwrap().workflow.name, "B");
    }

    #[tokio::test]
    async fn close_unblocks_pending_dequeue() {
        let queue = StdArc::new(PriorityWorkflowQueue::new());
        let queue2 = queue.clone();
        let handle = tokio::spawn(async move { queue2.dequeue().await });

        tokio::task::yield_now().await;
        queue.close();

        assert!(handle.await.unwrap().is_none());
    }
}
