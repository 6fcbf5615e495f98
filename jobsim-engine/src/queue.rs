//! FIFO submission queue feeding the processing engine.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct QueueInner {
    ids: Mutex<VecDeque<String>>,
    ready: Notify,
}

/// Ordered queue of pending job ids.
///
/// `enqueue` never blocks; `dequeue` waits for at most the given duration so
/// the worker can notice shutdown between polls.
#[derive(Debug, Clone, Default)]
pub struct SubmissionQueue {
    inner: Arc<QueueInner>,
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn ids(&self) -> MutexGuard<'_, VecDeque<String>> {
        // A panic while holding this lock cannot leave the deque half-updated.
        self.inner.ids.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job id to the tail.
    pub fn enqueue(&self, id: impl Into<String>) {
        self.ids().push_back(id.into());
        self.inner.ready.notify_one();
    }

    /// Pop the head without waiting.
    pub fn try_dequeue(&self) -> Option<String> {
        self.ids().pop_front()
    }

    /// Pop the head, waiting up to `wait` for an id to arrive.
    pub async fn dequeue(&self, wait: Duration) -> Option<String> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some(id) = self.try_dequeue() {
                return Some(id);
            }
            // notify_one stores a permit when nobody is waiting, so an enqueue
            // racing with the check above still wakes us.
            if tokio::time::timeout_at(deadline, self.inner.ready.notified())
                .await
                .is_err()
            {
                return self.try_dequeue();
            }
        }
    }

    /// Drop every pending occurrence of `id`. Returns true if any was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut ids = self.ids();
        let before = ids.len();
        ids.retain(|queued| queued != id);
        ids.len() != before
    }

    pub fn clear(&self) {
        self.ids().clear();
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pending ids, head first.
    pub fn pending(&self) -> Vec<String> {
        self.ids().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let queue = SubmissionQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");
        queue.enqueue("c");

        assert_eq!(queue.try_dequeue().as_deref(), Some("a"));
        assert_eq!(queue.try_dequeue().as_deref(), Some("b"));
        queue.enqueue("a");
        assert_eq!(queue.pending(), vec!["c", "a"]);
    }

    #[test]
    fn remove_and_clear() {
        let queue = SubmissionQueue::new();
        queue.enqueue("a");
        queue.enqueue("b");

        assert!(queue.remove("a"));
        assert!(!queue.remove("a"));
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_times_out_when_empty() {
        let queue = SubmissionQueue::new();
        let started = Instant::now();

        assert_eq!(queue.dequeue(Duration::from_secs(1)).await, None);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn dequeue_wakes_on_enqueue() {
        let queue = SubmissionQueue::new();
        let producer = queue.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            producer.enqueue("late");
        });

        let started = Instant::now();
        let id = queue.dequeue(Duration::from_secs(5)).await;
        assert_eq!(id.as_deref(), Some("late"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
