//! A small, explicit work queue modeling the per-key serialization and
//! de-duplication guarantee `spec.md` §5 requires ("the queue guarantees no
//! two workers hold the same key simultaneously"; "pending key re-enqueues
//! are collapsed"). The teacher's `kube_runtime::Controller` provides this
//! internally; this repo models it explicitly so the resync/backoff layer
//! built on top (`spec.md` §4.1) is inspectable and independently testable.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio::time::{Duration, Instant};

/// `namespace/name`, the unit of work the controller loop dispatches.
pub type ObjectKey = String;

struct Inner {
    queue: VecDeque<(ObjectKey, Instant)>,
    queued: HashSet<ObjectKey>,
    in_flight: HashSet<ObjectKey>,
}

/// A dedup, delay-aware FIFO queue of object keys. At most one worker may
/// hold a given key at a time (`dequeue` skips keys currently `in_flight`);
/// re-enqueuing a key already pending collapses into the existing entry.
pub struct WorkQueue {
    inner: Mutex<Inner>,
    notify: Arc<Notify>,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                queued: HashSet::new(),
                in_flight: HashSet::new(),
            }),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Enqueues `key` for immediate processing. A no-op if `key` is already
    /// pending (not yet dequeued).
    pub async fn enqueue(&self, key: ObjectKey) {
        self.enqueue_after(key, Duration::ZERO).await;
    }

    /// Enqueues `key` to become eligible after `delay` (used for error
    /// backoff, capped by the resync interval per `spec.md` §4.1).
    pub async fn enqueue_after(&self, key: ObjectKey, delay: Duration) {
        let mut inner = self.inner.lock().await;
        if inner.queued.contains(&key) {
            return;
        }
        inner.queued.insert(key.clone());
        inner.queue.push_back((key, Instant::now() + delay));
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Blocks until a key is ready (its delay has elapsed) and not
    /// currently held by another worker, then marks it in-flight.
    pub async fn dequeue(&self) -> ObjectKey {
        loop {
            let wait = {
                let mut inner = self.inner.lock().await;
                let now = Instant::now();
                let ready_index = inner
                    .queue
                    .iter()
                    .position(|(key, ready_at)| *ready_at <= now && !inner.in_flight.contains(key));
                if let Some(idx) = ready_index {
                    let (key, _) = inner.queue.remove(idx).unwrap();
                    inner.queued.remove(&key);
                    inner.in_flight.insert(key.clone());
                    return key;
                }
                inner.queue.iter().map(|(_, ready_at)| *ready_at).min()
            };
            match wait {
                Some(ready_at) => {
                    let now = Instant::now();
                    if ready_at > now {
                        tokio::select! {
                            _ = tokio::time::sleep(ready_at - now) => {}
                            _ = self.notify.notified() => {}
                        }
                    } else {
                        self.notify.notified().await;
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Releases `key`, allowing it to be dequeued again by a future
    /// `enqueue`. Must be called exactly once per `dequeue`.
    pub async fn release(&self, key: &str) {
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(key);
        drop(inner);
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn duplicate_enqueue_collapses_to_one_entry() {
        let q = WorkQueue::new();
        q.enqueue("ns/a".to_string()).await;
        q.enqueue("ns/a".to_string()).await;
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn dequeue_then_release_allows_requeue() {
        let q = WorkQueue::new();
        q.enqueue("ns/a".to_string()).await;
        let key = q.dequeue().await;
        assert_eq!(key, "ns/a");
        // Re-enqueuing while in-flight is allowed (it will just not be
        // immediately dequeued a second time by a racing worker); requeue
        // and confirm it's visible once released.
        q.enqueue("ns/a".to_string()).await;
        q.release(&key).await;
        let key2 = tokio::time::timeout(StdDuration::from_millis(100), q.dequeue())
            .await
            .unwrap();
        assert_eq!(key2, "ns/a");
    }

    #[tokio::test]
    async fn delayed_enqueue_is_not_dequeued_before_its_delay_elapses() {
        let q = WorkQueue::new();
        q.enqueue_after("ns/a".to_string(), StdDuration::from_millis(50)).await;
        let res = tokio::time::timeout(StdDuration::from_millis(10), q.dequeue()).await;
        assert!(res.is_err(), "should not be ready yet");
        let key = tokio::time::timeout(StdDuration::from_millis(200), q.dequeue())
            .await
            .unwrap();
        assert_eq!(key, "ns/a");
    }
}
