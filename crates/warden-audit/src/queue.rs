//! Bounded queues with backpressure for the audit pipeline.
//!
//! Built on `crossbeam-queue::ArrayQueue`: lock-free, bounded, many
//! producers (request threads) and a single consumer (the delivery
//! worker). When the queue is full the item is returned to the caller as
//! a backpressure signal; producers never block indefinitely and nothing
//! is dropped silently.

use std::thread;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;

/// How long a deadline-bounded push sleeps between attempts.
const PUSH_POLL: Duration = Duration::from_millis(1);

/// Result of attempting to push to a bounded queue.
#[derive(Debug)]
pub enum PushResult<T> {
    /// Item was successfully enqueued.
    Ok,
    /// Queue is full. Returns the item for the caller to handle.
    Backpressure(T),
}

impl<T> PushResult<T> {
    pub fn is_ok(&self) -> bool {
        matches!(self, PushResult::Ok)
    }
}

/// A bounded, lock-free queue with backpressure signaling.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> BoundedQueue<T> {
    /// Creates a new bounded queue with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: ArrayQueue::new(capacity),
        }
    }

    /// Attempts to push an item, returning it on a full queue.
    pub fn try_push(&self, item: T) -> PushResult<T> {
        match self.inner.push(item) {
            Ok(()) => PushResult::Ok,
            Err(item) => PushResult::Backpressure(item),
        }
    }

    /// Pushes an item, retrying until the deadline.
    ///
    /// Either succeeds within `timeout` or returns the item as
    /// backpressure; never blocks past the deadline. A zero timeout
    /// degrades to a single `try_push`.
    pub fn push_within(&self, item: T, timeout: Duration) -> PushResult<T> {
        let deadline = Instant::now() + timeout;
        let mut item = item;
        loop {
            match self.try_push(item) {
                PushResult::Ok => return PushResult::Ok,
                PushResult::Backpressure(returned) => {
                    if Instant::now() >= deadline {
                        return PushResult::Backpressure(returned);
                    }
                    item = returned;
                    thread::sleep(PUSH_POLL);
                }
            }
        }
    }

    /// Attempts to pop an item; `None` when empty.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Pops everything currently queued.
    ///
    /// Used by the retry scheduler to move the failed queue's contents
    /// back onto the main queue in one sweep.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.inner.len());
        while let Some(item) = self.inner.pop() {
            items.push(item);
        }
        items
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_push_pop() {
        let q = BoundedQueue::new(3);

        assert!(q.try_push(1).is_ok());
        assert!(q.try_push(2).is_ok());
        assert!(q.try_push(3).is_ok());

        assert_eq!(q.try_pop(), Some(1));
        assert_eq!(q.try_pop(), Some(2));
        assert_eq!(q.try_pop(), Some(3));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn backpressure_when_full() {
        let q = BoundedQueue::new(2);

        assert!(q.try_push(1).is_ok());
        assert!(q.try_push(2).is_ok());

        match q.try_push(3) {
            PushResult::Backpressure(v) => assert_eq!(v, 3),
            PushResult::Ok => panic!("expected backpressure"),
        }
    }

    #[test]
    fn push_within_honors_deadline() {
        let q = BoundedQueue::new(1);
        assert!(q.try_push(1).is_ok());

        let timeout = Duration::from_millis(20);
        let started = Instant::now();
        let result = q.push_within(2, timeout);
        let elapsed = started.elapsed();

        assert!(matches!(result, PushResult::Backpressure(2)));
        assert!(elapsed >= timeout, "must keep retrying until the deadline");
        assert!(
            elapsed < timeout + Duration::from_millis(200),
            "must not block far past the deadline"
        );
    }

    #[test]
    fn push_within_succeeds_when_space_frees_up() {
        use std::sync::Arc;

        let q = Arc::new(BoundedQueue::new(1));
        assert!(q.try_push(1).is_ok());

        let consumer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                q.try_pop()
            })
        };

        let result = q.push_within(2, Duration::from_millis(500));
        assert!(result.is_ok());
        assert_eq!(consumer.join().expect("join"), Some(1));
    }

    #[test]
    fn drain_empties_the_queue() {
        let q = BoundedQueue::new(8);
        for i in 0..5 {
            let _ = q.try_push(i);
        }

        assert_eq!(q.drain(), vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
        assert!(q.drain().is_empty());
    }

    #[test]
    fn capacity_and_len() {
        let q = BoundedQueue::new(5);
        assert_eq!(q.capacity(), 5);
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
        assert!(!q.is_full());

        for i in 0..5 {
            let _ = q.try_push(i);
        }
        assert!(q.is_full());
    }

    #[test]
    #[should_panic(expected = "queue capacity must be positive")]
    fn zero_capacity_panics() {
        let _q: BoundedQueue<i32> = BoundedQueue::new(0);
    }
}
