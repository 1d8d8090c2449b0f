//! Bounded FIFO of symbols waiting to be published.
//!
//! Ingest threads enqueue through a bounded `crossbeam_channel`, which is safe for any
//! number of concurrent producers. The controller is the only consumer: `peek` moves
//! the channel front into a head slot and leaves it there until `remove_head`, so a
//! failed publish attempt keeps the symbol at the front for the next tick.
//!
//! The queue does not deduplicate. Callers keep at most one entry per symbol through
//! the coalescing enqueue policy.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use log::error;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// FIFO of symbols awaiting dispatch.
#[derive(Debug)]
pub struct PublishQueue {
    tx: Sender<Arc<str>>,
    rx: Receiver<Arc<str>>,
    head: Mutex<Option<Arc<str>>>,
    capacity: usize,
}

impl PublishQueue {
    /// Create a queue that holds up to `capacity` symbols.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = bounded(capacity);
        Self {
            tx,
            rx,
            head: Mutex::new(None),
            capacity,
        }
    }

    /// Append `symbol` without blocking. Returns `false` if the queue is full.
    pub fn try_enqueue(&self, symbol: Arc<str>) -> bool {
        match self.tx.try_send(symbol) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(symbol)) => {
                error!("Publish queue disconnected, dropping {}", symbol);
                false
            }
        }
    }

    /// Front symbol without removing it.
    pub fn peek(&self) -> Option<Arc<str>> {
        let mut head = self.lock_head();
        if head.is_none() {
            *head = self.rx.try_recv().ok();
        }
        head.clone()
    }

    /// Like [`peek`](Self::peek), but waits up to `timeout` for a symbol to arrive.
    pub fn wait_head(&self, timeout: Duration) -> Option<Arc<str>> {
        if let Some(symbol) = self.peek() {
            return Some(symbol);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(symbol) => {
                let mut head = self.lock_head();
                match head.as_ref() {
                    // Only reachable with a second consumer; nothing is lost, order is.
                    Some(existing) => {
                        let existing = Arc::clone(existing);
                        drop(head);
                        self.requeue(symbol);
                        Some(existing)
                    }
                    None => {
                        *head = Some(Arc::clone(&symbol));
                        Some(symbol)
                    }
                }
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drop the front symbol, returning it.
    pub fn remove_head(&self) -> Option<Arc<str>> {
        let mut head = self.lock_head();
        head.take().or_else(|| self.rx.try_recv().ok())
    }

    /// Symbols currently queued, including a peeked head.
    pub fn len(&self) -> usize {
        self.rx.len() + usize::from(self.lock_head().is_some())
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of symbols waiting in the channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn requeue(&self, symbol: Arc<str>) {
        if !self.try_enqueue(Arc::clone(&symbol)) {
            error!("Publish queue full while requeueing {}", symbol);
        }
    }

    fn lock_head(&self) -> MutexGuard<'_, Option<Arc<str>>> {
        self.head.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Instant;

    fn sym(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = PublishQueue::new(3);
        assert!(queue.peek().is_none());
        assert!(queue.try_enqueue(sym("A")));
        assert!(queue.try_enqueue(sym("B")));

        assert_eq!(queue.peek().as_deref(), Some("A"));
        assert_eq!(queue.peek().as_deref(), Some("A"));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.remove_head().as_deref(), Some("A"));
        assert_eq!(queue.peek().as_deref(), Some("B"));
        assert_eq!(queue.remove_head().as_deref(), Some("B"));
        assert!(queue.is_empty());
        assert!(queue.remove_head().is_none());
    }

    #[test]
    fn full_queue_refuses_without_blocking() {
        let queue = PublishQueue::new(2);
        assert!(queue.try_enqueue(sym("A")));
        assert!(queue.try_enqueue(sym("B")));
        assert!(!queue.try_enqueue(sym("C")));
        assert_eq!(queue.capacity(), 2);
    }

    #[test]
    fn wait_head_times_out_on_empty_queue() {
        let queue = PublishQueue::new(1);
        let started = Instant::now();
        assert!(queue.wait_head(Duration::from_millis(20)).is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_head_wakes_on_enqueue() {
        let queue = Arc::new(PublishQueue::new(1));
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            producer.try_enqueue(sym("A"))
        });

        assert_eq!(queue.wait_head(Duration::from_secs(5)).as_deref(), Some("A"));
        assert!(handle.join().unwrap());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn concurrent_producers_are_all_admitted_in_capacity() {
        let queue = Arc::new(PublishQueue::new(400));
        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..100 {
                        assert!(queue.try_enqueue(Arc::from(format!("P{producer}S{i}"))));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut drained = HashSet::new();
        while let Some(symbol) = queue.remove_head() {
            drained.insert(symbol);
        }
        assert_eq!(drained.len(), 400);
    }
}
