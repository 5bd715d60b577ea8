//! # Drop-Oldest Queue
//!
//! A bounded, single-consumer queue that never blocks producers. When full,
//! pushing evicts the oldest item. Sessions use it so a slow peer loses
//! stale packets instead of stalling the poller.
//!
//! The consumer waits on a [`Notify`]; `notify_one` stores a permit when
//! nobody is waiting, so a push that races a `pop` is never lost.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

/// Returned by [`DropOldestQueue::push`] after the queue is closed.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("queue is closed")]
pub struct QueueClosed<T>(pub T);

#[derive(Debug)]
struct QueueInner<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded queue with drop-oldest overflow.
#[derive(Debug)]
pub struct DropOldestQueue<T> {
    inner: Mutex<QueueInner<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> DropOldestQueue<T> {
    /// Create a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Append `item`, returning the evicted oldest item if the queue was full.
    pub fn push(&self, item: T) -> Result<Option<T>, QueueClosed<T>> {
        let evicted = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueClosed(item));
            }
            let evicted = if inner.items.len() >= self.capacity {
                inner.items.pop_front()
            } else {
                None
            };
            inner.items.push_back(item);
            evicted
        };
        self.notify.notify_one();
        Ok(evicted)
    }

    /// Wait for the next item. Returns `None` once closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(item) = inner.items.pop_front() {
                    return Some(item);
                }
                if inner.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Take the next item without waiting.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.lock().items.pop_front()
    }

    /// Stop accepting items. Queued items can still be drained.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
