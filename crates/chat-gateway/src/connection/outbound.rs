//! Bounded per-connection outbound queue
//!
//! Producers never wait: when the queue is full the oldest frame is dropped to
//! make room. A single consumer (the connection's writer) drains it.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;

/// What happened to a pushed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest frame
    DroppedOldest,
    /// The queue is closed; the frame was discarded
    Closed,
}

#[derive(Debug, Default)]
struct Inner {
    frames: VecDeque<Arc<str>>,
    closed: bool,
    dropped: u64,
}

/// Drop-oldest queue of serialized frames
#[derive(Debug)]
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` frames (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity.min(64)),
                ..Inner::default()
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    pub fn push(&self, frame: Arc<str>) -> PushOutcome {
        let outcome = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return PushOutcome::Closed;
            }

            let outcome = if inner.frames.len() >= self.capacity {
                inner.frames.pop_front();
                inner.dropped += 1;
                PushOutcome::DroppedOldest
            } else {
                PushOutcome::Queued
            };
            inner.frames.push_back(frame);
            outcome
        };

        self.notify.notify_one();
        outcome
    }

    /// Wait for the next frame; `None` once closed and drained
    pub async fn pop(&self) -> Option<Arc<str>> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(frame) = inner.frames.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            // notify_one stores a permit, so a push between the check and
            // this await still wakes us
            self.notify.notified().await;
        }
    }

    /// Refuse further pushes and wake the consumer
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames evicted so far because the queue was full
    pub fn dropped(&self) -> u64 {
        self.inner.lock().dropped
    }
}
