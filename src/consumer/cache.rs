//! Local flow-control accounting for buffered messages.
//!
//! Each consumer tracks how many messages (and how many body bytes) it has
//! received but not yet finished consuming. A queue's poll loop only issues
//! the next long poll while both counters are under their ceilings; acks
//! and nacks drain the counters and resume polling.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Atomic count/byte window gating the receive path.
#[derive(Debug)]
pub struct ConsumeCache {
    count: AtomicUsize,
    bytes: AtomicUsize,
    max_count: usize,
    max_bytes: usize,
}

impl ConsumeCache {
    /// Create a cache with the given ceilings.
    pub fn new(max_count: usize, max_bytes: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            bytes: AtomicUsize::new(0),
            max_count,
            max_bytes,
        }
    }

    /// Account for one received message.
    pub fn add(&self, body_bytes: usize) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.bytes.fetch_add(body_bytes, Ordering::SeqCst);
    }

    /// Release one message after its ack/nack/forward completed.
    pub fn remove(&self, body_bytes: usize) {
        // Saturating: a release can never drive the counters negative even
        // if accounting races a shutdown.
        self.count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            })
            .ok();
        self.bytes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(body_bytes))
            })
            .ok();
    }

    /// Whether either ceiling is reached; polling suspends while true.
    pub fn is_full(&self) -> bool {
        self.count.load(Ordering::SeqCst) >= self.max_count
            || self.bytes.load(Ordering::SeqCst) >= self.max_bytes
    }

    /// Buffered message count.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Buffered body bytes.
    pub fn bytes(&self) -> usize {
        self.bytes.load(Ordering::SeqCst)
    }
}
