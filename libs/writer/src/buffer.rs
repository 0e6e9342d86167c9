use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::batch::WriteOperation;

/// FIFO of translated operations waiting to be sealed into a batch.
///
/// Tracks when the current batch started accumulating so the linger timer
/// runs from the first operation of a batch, not from the latest one.
#[derive(Debug, Default)]
pub struct WriterBuffer {
    queue: VecDeque<WriteOperation>,
    accumulating_since: Option<Instant>,
}

impl WriterBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn push(&mut self, op: WriteOperation, now: Instant) {
        if self.queue.is_empty() {
            self.accumulating_since = Some(now);
        }
        self.queue.push_back(op);
    }

    /// Instant the pending batch must be sealed by, if anything is pending.
    pub fn linger_deadline(&self, linger: Duration) -> Option<Instant> {
        self.accumulating_since.map(|since| since + linger)
    }

    /// Whether a batch should be sealed now.
    pub fn is_ready(&self, batch_size: usize, linger: Duration, flush_requested: bool, now: Instant) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.queue.len() >= batch_size
            || flush_requested
            || self.linger_deadline(linger).is_some_and(|deadline| now >= deadline)
    }

    /// Remove up to `batch_size` operations in arrival order.
    ///
    /// Leftovers start a new batch at `now`.
    pub fn take_batch(&mut self, batch_size: usize, now: Instant) -> Vec<WriteOperation> {
        let n = batch_size.min(self.queue.len());
        let ops: Vec<WriteOperation> = self.queue.drain(..n).collect();
        self.accumulating_since = if self.queue.is_empty() { None } else { Some(now) };
        ops
    }

    pub fn drain_all(&mut self) -> Vec<WriteOperation> {
        self.accumulating_since = None;
        self.queue.drain(..).collect()
    }
}
