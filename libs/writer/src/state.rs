use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use sink_api::TopicPartition;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::batch::{Batch, WriteOperation};
use crate::buffer::WriterBuffer;
use crate::error::{Result, WriterError};

/// Counters describing what happened to the operations the writer has seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Operations that entered the buffer.
    pub accepted: u64,
    pub acknowledged: u64,
    /// Invalid records skipped at intake under the drop policy.
    pub skipped_invalid: u64,
    /// Documents rejected by the engine and dropped under the drop policy.
    pub dropped_rejected: u64,
    /// Operations resolved as failed by a fatal error.
    pub failed: u64,
    /// Operations discarded by `stop` without being acknowledged.
    pub abandoned: u64,
    /// Batches sealed and handed to dispatch.
    pub batches: u64,
}

/// What the batcher should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Readiness {
    /// Seal a batch now.
    Ready,
    /// A partial batch is waiting for its linger deadline.
    Lingering(Instant),
    /// Nothing buffered.
    Idle,
    /// Shutdown or fatal error; seal nothing more.
    Closed,
}

struct StateInner {
    buffer: WriterBuffer,
    /// Op ids accepted but not yet acknowledged, dropped, failed or abandoned.
    unresolved: BTreeSet<u64>,
    next_op_id: u64,
    next_batch_seq: u64,
    in_flight: usize,
    flush_requests: usize,
    fatal: Option<WriterError>,
    shutdown: bool,
    stats: WriterStats,
    acked_offsets: HashMap<TopicPartition, i64>,
}

impl StateInner {
    fn surface_error(&self) -> Option<WriterError> {
        if let Some(cause) = &self.fatal {
            return Some(WriterError::Fatal(Box::new(cause.clone())));
        }
        if self.shutdown {
            return Some(WriterError::Stopped);
        }
        None
    }

    fn outstanding_before(&self, watermark: u64) -> usize {
        self.unresolved.range(..watermark).count()
    }

    fn resolve<'a>(&mut self, ops: impl IntoIterator<Item = &'a WriteOperation>) -> u64 {
        self.resolve_ids(ops.into_iter().map(|op| op.op_id))
    }

    fn resolve_ids(&mut self, ids: impl IntoIterator<Item = u64>) -> u64 {
        let mut n = 0;
        for id in ids {
            if self.unresolved.remove(&id) {
                n += 1;
            }
        }
        n
    }
}

// ═══════════════════════════════════════════════════════════════
//  Writer State
// ═══════════════════════════════════════════════════════════════

/// Mutable pipeline state shared by intake, the batcher, dispatch tasks and
/// flush callers.
///
/// Everything lives behind one mutex. Every change is followed by a
/// `Notify::notify_waiters`, and waiters register interest before checking
/// their condition, so a change between check and wait is never missed.
pub struct WriterState {
    inner: Mutex<StateInner>,
    changed: Notify,
}

impl Default for WriterState {
    fn default() -> Self {
        Self::new()
    }
}

impl WriterState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StateInner {
                buffer: WriterBuffer::new(),
                unresolved: BTreeSet::new(),
                next_op_id: 1,
                next_batch_seq: 1,
                in_flight: 0,
                flush_requests: 0,
                fatal: None,
                shutdown: false,
                stats: WriterStats::default(),
                acked_offsets: HashMap::new(),
            }),
            changed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("writer state lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn update<T>(&self, f: impl FnOnce(&mut StateInner) -> T) -> T {
        let out = f(&mut self.lock());
        self.changed.notify_waiters();
        out
    }

    /// Wait until `check` yields a value. `check` runs under the lock.
    async fn wait_for<T>(&self, mut check: impl FnMut(&mut StateInner) -> Option<T>) -> T {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let ready = {
                let mut inner = self.lock();
                check(&mut inner)
            };
            if let Some(value) = ready {
                return value;
            }
            notified.await;
        }
    }

    pub(crate) fn notify(&self) -> &Notify {
        &self.changed
    }

    // ── Errors and lifecycle ──────────────────────────────────────

    /// `Err` once the pipeline is fatal or stopped.
    pub fn check_open(&self) -> Result<()> {
        match self.lock().surface_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// The stored fatal error, wrapped for callers.
    pub fn fatal(&self) -> Option<WriterError> {
        self.lock().fatal.clone().map(|e| WriterError::Fatal(Box::new(e)))
    }

    pub fn is_fatal(&self) -> bool {
        self.lock().fatal.is_some()
    }

    /// Record the first fatal error. Later errors are logged and discarded.
    pub fn set_fatal(&self, err: WriterError) {
        let err = match err {
            WriterError::Fatal(inner) => *inner,
            other => other,
        };
        self.update(|s| {
            if s.fatal.is_none() {
                tracing::error!(error = %err, "writer entered fatal state");
                s.fatal = Some(err);
            } else {
                tracing::debug!(error = %err, "additional failure after fatal error");
            }
        });
    }

    /// Mark the writer stopped and discard everything still buffered.
    ///
    /// Returns the number of buffered operations abandoned.
    pub fn shutdown(&self) -> usize {
        self.update(|s| {
            s.shutdown = true;
            let ops = s.buffer.drain_all();
            let n = s.resolve(&ops);
            s.stats.abandoned += n;
            ops.len()
        })
    }

    pub fn is_shutdown(&self) -> bool {
        self.lock().shutdown
    }

    // ── Intake ────────────────────────────────────────────────────

    /// Assign an op id and buffer `op`, waiting while occupancy is at `capacity`.
    ///
    /// Occupancy counts every unresolved operation, buffered or in flight.
    pub async fn enqueue(&self, op: WriteOperation, capacity: usize) -> Result<u64> {
        let mut pending = Some(op);
        let result = self
            .wait_for(|s| {
                if let Some(err) = s.surface_error() {
                    return Some(Err(err));
                }
                if s.unresolved.len() >= capacity {
                    return None;
                }
                let mut op = pending.take()?;
                let id = s.next_op_id;
                s.next_op_id += 1;
                op.op_id = id;
                s.unresolved.insert(id);
                s.buffer.push(op, Instant::now());
                s.stats.accepted += 1;
                Some(Ok(id))
            })
            .await;
        self.changed.notify_waiters();
        result
    }

    pub fn record_skipped(&self) {
        self.lock().stats.skipped_invalid += 1;
    }

    // ── Batching ──────────────────────────────────────────────────

    pub(crate) fn readiness(&self, batch_size: usize, linger: Duration, now: Instant) -> Readiness {
        let s = self.lock();
        if s.shutdown || s.fatal.is_some() {
            return Readiness::Closed;
        }
        if s.buffer.is_ready(batch_size, linger, s.flush_requests > 0, now) {
            return Readiness::Ready;
        }
        match s.buffer.linger_deadline(linger) {
            Some(deadline) => Readiness::Lingering(deadline),
            None => Readiness::Idle,
        }
    }

    /// Seal up to `batch_size` buffered operations into the next batch.
    pub fn seal_batch(&self, batch_size: usize) -> Option<Batch> {
        self.update(|s| {
            if s.shutdown || s.fatal.is_some() || s.buffer.is_empty() {
                return None;
            }
            let ops = s.buffer.take_batch(batch_size, Instant::now());
            let seq = s.next_batch_seq;
            s.next_batch_seq += 1;
            s.in_flight += 1;
            s.stats.batches += 1;
            Some(Batch { seq, ops })
        })
    }

    /// Release a dispatched batch. Ids still unresolved are abandoned.
    pub fn finish_batch(&self, op_ids: &[u64]) {
        self.update(|s| {
            let leftover = s.resolve_ids(op_ids.iter().copied());
            s.stats.abandoned += leftover;
            s.in_flight = s.in_flight.saturating_sub(1);
        });
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    pub fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    /// Buffered plus in-flight operations.
    pub fn occupancy(&self) -> usize {
        self.lock().unresolved.len()
    }

    // ── Resolution ────────────────────────────────────────────────

    pub fn acknowledge(&self, ops: &[WriteOperation]) {
        if ops.is_empty() {
            return;
        }
        self.update(|s| {
            let n = s.resolve(ops);
            s.stats.acknowledged += n;
            for op in ops {
                let offset = s.acked_offsets.entry(op.topic_partition()).or_insert(op.origin.offset);
                *offset = (*offset).max(op.origin.offset);
            }
        });
    }

    pub fn drop_rejected(&self, ops: &[WriteOperation]) {
        if ops.is_empty() {
            return;
        }
        self.update(|s| {
            let n = s.resolve(ops);
            s.stats.dropped_rejected += n;
        });
    }

    pub fn fail(&self, ops: &[WriteOperation]) {
        if ops.is_empty() {
            return;
        }
        self.update(|s| {
            let n = s.resolve(ops);
            s.stats.failed += n;
        });
    }

    // ── Flush ─────────────────────────────────────────────────────

    /// Register a flush and return its watermark, the first op id it does not cover.
    pub fn begin_flush(&self) -> u64 {
        self.update(|s| {
            s.flush_requests += 1;
            s.next_op_id
        })
    }

    pub fn end_flush(&self) {
        self.update(|s| s.flush_requests = s.flush_requests.saturating_sub(1));
    }

    /// Wait until every op below `watermark` is resolved or the pipeline is fatal.
    pub async fn wait_flushed(&self, watermark: u64) -> Result<()> {
        self.wait_for(|s| {
            if let Some(cause) = &s.fatal {
                return Some(Err(WriterError::Fatal(Box::new(cause.clone()))));
            }
            if s.shutdown && s.stats.abandoned > 0 {
                return Some(Err(WriterError::Stopped));
            }
            (s.outstanding_before(watermark) == 0).then_some(Ok(()))
        })
        .await
    }

    pub fn outstanding_before(&self, watermark: u64) -> usize {
        self.lock().outstanding_before(watermark)
    }

    // ── Reporting ─────────────────────────────────────────────────

    pub fn stats(&self) -> WriterStats {
        self.lock().stats.clone()
    }

    pub fn acknowledged_offsets(&self) -> HashMap<TopicPartition, i64> {
        self.lock().acked_offsets.clone()
    }
}
