use std::sync::Arc;
use std::time::Duration;

use sink_api::{BulkItem, BulkTransport, ItemOutcome};

use crate::batch::{Batch, WriteOperation};
use crate::error::WriterError;
use crate::state::WriterState;

/// Result of driving one batch to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub seq: u64,
    pub acknowledged: usize,
    pub dropped: usize,
    /// Submissions made, including the first.
    pub attempts: u32,
}

/// Submits batches and decides, per failure, between retrying, dropping and
/// failing the pipeline.
///
/// Backoff is constant. Request-level connectivity or overload failures resend
/// every unresolved operation of the batch; item-level retryable outcomes
/// resend only those items, in their original order.
pub struct RetryExecutor {
    transport: Arc<dyn BulkTransport>,
    state: Arc<WriterState>,
    max_retries: u32,
    backoff: Duration,
    drop_invalid: bool,
}

impl RetryExecutor {
    pub fn new(
        transport: Arc<dyn BulkTransport>,
        state: Arc<WriterState>,
        max_retries: u32,
        backoff: Duration,
        drop_invalid: bool,
    ) -> Self {
        Self { transport, state, max_retries, backoff, drop_invalid }
    }

    /// Drive `batch` until every operation is acknowledged, dropped or failed.
    ///
    /// Any fatal outcome is recorded in the shared state before returning.
    pub async fn execute(&self, batch: Batch) -> Result<BatchSummary, WriterError> {
        let seq = batch.seq;
        let mut retry = RetryState::new(batch.ops, self.backoff);
        let mut summary = BatchSummary { seq, acknowledged: 0, dropped: 0, attempts: 0 };

        loop {
            if let Some(err) = self.state.fatal() {
                tracing::debug!(batch = seq, pending = retry.remaining.len(), "pipeline is fatal, not resubmitting");
                self.state.fail(&retry.remaining);
                return Err(err);
            }

            retry.attempt += 1;
            summary.attempts = retry.attempt;
            let items: Vec<BulkItem> = retry.remaining.iter().map(|op| op.item.clone()).collect();
            tracing::debug!(batch = seq, attempt = retry.attempt, items = items.len(), "submitting batch");

            let failure = match self.transport.submit_batch(&items).await {
                Ok(outcomes) if outcomes.len() != items.len() => WriterError::Transport(format!(
                    "bulk response has {} items, request had {}",
                    outcomes.len(),
                    items.len()
                )),
                Ok(outcomes) => {
                    let resolved = self.apply_outcomes(std::mem::take(&mut retry.remaining), outcomes);
                    summary.acknowledged += resolved.acknowledged;
                    summary.dropped += resolved.dropped;
                    if let Some(err) = resolved.fatal {
                        return Err(self.fail_pipeline(err, &resolved.retry));
                    }
                    if resolved.retry.is_empty() {
                        return Ok(summary);
                    }
                    retry.remaining = resolved.retry;
                    WriterError::EngineOverload(resolved.retry_reason.unwrap_or_default())
                }
                Err(e) => WriterError::from(e),
            };

            if !failure.is_retryable() {
                return Err(self.fail_pipeline(failure, &retry.remaining));
            }
            if retry.attempt > self.max_retries {
                let exhausted = WriterError::RetriesExhausted {
                    attempts: retry.attempt,
                    source: Box::new(failure),
                };
                return Err(self.fail_pipeline(exhausted, &retry.remaining));
            }

            tracing::warn!(
                batch = seq,
                attempt = retry.attempt,
                pending = retry.remaining.len(),
                error = %failure,
                "bulk request failed, retrying after {:?}",
                retry.backoff
            );
            tokio::time::sleep(retry.backoff).await;
        }
    }

    fn apply_outcomes(&self, ops: Vec<WriteOperation>, outcomes: Vec<ItemOutcome>) -> Resolved {
        let mut acked = Vec::with_capacity(ops.len());
        let mut dropped = Vec::new();
        let mut failed = Vec::new();
        let mut resolved = Resolved::default();

        for (op, outcome) in ops.into_iter().zip(outcomes) {
            match outcome {
                ItemOutcome::Acknowledged => acked.push(op),
                ItemOutcome::Rejected { reason } => {
                    let err = WriterError::DocumentRejected {
                        index: op.item.index.clone(),
                        id: op.item.id.clone(),
                        reason,
                    };
                    if self.drop_invalid {
                        tracing::warn!(
                            topic = %op.origin.topic,
                            partition = op.origin.partition,
                            offset = op.origin.offset,
                            error = %err,
                            "dropping rejected document"
                        );
                        dropped.push(op);
                    } else {
                        resolved.fatal.get_or_insert(err);
                        failed.push(op);
                    }
                }
                ItemOutcome::Retryable { reason } => {
                    resolved.retry_reason = Some(reason);
                    resolved.retry.push(op);
                }
            }
        }

        // Fatal is recorded before failed ops resolve.
        if let Some(err) = &resolved.fatal {
            self.state.set_fatal(err.clone());
        }
        self.state.acknowledge(&acked);
        self.state.drop_rejected(&dropped);
        self.state.fail(&failed);
        resolved.acknowledged = acked.len();
        resolved.dropped = dropped.len();
        resolved
    }

    fn fail_pipeline(&self, err: WriterError, pending: &[WriteOperation]) -> WriterError {
        self.state.set_fatal(err.clone());
        self.state.fail(pending);
        WriterError::Fatal(Box::new(err))
    }
}

/// Retry bookkeeping of one dispatch.
#[derive(Debug)]
pub struct RetryState {
    /// Submissions made so far.
    pub attempt: u32,
    pub backoff: Duration,
    /// Operations not yet acknowledged, dropped or failed, in batch order.
    pub remaining: Vec<WriteOperation>,
}

impl RetryState {
    pub fn new(ops: Vec<WriteOperation>, backoff: Duration) -> Self {
        Self { attempt: 0, backoff, remaining: ops }
    }
}

#[derive(Default)]
struct Resolved {
    acknowledged: usize,
    dropped: usize,
    retry: Vec<WriteOperation>,
    retry_reason: Option<String>,
    fatal: Option<WriterError>,
}
