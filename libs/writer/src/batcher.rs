use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::batch::{Batch, WriteOperation};
use crate::limiter::{InFlightLimiter, InFlightPermit};
use crate::retry::RetryExecutor;
use crate::state::{Readiness, WriterState};

// ═══════════════════════════════════════════════════════════════
//  Batcher task — buffer → sealed batch → dispatch
// ═══════════════════════════════════════════════════════════════

/// Всё, что нужно задаче batcher'а.
pub struct Batcher {
    pub state: Arc<WriterState>,
    pub limiter: InFlightLimiter,
    pub executor: Arc<RetryExecutor>,
    /// Трекер dispatch-задач; `stop` ждёт его с grace-периодом.
    pub tracker: TaskTracker,
    /// Отмена in-flight dispatch после истечения grace-периода.
    pub abandon: CancellationToken,
    pub batch_size: usize,
    pub linger: Duration,
}

/// Запустить batcher: ждёт готовности батча (размер, linger или flush),
/// берёт слот у limiter'а, запечатывает батч и отдаёт его в dispatch.
///
/// Работает независимо от intake, поэтому linger срабатывает и без новых записей.
pub fn spawn_batcher(batcher: Batcher, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        batcher.run(token).await;
        tracing::debug!("batcher stopped");
    })
}

impl Batcher {
    async fn run(self, token: CancellationToken) {
        loop {
            if !self.wait_ready(&token).await {
                return;
            }

            // Слот берём до запечатывания: пока слотов нет, записи продолжают копиться.
            let permit = tokio::select! {
                permit = self.limiter.acquire() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = token.cancelled() => return,
            };

            let Some(batch) = self.state.seal_batch(self.batch_size) else {
                permit.release();
                continue;
            };
            self.dispatch(batch, permit);
        }
    }

    /// `true` когда батч пора запечатывать, `false` при остановке.
    async fn wait_ready(&self, token: &CancellationToken) -> bool {
        loop {
            let notified = self.state.notify().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.state.readiness(self.batch_size, self.linger, Instant::now()) {
                Readiness::Ready => return true,
                Readiness::Closed => return false,
                Readiness::Lingering(deadline) => {
                    tokio::select! {
                        _ = notified.as_mut() => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                        _ = token.cancelled() => return false,
                    }
                }
                Readiness::Idle => {
                    tokio::select! {
                        _ = notified.as_mut() => {}
                        _ = token.cancelled() => return false,
                    }
                }
            }
        }
    }

    fn dispatch(&self, batch: Batch, permit: InFlightPermit) {
        let guard = DispatchGuard {
            state: self.state.clone(),
            op_ids: batch.ops.iter().map(WriteOperation::op_id).collect(),
            permit: Some(permit),
        };
        let executor = self.executor.clone();
        let abandon = self.abandon.clone();
        let seq = batch.seq;
        tracing::debug!(batch = seq, size = batch.len(), "dispatching batch");

        self.tracker.spawn(async move {
            let _guard = guard;
            tokio::select! {
                result = executor.execute(batch) => match result {
                    Ok(summary) => tracing::debug!(
                        batch = seq,
                        acknowledged = summary.acknowledged,
                        dropped = summary.dropped,
                        attempts = summary.attempts,
                        "batch resolved"
                    ),
                    Err(e) => tracing::debug!(batch = seq, error = %e, "batch failed"),
                },
                _ = abandon.cancelled() => {
                    tracing::warn!(batch = seq, "abandoning in-flight batch");
                }
            }
        });
    }
}

/// Освобождает слот и счётчик in-flight ровно один раз, как бы ни завершился dispatch.
struct DispatchGuard {
    state: Arc<WriterState>,
    op_ids: Vec<u64>,
    permit: Option<InFlightPermit>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.state.finish_batch(&self.op_ids);
        if let Some(permit) = self.permit.take() {
            permit.release();
        }
    }
}
