use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sink_api::{BulkTransport, Record, TopicPartition};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::batcher::{Batcher, spawn_batcher};
use crate::config::WriterConfig;
use crate::error::{Result, WriterError};
use crate::flush::FlushCoordinator;
use crate::index::IndexLifecycleManager;
use crate::limiter::InFlightLimiter;
use crate::retry::RetryExecutor;
use crate::state::{WriterState, WriterStats};
use crate::topic::TopicConfigResolver;
use crate::translate::RecordTranslator;

// ═══════════════════════════════════════════════════════════════
//  BulkWriter
// ═══════════════════════════════════════════════════════════════

/// Buffered, batched, retrying writer of records into a search engine.
///
/// The host drives it through plain methods: `open_partitions` when it is
/// assigned partitions, `write` for each poll, `flush` before committing
/// offsets, `stop` on shutdown.
pub struct BulkWriter {
    config: WriterConfig,
    state: Arc<WriterState>,
    translator: RecordTranslator,
    indices: IndexLifecycleManager,
    flusher: FlushCoordinator,
    limiter: InFlightLimiter,
    transport: Arc<dyn BulkTransport>,
    tracker: TaskTracker,
    batcher_token: CancellationToken,
    abandon_token: CancellationToken,
    batcher: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl BulkWriter {
    /// Validate `config` and start the batcher. Must be called inside a tokio runtime.
    pub fn start(config: WriterConfig, transport: Arc<dyn BulkTransport>) -> Result<Self> {
        config.validate()?;
        let resolver = TopicConfigResolver::from_config(&config)?;

        let state = Arc::new(WriterState::new());
        let limiter = InFlightLimiter::new(config.max_in_flight_requests);
        let executor = Arc::new(RetryExecutor::new(
            transport.clone(),
            state.clone(),
            config.max_retries,
            config.retry_backoff(),
            config.drop_invalid_message,
        ));
        let tracker = TaskTracker::new();
        let batcher_token = CancellationToken::new();
        let abandon_token = CancellationToken::new();

        let batcher = spawn_batcher(
            Batcher {
                state: state.clone(),
                limiter: limiter.clone(),
                executor,
                tracker: tracker.clone(),
                abandon: abandon_token.clone(),
                batch_size: config.batch_size,
                linger: config.linger(),
            },
            batcher_token.clone(),
        );

        tracing::info!(
            type_name = %config.type_name,
            batch_size = config.batch_size,
            linger_ms = config.linger_ms,
            max_in_flight = config.max_in_flight_requests,
            max_buffered = config.max_buffered_records,
            "bulk writer started"
        );

        Ok(Self {
            translator: RecordTranslator::new(resolver.clone(), &config.type_name, config.drop_invalid_message),
            indices: IndexLifecycleManager::new(transport.clone(), resolver, &config.type_name),
            flusher: FlushCoordinator::new(state.clone()),
            config,
            state,
            limiter,
            transport,
            tracker,
            batcher_token,
            abandon_token,
            batcher: Mutex::new(Some(batcher)),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Make sure the index of every assigned partition's topic exists.
    pub async fn open_partitions(&self, partitions: &[TopicPartition]) -> Result<()> {
        self.state.check_open()?;
        let topics: BTreeSet<&str> = partitions.iter().map(|tp| tp.topic.as_str()).collect();
        tracing::info!(partitions = partitions.len(), topics = topics.len(), "opening partitions");
        self.indices.ensure_indices(topics).await
    }

    pub fn close_partitions(&self, partitions: &[TopicPartition]) {
        for tp in partitions {
            tracing::info!(partition = %tp, "partition closed");
        }
    }

    /// Translate and buffer records, blocking while the buffer is full.
    ///
    /// Returns the pipeline's fatal error once one has been recorded, even if
    /// it came from a batch written by an earlier call.
    pub async fn write(&self, records: Vec<Record>) -> Result<()> {
        for record in records {
            self.state.check_open()?;

            let op = match self.translator.apply(record) {
                Ok(Some(op)) => op,
                Ok(None) => {
                    self.state.record_skipped();
                    continue;
                }
                Err(e) => return Err(self.escalate(e)),
            };

            if !self.translator.resolver().resolve(&op.origin.topic).schema_ignore {
                match self.indices.ensure_mapping(&op.item.index, &op.origin).await {
                    Ok(()) => {}
                    // Schema the engine cannot map: same policy as an untranslatable record.
                    Err(e @ WriterError::InvalidRecord { .. }) if self.translator.drops_invalid() => {
                        tracing::warn!(error = %e, "dropping record with unmappable schema");
                        self.state.record_skipped();
                        continue;
                    }
                    Err(e) => return Err(self.escalate(e)),
                }
            }

            let timeout = self.config.flush_timeout();
            match tokio::time::timeout(timeout, self.state.enqueue(op, self.config.max_buffered_records)).await {
                Ok(result) => {
                    result?;
                }
                Err(_) => {
                    tracing::warn!(timeout_ms = self.config.flush_timeout_ms, "no buffer space, intake timed out");
                    return Err(WriterError::IntakeTimeout { timeout_ms: self.config.flush_timeout_ms });
                }
            }
        }
        Ok(())
    }

    /// Block until everything written before the call is resolved or `timeout` passes.
    pub async fn flush(&self, timeout: Duration) -> Result<()> {
        if self.state.is_shutdown() {
            return Err(WriterError::Stopped);
        }
        self.flusher.flush(timeout).await
    }

    pub async fn flush_default(&self) -> Result<()> {
        self.flush(self.config.flush_timeout()).await
    }

    /// Highest acknowledged offset per partition.
    ///
    /// Only safe to commit right after a successful `flush`, which covers every
    /// offset written before it. After `FlushTimeout` lower offsets may still be
    /// in flight or retrying beneath the reported one.
    pub fn acknowledged_offsets(&self) -> HashMap<TopicPartition, i64> {
        self.state.acknowledged_offsets()
    }

    pub fn stats(&self) -> WriterStats {
        self.state.stats()
    }

    /// Operations buffered or in flight.
    pub fn occupancy(&self) -> usize {
        self.state.occupancy()
    }

    /// Flush what is buffered, stop intake and the batcher, wait up to
    /// `flush_timeout_ms` for in-flight batches, then close the transport.
    ///
    /// Only the first call does anything.
    pub async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let grace = self.config.flush_timeout();
        tracing::info!("stopping bulk writer");

        if let Err(e) = self.flusher.flush(grace).await {
            tracing::warn!(error = %e, "flush during stop failed");
        }

        let unsent = self.state.shutdown();
        if unsent > 0 {
            tracing::warn!(operations = unsent, "abandoned unsent operations");
        }

        self.batcher_token.cancel();
        self.limiter.close();
        let batcher = self.batcher.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = batcher {
            if let Err(e) = handle.await {
                tracing::error!(error = ?e, "batcher task panicked");
            }
        }

        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(in_flight = self.state.in_flight(), "grace period expired, abandoning in-flight batches");
            self.abandon_token.cancel();
            self.tracker.wait().await;
        }

        let stats = self.state.stats();
        tracing::info!(
            acknowledged = stats.acknowledged,
            abandoned = stats.abandoned,
            failed = stats.failed,
            "bulk writer stopped"
        );
        self.transport.close().await.map_err(WriterError::from)
    }

    fn escalate(&self, err: WriterError) -> WriterError {
        self.state.set_fatal(err.clone());
        match err {
            WriterError::Fatal(_) => err,
            other => WriterError::Fatal(Box::new(other)),
        }
    }
}

impl Drop for BulkWriter {
    fn drop(&mut self) {
        self.batcher_token.cancel();
        self.abandon_token.cancel();
    }
}
