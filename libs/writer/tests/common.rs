#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bulk_writer::{BulkWriter, WriterConfig};
use serde_json::{Value, json};
use sink_api::{BulkItem, BulkTransport, IndexCreation, ItemOutcome, Record, TopicPartition, TransportError};
use tokio::time::Instant;

// ═══════════════════════════════════════════════════════════════
//  Fake transport
// ═══════════════════════════════════════════════════════════════

/// One `submit_batch` call as seen by the engine.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Virtual time since the transport was created.
    pub at: Duration,
    pub items: Vec<BulkItem>,
}

impl Submission {
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|i| i.id.clone().unwrap_or_default()).collect()
    }
}

#[derive(Default)]
struct FakeState {
    request_failures: VecDeque<TransportError>,
    rejected_ids: HashSet<String>,
    /// id -> remaining retryable answers
    retryable_ids: HashMap<String, usize>,
    submissions: Vec<Submission>,
    in_flight: usize,
    max_in_flight: usize,
    existing: HashSet<String>,
    created: Vec<String>,
    create_calls: usize,
    mappings: Vec<(String, String, Value)>,
    mapping_failure: Option<TransportError>,
    close_calls: usize,
}

/// Scriptable in-memory engine. Every call sleeps `latency` in virtual time.
pub struct FakeTransport {
    started: Instant,
    latency: Duration,
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            latency,
            state: Mutex::new(FakeState::default()),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// The next `n` submissions fail with `err` before reaching any item.
    pub fn fail_next(&self, n: usize, err: TransportError) {
        let mut s = self.lock();
        for _ in 0..n {
            s.request_failures.push_back(err.clone());
        }
    }

    pub fn reject_id(&self, id: &str) {
        self.lock().rejected_ids.insert(id.to_string());
    }

    /// Answer `Retryable` for `id` the next `times` times it is submitted.
    pub fn retry_id(&self, id: &str, times: usize) {
        self.lock().retryable_ids.insert(id.to_string(), times);
    }

    pub fn add_existing_index(&self, index: &str) {
        self.lock().existing.insert(index.to_string());
    }

    pub fn fail_mappings(&self, err: TransportError) {
        self.lock().mapping_failure = Some(err);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.lock().submissions.clone()
    }

    /// Ids of every submitted item, in submission order, including resends.
    pub fn submitted_ids(&self) -> Vec<String> {
        self.lock().submissions.iter().flat_map(|s| s.ids()).collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    pub fn created(&self) -> Vec<String> {
        self.lock().created.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    pub fn mappings(&self) -> Vec<(String, String, Value)> {
        self.lock().mappings.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.lock().close_calls
    }

    fn answer(&self, items: &[BulkItem]) -> Result<Vec<ItemOutcome>, TransportError> {
        let mut s = self.lock();
        s.submissions.push(Submission { at: self.started.elapsed(), items: items.to_vec() });
        if let Some(err) = s.request_failures.pop_front() {
            return Err(err);
        }

        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            let id = item.id.clone().unwrap_or_default();
            if s.rejected_ids.contains(&id) {
                outcomes.push(ItemOutcome::Rejected { reason: "mapper_parsing_exception: bad field".into() });
                continue;
            }
            match s.retryable_ids.get_mut(&id) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    outcomes.push(ItemOutcome::Retryable { reason: "es_rejected_execution_exception".into() });
                }
                _ => outcomes.push(ItemOutcome::Acknowledged),
            }
        }
        Ok(outcomes)
    }
}

impl BulkTransport for FakeTransport {
    fn submit_batch<'a>(
        &'a self,
        items: &'a [BulkItem],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ItemOutcome>, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            {
                let mut s = self.lock();
                s.in_flight += 1;
                s.max_in_flight = s.max_in_flight.max(s.in_flight);
            }
            let result = self.answer(items);
            tokio::time::sleep(self.latency).await;
            self.lock().in_flight -= 1;
            result
        })
    }

    fn create_index_if_absent<'a>(
        &'a self,
        index: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<IndexCreation, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.lock().create_calls += 1;
            tokio::time::sleep(self.latency).await;
            let mut s = self.lock();
            if !s.existing.insert(index.to_string()) {
                return Ok(IndexCreation::AlreadyExists);
            }
            s.created.push(index.to_string());
            Ok(IndexCreation::Created)
        })
    }

    fn put_mapping<'a>(
        &'a self,
        index: &'a str,
        type_name: &'a str,
        mapping: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut s = self.lock();
            if let Some(err) = s.mapping_failure.clone() {
                return Err(err);
            }
            s.mappings.push((index.to_string(), type_name.to_string(), mapping.clone()));
            Ok(())
        })
    }

    fn close(&self) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            self.lock().close_calls += 1;
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════

/// Schemaless config with small, test-friendly limits.
pub fn config() -> WriterConfig {
    let mut cfg = WriterConfig::new("doc");
    cfg.schema_ignore = true;
    cfg.batch_size = 100;
    cfg.linger_ms = 10;
    cfg.flush_timeout_ms = 10_000;
    cfg
}

pub fn start(cfg: WriterConfig, transport: &Arc<FakeTransport>) -> BulkWriter {
    let transport: Arc<dyn BulkTransport> = transport.clone();
    BulkWriter::start(cfg, transport).unwrap()
}

/// Record keyed by its offset, so document ids are the offsets.
pub fn record(topic: &str, partition: i32, offset: i64) -> Record {
    Record::new(topic, partition, offset, Some(json!(offset)), json!({ "offset": offset }))
}

pub fn records(topic: &str, partition: i32, offsets: std::ops::Range<i64>) -> Vec<Record> {
    offsets.map(|o| record(topic, partition, o)).collect()
}

pub fn tombstone(topic: &str, partition: i32, offset: i64) -> Record {
    Record::new(topic, partition, offset, Some(json!(offset)), Value::Null)
}

pub fn tp(topic: &str, partition: i32) -> TopicPartition {
    TopicPartition::new(topic, partition)
}

pub fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}
