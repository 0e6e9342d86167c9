use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use sink_api::{BulkTransport, IndexCreation, Record};
use tokio::sync::Mutex;

use crate::error::{Result, WriterError};
use crate::mapping;
use crate::topic::TopicConfigResolver;

/// Creates destination indices and installs schema-derived mappings, each at
/// most once per index for the writer's lifetime.
///
/// Each set is guarded by an async mutex held across the engine call, so
/// concurrent callers for the same new index issue exactly one request.
pub struct IndexLifecycleManager {
    transport: Arc<dyn BulkTransport>,
    resolver: TopicConfigResolver,
    type_name: String,
    known: Mutex<HashSet<String>>,
    mapped: Mutex<HashSet<String>>,
}

impl IndexLifecycleManager {
    pub fn new(transport: Arc<dyn BulkTransport>, resolver: TopicConfigResolver, type_name: impl Into<String>) -> Self {
        Self {
            transport,
            resolver,
            type_name: type_name.into(),
            known: Mutex::new(HashSet::new()),
            mapped: Mutex::new(HashSet::new()),
        }
    }

    /// Create the index of every topic unless it is already known to exist.
    pub async fn ensure_indices<I, S>(&self, topics: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let indices: BTreeSet<String> = topics
            .into_iter()
            .map(|t| self.resolver.index_name(t.as_ref()).to_string())
            .collect();

        let mut known = self.known.lock().await;
        for index in indices {
            if known.contains(&index) {
                continue;
            }
            match self.transport.create_index_if_absent(&index).await? {
                IndexCreation::Created => tracing::info!(index = %index, "created index"),
                IndexCreation::AlreadyExists => tracing::debug!(index = %index, "index already exists"),
            }
            known.insert(index);
        }
        Ok(())
    }

    /// Install the mapping derived from `record`'s value schema on `index`,
    /// once per index. Records without a value schema, or whose value schema
    /// is not a struct, install nothing.
    pub async fn ensure_mapping(&self, index: &str, record: &Record) -> Result<()> {
        let Some(schema) = &record.value_schema else {
            return Ok(());
        };

        let mut mapped = self.mapped.lock().await;
        if mapped.contains(index) {
            return Ok(());
        }

        let inferred = mapping::infer_mapping(schema).map_err(|e| WriterError::InvalidRecord {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: record.offset,
            reason: format!("cannot derive mapping: {e}"),
        })?;
        // Non-struct schemas leave the index unmapped so a later struct schema still installs.
        let Some(body) = inferred else {
            tracing::trace!(index = %index, "value schema is not a struct, using dynamic mapping");
            return Ok(());
        };
        self.transport.put_mapping(index, &self.type_name, &body).await?;
        tracing::info!(index = %index, type_name = %self.type_name, "installed mapping");
        mapped.insert(index.to_string());
        Ok(())
    }

    pub async fn known_indices(&self) -> Vec<String> {
        let mut indices: Vec<String> = self.known.lock().await.iter().cloned().collect();
        indices.sort();
        indices
    }
}
