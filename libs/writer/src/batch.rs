use sink_api::{BulkItem, Record, TopicPartition};

/// A document write derived from one record.
///
/// Owned by the pipeline from intake until it is acknowledged, dropped or
/// failed.
#[derive(Debug, Clone)]
pub struct WriteOperation {
    /// Intake order, assigned when the operation enters the buffer.
    pub(crate) op_id: u64,
    pub item: BulkItem,
    pub origin: Record,
}

impl WriteOperation {
    pub fn new(item: BulkItem, origin: Record) -> Self {
        Self { op_id: 0, item, origin }
    }

    pub fn op_id(&self) -> u64 {
        self.op_id
    }

    pub fn topic_partition(&self) -> TopicPartition {
        self.origin.topic_partition()
    }
}

/// Ordered group of operations submitted in one bulk request.
#[derive(Debug)]
pub struct Batch {
    pub seq: u64,
    pub ops: Vec<WriteOperation>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
